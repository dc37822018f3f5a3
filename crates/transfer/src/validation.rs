use std::path::{Component, Path};

use crate::TransferError;

/// Validates that a remote file name is a single plain path component.
///
/// Names come from the service listing and are joined onto a local
/// directory, so anything that could step outside that directory is
/// rejected:
/// - Empty names, `.` and `..`
/// - Names containing a separator (`/` or `\`)
/// - Absolute paths and Windows prefixes (`C:`)
pub fn validate_remote_name(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidPath("empty file name".into()));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(TransferError::InvalidPath(format!(
            "file name contains a path separator: {name}"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(TransferError::InvalidPath(format!(
            "not a plain file name: {name}"
        ))),
    }
}
