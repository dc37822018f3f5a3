use std::fmt;

use serde::{Deserialize, Serialize};

/// A bucket as reported by the bridge.
///
/// `id` is assigned by the service and is distinct from the display `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketMeta {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub decrypted: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created: String,
}

impl fmt::Display for BucketMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID: {} \tDecrypted: {} \tCreated: {} \tName: {}",
            self.id, self.decrypted, self.created, self.name
        )
    }
}

/// A file stored in a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub id: String,
    #[serde(rename = "filename")]
    pub file_name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub decrypted: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mimetype: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created: String,
}

impl fmt::Display for FileMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID: {} \tSize: {} bytes \tDecrypted: {} \tType: {} \tCreated: {} \tName: {}",
            self.id, self.size, self.decrypted, self.mimetype, self.created, self.file_name
        )
    }
}

/// Service self-description returned by the info endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub host: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_meta_uses_service_field_names() {
        let json = r#"{
            "id": "f1",
            "filename": "report.pdf",
            "size": 2048,
            "decrypted": true,
            "mimetype": "application/pdf",
            "created": "2017-10-01T00:00:00.000Z"
        }"#;
        let file: FileMeta = serde_json::from_str(json).unwrap();
        assert_eq!(file.file_name, "report.pdf");
        assert_eq!(file.size, 2048);

        let back = serde_json::to_value(&file).unwrap();
        assert_eq!(back["filename"], "report.pdf");
        assert!(back.get("fileName").is_none());
    }

    #[test]
    fn bucket_meta_optional_fields_default() {
        let bucket: BucketMeta = serde_json::from_str(r#"{"id":"b1","name":"photos"}"#).unwrap();
        assert!(!bucket.decrypted);
        assert!(bucket.created.is_empty());
    }

    #[test]
    fn listing_lines_match_cli_format() {
        let bucket = BucketMeta {
            id: "b1".into(),
            name: "photos".into(),
            decrypted: true,
            created: "today".into(),
        };
        assert_eq!(
            bucket.to_string(),
            "ID: b1 \tDecrypted: true \tCreated: today \tName: photos"
        );

        let file = FileMeta {
            id: "f1".into(),
            file_name: "a.txt".into(),
            size: 3,
            decrypted: false,
            mimetype: "text/plain".into(),
            created: "today".into(),
        };
        assert_eq!(
            file.to_string(),
            "ID: f1 \tSize: 3 bytes \tDecrypted: false \tType: text/plain \tCreated: today \tName: a.txt"
        );
    }
}
