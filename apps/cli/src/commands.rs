//! Command dispatch.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::bail;
use bridge_protocol::ServiceError;
use bridge_session::{
    BridgeService, CancellationMonitor, Command, Session, SessionReport, SessionRunner,
    resolve_bucket,
};

use crate::args::{Commands, REMOTE_SCHEME, RemotePath};
use crate::config::CliConfig;
use crate::http_bridge::HttpBridge;
use crate::render;

/// Runs `command` and returns the process exit code.
pub async fn dispatch(command: Commands, config: &CliConfig) -> anyhow::Result<ExitCode> {
    if command == Commands::GetInfo {
        let bridge = HttpBridge::new(config, None)?;
        return get_info(&bridge, config).await;
    }

    let bridge = HttpBridge::new(config, Some(config.credentials()?))?;
    match command {
        Commands::ListFiles { bucket }
        | Commands::ListBuckets {
            bucket: Some(bucket),
        } => run_session(&bridge, config, Session::list_files(bucket)?).await,
        Commands::ListBuckets { bucket: None } => list_buckets(&bridge).await,
        Commands::DownloadFile {
            bucket,
            file_name,
            path,
        } => run_session(&bridge, config, Session::download(bucket, file_name, path)?).await,
        Commands::UploadFile { bucket, path } => {
            run_session(&bridge, config, Session::upload(bucket, &path)?).await
        }
        Commands::GetBucketId { bucket } => {
            run_session(&bridge, config, Session::get_bucket_id(bucket)?).await
        }
        Commands::AddBucket { name } => add_bucket(&bridge, &name).await,
        Commands::RemoveBucket { bucket } => remove_bucket(&bridge, &bucket).await,
        Commands::RemoveFile { bucket, file_name } => {
            run_session(&bridge, config, Session::remove_file(bucket, file_name)?).await
        }
        Commands::Cp {
            recursive,
            src,
            dst,
        } => run_session(&bridge, config, copy_session(recursive, &src, &dst)?).await,
        Commands::GetInfo => get_info(&bridge, config).await,
    }
}

/// Runs a session with the terminal renderer attached and interrupt
/// handling armed.
async fn run_session(
    service: &dyn BridgeService,
    config: &CliConfig,
    session: Session,
) -> anyhow::Result<ExitCode> {
    let mut runner = SessionRunner::new(config.session.clone());
    let monitor = CancellationMonitor::new(runner.cancel_token());
    let watcher = monitor.watch(tokio::signal::ctrl_c());

    let show_progress = config.show_progress();
    let forwarder = runner
        .take_events()
        .map(|rx| tokio::spawn(render::forward_events(rx, show_progress)));

    let result = runner.run(service, session).await;

    // Drop the runner (and its sender) so the forwarder can drain and exit.
    drop(runner);
    if let Some(handle) = forwarder {
        let _ = handle.await;
    }
    watcher.abort();

    let report = result?;
    for line in report_lines(&report) {
        println!("{line}");
    }
    Ok(if succeeded(&report) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Lines printed to stdout for a finished session.
fn report_lines(report: &SessionReport) -> Vec<String> {
    let mut lines = Vec::new();
    match report.command {
        Some(Command::ListFiles) => {
            if report.files.is_empty() {
                lines.push("No files for bucket.".to_string());
            }
            lines.extend(report.files.iter().map(ToString::to_string));
        }
        Some(Command::GetBucketId) => {
            if let Some(bucket) = &report.bucket {
                lines.push(format!("ID: {}, Name: {}", bucket.id, bucket.name));
            }
        }
        Some(Command::RemoveFile) => {
            lines.push("File was successfully removed from bucket.".to_string());
        }
        Some(Command::DownloadFile) if report.batch && report.item_count == 0 => {
            lines.push("No files for bucket.".to_string());
        }
        Some(Command::UploadFile) if report.batch && report.item_count == 0 => {
            lines.push("No files to upload.".to_string());
        }
        _ => {}
    }
    if report.is_degraded() {
        lines.push(format!(
            "{} of {} transfers failed",
            report.failed, report.item_count
        ));
    }
    lines
}

/// A batch exits 0 even with failed items; a single failed transfer does
/// not.
fn succeeded(report: &SessionReport) -> bool {
    report.batch || report.failed == 0
}

/// Builds the session for `cp <src> <dst>`.
fn copy_session(recursive: bool, src: &str, dst: &str) -> anyhow::Result<Session> {
    match (RemotePath::parse(src), RemotePath::parse(dst)) {
        (Some(remote), None) => {
            if remote.file_name.is_empty() {
                bail!("Invalid Command Entry: missing file name in [{src}]");
            }
            Ok(Session::download(
                remote.bucket,
                remote.file_name,
                Some(PathBuf::from(dst)),
            )?)
        }
        (None, Some(remote)) => {
            let local = Path::new(src);
            let Ok(meta) = std::fs::metadata(local) else {
                bail!("Invalid file path: {src}");
            };
            let remote_name = remote.file_name.as_str();
            if meta.is_dir() {
                if !recursive {
                    bail!("cp: -r not specified; omitting directory '{src}'");
                }
                if !matches!(remote_name, "" | ".") {
                    bail!("Invalid Command Entry: a directory uploads into the bucket root");
                }
            } else {
                let local_name = local.file_name().and_then(|n| n.to_str()).unwrap_or("");
                if !matches!(remote_name, "" | ".") && remote_name != local_name {
                    bail!("Invalid Command Entry: remote file name must match [{local_name}]");
                }
            }
            Ok(Session::upload(remote.bucket, local)?)
        }
        _ => bail!(
            "Invalid Command Entry: exactly one side must be {REMOTE_SCHEME}<bucket_name>/[file_name]"
        ),
    }
}

async fn list_buckets(service: &dyn BridgeService) -> anyhow::Result<ExitCode> {
    let buckets = service.get_buckets().await.map_err(describe)?;
    if buckets.is_empty() {
        println!("No buckets.");
    }
    for bucket in &buckets {
        println!("{bucket}");
    }
    Ok(ExitCode::SUCCESS)
}

async fn add_bucket(service: &dyn BridgeService, name: &str) -> anyhow::Result<ExitCode> {
    let bucket = match service.create_bucket(name).await {
        Ok(bucket) => bucket,
        Err(ServiceError::Status(409)) => {
            bail!("Cannot create bucket [{name}]. Name already exists")
        }
        Err(e) => return Err(describe(e)),
    };
    println!(
        "ID: {} \tDecrypted: {} \tName: {}",
        bucket.id, bucket.decrypted, bucket.name
    );
    Ok(ExitCode::SUCCESS)
}

async fn remove_bucket(service: &dyn BridgeService, name: &str) -> anyhow::Result<ExitCode> {
    let bucket = resolve_bucket(service, name).await?;
    service.delete_bucket(&bucket.id).await.map_err(describe)?;
    println!("Bucket was successfully removed.");
    Ok(ExitCode::SUCCESS)
}

async fn get_info(service: &dyn BridgeService, config: &CliConfig) -> anyhow::Result<ExitCode> {
    let info = service.get_info().await.map_err(describe)?;
    println!("Bridge: {}\n", config.bridge_url);
    println!("Title: {}", info.title);
    println!("Description: {}", info.description);
    println!("Version: {}", info.version);
    println!("Host: {}", info.host);
    Ok(ExitCode::SUCCESS)
}

fn describe(e: ServiceError) -> anyhow::Error {
    match e {
        ServiceError::Unauthorized => anyhow::anyhow!("Invalid user credentials."),
        other => anyhow::anyhow!("Request failed: {other}"),
    }
}
