//! Command-line arguments.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// URI scheme marking the remote side of a `cp`.
pub const REMOTE_SCHEME: &str = "bridge://";

#[derive(Parser, Debug)]
#[command(
    name = "bridge",
    author,
    version,
    about = "Command-line client for the bridge encrypted storage service",
    disable_version_flag = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Print the version and exit
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    #[allow(dead_code)]
    version: (),

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Flags that apply to every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Bridge API URL
    #[arg(short = 'u', long = "url", global = true)]
    pub url: Option<String>,

    /// Proxy URL for all requests
    #[arg(short = 'p', long = "proxy", global = true)]
    pub proxy: Option<String>,

    /// Log verbosity, 0 (errors only) to 4 (trace)
    #[arg(short = 'l', long = "log", global = true, value_parser = parse_log_level)]
    pub log: Option<u8>,

    /// Same as --log 4
    #[arg(short = 'd', long = "debug", global = true)]
    pub debug: bool,
}

impl GlobalArgs {
    /// Effective log level after `--debug`.
    pub fn log_level(&self) -> u8 {
        if self.debug {
            4
        } else {
            self.log.unwrap_or(0)
        }
    }
}

fn parse_log_level(s: &str) -> Result<u8, String> {
    match s.parse::<u8>() {
        Ok(level) if level <= 4 => Ok(level),
        _ => Err("Invalid log level".to_string()),
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// List the files in a bucket
    ListFiles { bucket: String },

    /// List buckets, or the files of one bucket
    #[command(visible_alias = "ls")]
    ListBuckets { bucket: Option<String> },

    /// Download a file, or every file with `*`
    DownloadFile {
        bucket: String,
        file_name: String,
        path: Option<PathBuf>,
    },

    /// Upload a file or the files of a directory
    UploadFile { bucket: String, path: PathBuf },

    /// Print the id of a bucket
    GetBucketId { bucket: String },

    /// Create a bucket
    AddBucket { name: String },

    /// Delete a bucket
    RemoveBucket { bucket: String },

    /// Delete a file from a bucket
    #[command(visible_alias = "rm")]
    RemoveFile { bucket: String, file_name: String },

    /// Copy between a local path and bridge://<bucket>/[file]
    Cp {
        /// Upload the files of a directory
        #[arg(short = 'r', long = "recursive")]
        recursive: bool,
        src: String,
        dst: String,
    },

    /// Print information about the bridge
    GetInfo,
}

/// The remote side of a `cp`, `bridge://<bucket>/[file]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    pub bucket: String,
    /// Empty when the path names only the bucket.
    pub file_name: String,
}

impl RemotePath {
    /// Parses `s`, returning `None` when it lacks the remote scheme.
    pub fn parse(s: &str) -> Option<Self> {
        let rest = s.strip_prefix(REMOTE_SCHEME)?;
        let (bucket, file_name) = rest.split_once('/').unwrap_or((rest, ""));
        Some(Self {
            bucket: bucket.to_string(),
            file_name: file_name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("bridge").chain(args.iter().copied()))
    }

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn download_with_optional_path() {
        let cli = parse(&["download-file", "photos", "*", "./out"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::DownloadFile {
                bucket: "photos".into(),
                file_name: "*".into(),
                path: Some(PathBuf::from("./out")),
            })
        );

        let cli = parse(&["download-file", "photos", "a.txt"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::DownloadFile { path: None, .. })
        ));
    }

    #[test]
    fn aliases_resolve() {
        let cli = parse(&["ls"]).unwrap();
        assert_eq!(cli.command, Some(Commands::ListBuckets { bucket: None }));

        let cli = parse(&["rm", "photos", "a.txt"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::RemoveFile {
                bucket: "photos".into(),
                file_name: "a.txt".into(),
            })
        );
    }

    #[test]
    fn global_flags_after_command() {
        let cli = parse(&["list-files", "photos", "--url", "http://localhost:6382", "-l", "2"]).unwrap();
        assert_eq!(cli.global.url.as_deref(), Some("http://localhost:6382"));
        assert_eq!(cli.global.log_level(), 2);
    }

    #[test]
    fn debug_flag_is_trace() {
        let cli = parse(&["-d", "get-info"]).unwrap();
        assert_eq!(cli.global.log_level(), 4);
    }

    #[test]
    fn log_level_out_of_range() {
        let err = parse(&["--log", "5", "get-info"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert!(err.to_string().contains("Invalid log level"));
    }

    #[test]
    fn missing_argument_is_an_error() {
        let err = parse(&["get-bucket-id"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn short_version_flag() {
        let err = parse(&["-v"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn no_command_is_allowed() {
        let cli = parse(&[]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn cp_recursive_flag() {
        let cli = parse(&["cp", "-r", "./dir", "bridge://photos/"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Cp {
                recursive: true,
                src: "./dir".into(),
                dst: "bridge://photos/".into(),
            })
        );
    }

    #[test]
    fn remote_path_parsing() {
        assert_eq!(
            RemotePath::parse("bridge://photos/a.txt"),
            Some(RemotePath {
                bucket: "photos".into(),
                file_name: "a.txt".into(),
            })
        );
        assert_eq!(
            RemotePath::parse("bridge://photos"),
            Some(RemotePath {
                bucket: "photos".into(),
                file_name: String::new(),
            })
        );
        assert_eq!(RemotePath::parse("./photos/a.txt"), None);
    }
}
