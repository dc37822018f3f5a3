//! CLI configuration.
//!
//! Values come from, highest precedence first: command-line flags, the
//! `BRIDGE_*` environment variables, `<config-dir>/bridge-cli/config.json`,
//! and built-in defaults.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use bridge_session::SessionOptions;
use serde::{Deserialize, Serialize};

use crate::args::GlobalArgs;

pub const DEFAULT_BRIDGE_URL: &str = "https://api.bridge.example:443/";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

pub const ENV_URL: &str = "BRIDGE_URL";
pub const ENV_USER: &str = "BRIDGE_USER";
pub const ENV_PASS: &str = "BRIDGE_PASS";
pub const ENV_PROXY: &str = "BRIDGE_PROXY";

/// On-disk config file. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConfigFile {
    #[serde(default)]
    bridge_url: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    proxy: Option<String>,
    #[serde(default)]
    connect_timeout_secs: Option<u64>,
    #[serde(default)]
    download_queue_path: Option<PathBuf>,
    #[serde(default)]
    upload_queue_path: Option<PathBuf>,
}

impl ConfigFile {
    /// Reads the config file, falling back to defaults when it is missing
    /// or malformed.
    fn load() -> Self {
        let path = config_path();
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&data) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                Self::default()
            }
        }
    }
}

/// Basic-auth credentials for the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

/// Resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub bridge_url: reqwest::Url,
    pub proxy: Option<String>,
    pub connect_timeout: Duration,
    pub log_level: u8,
    pub session: SessionOptions,
    credentials: Option<Credentials>,
}

impl CliConfig {
    /// Loads the configuration from flags, the process environment and the
    /// config file.
    pub fn load(flags: &GlobalArgs) -> anyhow::Result<Self> {
        Self::resolve(flags, |key| std::env::var(key).ok(), ConfigFile::load())
    }

    pub(crate) fn resolve(
        flags: &GlobalArgs,
        env: impl Fn(&str) -> Option<String>,
        file: ConfigFile,
    ) -> anyhow::Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.is_empty());

        let raw_url = flags
            .url
            .clone()
            .or_else(|| env(ENV_URL))
            .or(file.bridge_url)
            .unwrap_or_else(|| DEFAULT_BRIDGE_URL.to_string());
        let bridge_url = parse_bridge_url(&raw_url)?;

        let proxy = flags.proxy.clone().or_else(|| env(ENV_PROXY)).or(file.proxy);

        let user = env(ENV_USER).or(file.user);
        let password = env(ENV_PASS).or(file.password);
        let credentials = match (user, password) {
            (Some(user), Some(password)) => Some(Credentials { user, password }),
            _ => None,
        };

        let defaults = SessionOptions::default();
        let session = SessionOptions {
            download_queue_path: file
                .download_queue_path
                .unwrap_or(defaults.download_queue_path),
            upload_queue_path: file.upload_queue_path.unwrap_or(defaults.upload_queue_path),
        };

        Ok(Self {
            bridge_url,
            proxy,
            connect_timeout: Duration::from_secs(
                file.connect_timeout_secs
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
            log_level: flags.log_level(),
            session,
            credentials,
        })
    }

    /// Credentials for authenticated commands.
    pub fn credentials(&self) -> anyhow::Result<&Credentials> {
        self.credentials.as_ref().with_context(|| {
            format!("missing credentials: set {ENV_USER} and {ENV_PASS} or add them to the config file")
        })
    }

    /// Whether the progress bar is drawn. Any log output disables it.
    pub fn show_progress(&self) -> bool {
        self.log_level == 0
    }
}

fn parse_bridge_url(raw: &str) -> anyhow::Result<reqwest::Url> {
    let url = reqwest::Url::parse(raw).with_context(|| format!("invalid bridge url: {raw}"))?;
    if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
        bail!("invalid bridge url: {raw}");
    }
    Ok(url)
}

/// Returns the config file path (`~/.config/bridge-cli/config.json` on Linux).
pub fn config_path() -> PathBuf {
    config_base_dir().join("bridge-cli").join("config.json")
}

fn config_base_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            if !xdg.is_empty() {
                return PathBuf::from(xdg);
            }
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config");
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library/Application Support");
        }
    }
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    PathBuf::from("/tmp")
}
