use std::time::Duration;
use thiserror::Error;

const DEFAULT_UPDATE_URL: &str = "https://phar.phpbu.de";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Platform suffix used to select the matching release binary.
const TARGET_STR: &str = if cfg!(all(target_arch = "x86_64", target_os = "linux")) {
    "x86_64-linux"
} else if cfg!(all(target_arch = "aarch64", target_os = "linux")) {
    "aarch64-linux"
} else if cfg!(all(target_arch = "x86_64", target_os = "macos")) {
    "x86_64-macos"
} else if cfg!(all(target_arch = "aarch64", target_os = "macos")) {
    "aarch64-macos"
} else if cfg!(target_os = "windows") {
    "x86_64-windows.exe"
} else {
    "unknown"
};

/// Knobs the launcher reads from its own environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherSettings {
    pub version_url: String,  // <base>/latest-version-of/phpbu
    pub download_url: String, // <base>/phpbu-<target>
    pub timeout: Duration,    // PHPBU_UPDATE_TIMEOUT, applied to each fetch
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("PHPBU_UPDATE_TIMEOUT must be a positive number of seconds, got '{0}'")]
    InvalidTimeout(String),
}

impl LauncherSettings {
    pub fn for_base_url(base: &str, timeout: Duration) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            version_url: format!("{base}/latest-version-of/phpbu"),
            download_url: format!("{base}/phpbu-{TARGET_STR}"),
            timeout,
        }
    }
}

pub fn launcher_settings() -> Result<LauncherSettings, SettingsError> {
    let base = std::env::var("PHPBU_UPDATE_URL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_UPDATE_URL.to_string());

    let timeout = match std::env::var("PHPBU_UPDATE_TIMEOUT") {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => return Err(SettingsError::InvalidTimeout(raw)),
        },
        Err(_) => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
    };

    Ok(LauncherSettings::for_base_url(&base, timeout))
}
