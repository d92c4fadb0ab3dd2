use std::fs;
use std::path::{Path, PathBuf};

use semver::Version;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LauncherSettings;
use crate::verify::{verify_executable, ArchiveError};

/// Remote side of the self-update: both calls are best effort and answer
/// `None` when no usable data came back.
pub trait Transport {
    fn fetch_version(&self) -> Option<String>;
    fn fetch_payload(&self) -> Option<Vec<u8>>;
}

/// Blocking HTTP transport against the release server.
pub struct HttpTransport {
    settings: LauncherSettings,
}

impl HttpTransport {
    pub fn new(settings: LauncherSettings) -> Self {
        Self { settings }
    }

    fn get(&self, url: &str) -> Option<Vec<u8>> {
        match self.get_inner(url) {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            Ok(_) => None,
            Err(e) => {
                warn!(url, error = %e, "fetch failed");
                None
            }
        }
    }

    fn get_inner(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(format!("phpbu/{}", env!("CARGO_PKG_VERSION")))
            .timeout(self.settings.timeout)
            .build()?;

        let response = client.get(url).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

impl Transport for HttpTransport {
    fn fetch_version(&self) -> Option<String> {
        self.get(&self.settings.version_url)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    fn fetch_payload(&self) -> Option<Vec<u8>> {
        self.get(&self.settings.download_url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeState {
    Idle,
    VersionCheck,
    UpToDate,
    DownloadNeeded,
    Downloading,
    Verifying,
    Installed,
    RolledBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Upgrade,
    CheckOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateReport {
    UpToDate,
    Outdated { latest: Version },
    Installed { version: Version },
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Network-Error: Could not read version information")]
    VersionUnavailable,
    #[error("Network-Error: Invalid version information '{0}'")]
    InvalidVersion(String),
    #[error("Network-Error: Could not download the new version")]
    DownloadFailed,
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("downloaded file is not a valid executable: {0}")]
    ArchiveInvalid(#[from] ArchiveError),
    #[error("could not replace {path}: {source}")]
    Install {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Downloaded but not yet verified executable.
struct UpgradeCandidate {
    version: Version,
    payload: Vec<u8>,
    temp_path: PathBuf,
}

impl UpgradeCandidate {
    fn write(&self) -> std::io::Result<()> {
        fs::write(&self.temp_path, &self.payload)?;
        make_executable(&self.temp_path)
    }
}

/// Checks for, downloads, verifies and installs a newer build of the running
/// executable. Each step either moves forward or ends the attempt; nothing is
/// retried, and the executable is only touched after verification passed.
pub struct SelfUpdate<'a> {
    transport: &'a dyn Transport,
    current: Version,
    executable: PathBuf,
    work_dir: PathBuf,
    state: UpgradeState,
}

impl<'a> SelfUpdate<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        current: Version,
        executable: PathBuf,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            transport,
            current,
            executable,
            work_dir,
            state: UpgradeState::Idle,
        }
    }

    pub fn state(&self) -> UpgradeState {
        self.state
    }

    fn enter(&mut self, state: UpgradeState) {
        debug!(from = ?self.state, to = ?state, "self-update transition");
        self.state = state;
    }

    pub fn run(&mut self, mode: UpdateMode) -> Result<UpdateReport, UpdateError> {
        let Some(latest) = self.check()? else {
            return Ok(UpdateReport::UpToDate);
        };
        match mode {
            UpdateMode::CheckOnly => Ok(UpdateReport::Outdated { latest }),
            UpdateMode::Upgrade => self.install(latest),
        }
    }

    /// Returns the remote version when it is newer than the running one.
    pub fn check(&mut self) -> Result<Option<Version>, UpdateError> {
        self.enter(UpgradeState::VersionCheck);
        let raw = self
            .transport
            .fetch_version()
            .ok_or(UpdateError::VersionUnavailable)?;
        let latest = parse_version(&raw)?;
        debug!(current = %self.current, %latest, "compared versions");

        if latest > self.current {
            self.enter(UpgradeState::DownloadNeeded);
            Ok(Some(latest))
        } else {
            self.enter(UpgradeState::UpToDate);
            Ok(None)
        }
    }

    fn install(&mut self, latest: Version) -> Result<UpdateReport, UpdateError> {
        self.enter(UpgradeState::Downloading);
        let payload = self
            .transport
            .fetch_payload()
            .ok_or(UpdateError::DownloadFailed)?;
        let candidate = UpgradeCandidate {
            version: latest,
            payload,
            temp_path: self.temp_path(),
        };
        if let Err(source) = candidate.write() {
            let _ = fs::remove_file(&candidate.temp_path);
            return Err(UpdateError::Write {
                path: candidate.temp_path,
                source,
            });
        }

        self.enter(UpgradeState::Verifying);
        if let Err(e) = verify_executable(&candidate.temp_path) {
            self.roll_back(&candidate.temp_path);
            return Err(e.into());
        }

        // Atomic rename on the same filesystem.
        if let Err(source) = fs::rename(&candidate.temp_path, &self.executable) {
            self.roll_back(&candidate.temp_path);
            return Err(UpdateError::Install {
                path: self.executable.clone(),
                source,
            });
        }

        self.enter(UpgradeState::Installed);
        Ok(UpdateReport::Installed {
            version: candidate.version,
        })
    }

    fn roll_back(&mut self, temp_path: &Path) {
        let _ = fs::remove_file(temp_path);
        self.enter(UpgradeState::RolledBack);
    }

    /// `<work_dir>/<exe-stem>-temp[.<ext>]`
    pub fn temp_path(&self) -> PathBuf {
        let stem = self
            .executable
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "phpbu".to_string());
        let name = match self.executable.extension() {
            Some(ext) => format!("{stem}-temp.{}", ext.to_string_lossy()),
            None => format!("{stem}-temp"),
        };
        self.work_dir.join(name)
    }
}

/// Version of the running build.
pub fn current_version() -> Version {
    Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::new(0, 0, 0))
}

fn parse_version(raw: &str) -> Result<Version, UpdateError> {
    let trimmed = raw.trim();
    Version::parse(trimmed.trim_start_matches('v'))
        .map_err(|_| UpdateError::InvalidVersion(trimmed.to_string()))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o777 & !current_umask()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn current_umask() -> u32 {
    // umask can only be read by setting it, so put the old value straight back
    let mask = unsafe { libc::umask(0) };
    unsafe { libc::umask(mask) };
    u32::from(mask)
}
