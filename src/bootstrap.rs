use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

use tracing::debug;

use crate::args::{tokenize, translate, Directive, OverrideRecord};
use crate::assemble::assemble;
use crate::config::{LauncherSettings, SettingsError};
use crate::exit::ExitOutcome;
use crate::locate::locate_configuration;
use crate::runner::{BackupRunner, Runner};
use crate::update::{
    current_version, HttpTransport, SelfUpdate, Transport, UpdateError, UpdateMode, UpdateReport,
};
use crate::usage::{version_string, HELP, LOGO};

/// Per-process context threaded through argument handling, configuration
/// assembly, the backup run and the self-update path.
pub struct Bootstrap<W: Write> {
    out: W,
    cwd: PathBuf,
    executable: Option<PathBuf>,
    runner: Box<dyn Runner>,
    /// Unusable update settings only surface on the self-update path.
    transport: Result<Box<dyn Transport>, SettingsError>,
    version_printed: bool,
}

impl<W: Write> Bootstrap<W> {
    pub fn new(out: W, cwd: PathBuf, settings: Result<LauncherSettings, SettingsError>) -> Self {
        Self {
            out,
            cwd,
            executable: None,
            runner: Box::new(BackupRunner),
            transport: settings.map(|s| Box::new(HttpTransport::new(s)) as Box<dyn Transport>),
            version_printed: false,
        }
    }

    #[cfg(test)]
    fn with_runner(mut self, runner: Box<dyn Runner>) -> Self {
        self.runner = runner;
        self
    }

    #[cfg(test)]
    fn with_transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Ok(transport);
        self
    }

    /// Path replaced by a self-upgrade; defaults to the running executable.
    #[cfg(test)]
    fn with_executable(mut self, executable: PathBuf) -> Self {
        self.executable = Some(executable);
        self
    }

    pub fn run<I, T>(&mut self, args: I) -> ExitOutcome
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let tokens = match tokenize(args) {
            Ok(tokens) => tokens,
            Err(e) => {
                self.say(&format!("{e}\n\nUse 'phpbu --help' for usage."));
                return ExitOutcome::Exception;
            }
        };

        match translate(&tokens) {
            Directive::Help => {
                self.print_version();
                self.say(HELP);
                ExitOutcome::Success
            }
            Directive::Version => {
                self.print_version();
                ExitOutcome::Success
            }
            Directive::SelfUpgrade => self.self_update(UpdateMode::Upgrade),
            Directive::VersionCheck => self.self_update(UpdateMode::CheckOnly),
            Directive::Run(overrides) => self.execute(&overrides),
        }
    }

    fn execute(&mut self, overrides: &OverrideRecord) -> ExitOutcome {
        let Some(path) = locate_configuration(overrides.configuration(), &self.cwd) else {
            self.say(LOGO);
            self.print_version();
            self.say(HELP);
            return ExitOutcome::Exception;
        };

        self.print_version();
        let config = match assemble(&path, overrides) {
            Ok(config) => config,
            Err(e) => {
                self.say(&e.to_string());
                return ExitOutcome::Exception;
            }
        };

        debug!(
            backups = config.backups().len(),
            limit = ?config.limit(),
            "configuration ready"
        );
        // the runner prints through its own sink
        let _ = self.out.flush();
        match self.runner.run(&config) {
            Ok(result) => ExitOutcome::from_run(&result),
            Err(e) => {
                self.say(&format!("{e:#}"));
                ExitOutcome::Exception
            }
        }
    }

    fn self_update(&mut self, mode: UpdateMode) -> ExitOutcome {
        self.print_version();
        let executable = match self.executable.clone() {
            Some(path) => path,
            None => match std::env::current_exe() {
                Ok(path) => path,
                Err(e) => {
                    self.say(&format!("Could not locate the running executable: {e}"));
                    return ExitOutcome::Exception;
                }
            },
        };

        let result = {
            let transport = match &self.transport {
                Ok(transport) => transport,
                Err(e) => {
                    let message = e.to_string();
                    self.say(&message);
                    return ExitOutcome::Exception;
                }
            };
            let mut update = SelfUpdate::new(
                transport.as_ref(),
                current_version(),
                executable,
                self.cwd.clone(),
            );
            let result = update.run(mode);
            debug!(state = ?update.state(), "self-update finished");
            result
        };

        match result {
            Ok(UpdateReport::UpToDate) => {
                match mode {
                    UpdateMode::Upgrade => {
                        self.say("You already have the latest version of phpbu installed.")
                    }
                    UpdateMode::CheckOnly => self.say("You are using the latest version of phpbu."),
                }
                ExitOutcome::Success
            }
            Ok(UpdateReport::Outdated { latest }) => {
                self.say(&format!(
                    "You are not using the latest version of phpbu.\n\
                     Use 'phpbu --self-upgrade' to install phpbu version {latest}"
                ));
                ExitOutcome::Success
            }
            Ok(UpdateReport::Installed { version }) => {
                self.say(&format!("phpbu updated to version {version}"));
                ExitOutcome::Success
            }
            Err(
                e @ (UpdateError::VersionUnavailable
                | UpdateError::InvalidVersion(_)
                | UpdateError::DownloadFailed),
            ) => {
                self.say(&e.to_string());
                ExitOutcome::Exception
            }
            Err(e) => {
                self.say(&format!("Upgrade failed: {e}"));
                ExitOutcome::Exception
            }
        }
    }

    fn print_version(&mut self) {
        if self.version_printed {
            return;
        }
        self.version_printed = true;
        let line = version_string();
        self.say(&format!("{line}\n"));
    }

    fn say(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
    }

    #[cfg(test)]
    fn output(&self) -> &W {
        &self.out
    }
}
