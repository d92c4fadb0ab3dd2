use std::fmt::Display;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context};
use tracing::debug;

use crate::configuration::{Backup, Configuration};

/// Tally of one backup run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    backups: usize,
    backups_failed: usize,
    errors: Vec<String>,
}

impl RunResult {
    pub fn backup_succeeded(&mut self) {
        self.backups += 1;
    }

    pub fn backup_failed(&mut self) {
        self.backups += 1;
        self.backups_failed += 1;
    }

    pub fn add_error(&mut self, backup: &str, message: impl Display) {
        self.errors.push(format!("{backup}: {message}"));
    }

    pub fn was_successful(&self) -> bool {
        self.backups_failed == 0 && self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn backups(&self) -> usize {
        self.backups
    }

    pub fn backups_failed(&self) -> usize {
        self.backups_failed
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

/// Executes the backups of a ready-to-run configuration.
///
/// An `Err` means the run itself broke down; per-backup problems are
/// reported through the returned [`RunResult`].
pub trait Runner {
    fn run(&self, config: &Configuration) -> anyhow::Result<RunResult>;
}

/// Runs `command` sources through the system shell, writing their stdout to
/// the backup target.
#[derive(Debug, Default)]
pub struct BackupRunner;

impl Runner for BackupRunner {
    fn run(&self, config: &Configuration) -> anyhow::Result<RunResult> {
        for sink in config.sinks() {
            sink.on_run_start(config.filename());
        }

        if let Some(bootstrap) = config.bootstrap() {
            let script = resolve_bootstrap(bootstrap, config)?;
            if config.simulate() {
                notify_debug(config, &format!("bootstrap: {}", script.display()));
            } else {
                run_bootstrap(&script)?;
            }
        }

        let mut result = RunResult::default();
        for backup in config.selected_backups() {
            for sink in config.sinks() {
                sink.on_backup_start(backup);
            }
            let succeeded = run_backup(config, backup, &mut result);
            for sink in config.sinks() {
                sink.on_backup_end(backup, succeeded);
            }
            if !succeeded && backup.stop_on_failure {
                notify_debug(config, &format!("{} failed, stopping", backup.name));
                break;
            }
        }

        for sink in config.sinks() {
            sink.on_run_end(&result);
        }
        Ok(result)
    }
}

fn run_backup(config: &Configuration, backup: &Backup, result: &mut RunResult) -> bool {
    let command = match source_command(backup) {
        Ok(command) => command,
        Err(e) => {
            result.backup_failed();
            result.add_error(&backup.name, e);
            return false;
        }
    };

    if config.simulate() {
        notify_debug(
            config,
            &format!("{command} > {}", backup.target.path().display()),
        );
        result.backup_succeeded();
        return true;
    }

    match execute(backup, command) {
        Ok(true) => {
            result.backup_succeeded();
            true
        }
        Ok(false) => {
            result.backup_failed();
            false
        }
        Err(e) => {
            result.backup_failed();
            result.add_error(&backup.name, format!("{e:#}"));
            false
        }
    }
}

fn source_command(backup: &Backup) -> anyhow::Result<&str> {
    if backup.source.kind != "command" {
        bail!("unsupported source type '{}'", backup.source.kind);
    }
    match backup.source.options.get("command") {
        Some(command) if !command.trim().is_empty() => Ok(command),
        _ => bail!("source option 'command' is missing"),
    }
}

/// Returns whether the command exited successfully.
fn execute(backup: &Backup, command: &str) -> anyhow::Result<bool> {
    fs::create_dir_all(&backup.target.dirname).with_context(|| {
        format!(
            "could not create target directory {}",
            backup.target.dirname.display()
        )
    })?;
    let target = backup.target.path();
    let file = File::create(&target)
        .with_context(|| format!("could not create target file {}", target.display()))?;

    debug!(backup = %backup.name, command, "running source command");
    let status = shell()
        .arg(command)
        .stdout(Stdio::from(file))
        .status()
        .context("could not start shell")?;
    Ok(status.success())
}

fn shell() -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C");
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c");
        cmd
    }
}

/// Relative bootstrap files are looked up next to the configuration first,
/// then in each include path.
fn resolve_bootstrap(bootstrap: &str, config: &Configuration) -> anyhow::Result<PathBuf> {
    let path = Path::new(bootstrap);
    if path.is_absolute() {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        bail!("bootstrap file not found: {bootstrap}");
    }
    std::iter::once(config.working_dir())
        .chain(config.include_paths().iter().map(PathBuf::as_path))
        .map(|dir| dir.join(path))
        .find(|candidate| candidate.is_file())
        .with_context(|| format!("bootstrap file not found: {bootstrap}"))
}

fn run_bootstrap(script: &Path) -> anyhow::Result<()> {
    debug!(script = %script.display(), "running bootstrap");
    let status = if cfg!(windows) {
        Command::new("cmd").arg("/C").arg(script).status()
    } else {
        Command::new("sh").arg(script).status()
    }
    .with_context(|| format!("could not run bootstrap {}", script.display()))?;
    if !status.success() {
        bail!("bootstrap {} failed with {status}", script.display());
    }
    Ok(())
}

fn notify_debug(config: &Configuration, message: &str) {
    for sink in config.sinks() {
        sink.on_debug(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::{Source, Target};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn command_backup(name: &str, command: &str, dir: &Path, stop_on_failure: bool) -> Backup {
        let mut options = BTreeMap::new();
        options.insert("command".to_string(), command.to_string());
        Backup {
            name: name.to_string(),
            stop_on_failure,
            source: Source {
                kind: "command".to_string(),
                options,
            },
            target: Target {
                dirname: dir.join("out"),
                filename: format!("{name}.txt"),
            },
        }
    }

    fn config_in(dir: &Path) -> Configuration {
        Configuration::new(&dir.join("phpbu.xml"))
    }

    #[test]
    fn result_counts() {
        let mut result = RunResult::default();
        assert!(result.was_successful());
        result.backup_succeeded();
        result.backup_failed();
        assert_eq!(result.backups(), 2);
        assert_eq!(result.backups_failed(), 1);
        assert!(!result.was_successful());
        assert_eq!(result.error_count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn command_output_lands_in_target() {
        let dir = tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.add_backup(command_backup("db", "echo dump", dir.path(), false));

        let result = BackupRunner.run(&config).unwrap();
        assert!(result.was_successful());
        let written = fs::read_to_string(dir.path().join("out/db.txt")).unwrap();
        assert_eq!(written.trim(), "dump");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_a_failure_without_error() {
        let dir = tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.add_backup(command_backup("db", "exit 3", dir.path(), false));
        config.add_backup(command_backup("files", "echo ok", dir.path(), false));

        let result = BackupRunner.run(&config).unwrap();
        assert_eq!(result.backups(), 2);
        assert_eq!(result.backups_failed(), 1);
        assert_eq!(result.error_count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn stop_on_failure_skips_remaining_backups() {
        let dir = tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.add_backup(command_backup("db", "exit 1", dir.path(), true));
        config.add_backup(command_backup("files", "echo ok", dir.path(), false));

        let result = BackupRunner.run(&config).unwrap();
        assert_eq!(result.backups(), 1);
        assert!(!dir.path().join("out/files.txt").exists());
    }

    #[test]
    fn simulate_writes_nothing() {
        let dir = tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.set_simulate(true);
        config.add_backup(command_backup("db", "echo dump", dir.path(), false));

        let result = BackupRunner.run(&config).unwrap();
        assert!(result.was_successful());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn limit_restricts_backups() {
        let dir = tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.set_simulate(true);
        config.add_backup(command_backup("db", "echo db", dir.path(), false));
        config.add_backup(command_backup("files", "echo files", dir.path(), false));
        config.set_limit(vec!["files".to_string()]);

        let result = BackupRunner.run(&config).unwrap();
        assert_eq!(result.backups(), 1);
    }

    #[test]
    fn unknown_source_type_is_an_error() {
        let dir = tempdir().unwrap();
        let mut config = config_in(dir.path());
        let mut backup = command_backup("db", "echo db", dir.path(), false);
        backup.source.kind = "mysqldump".to_string();
        config.add_backup(backup);

        let result = BackupRunner.run(&config).unwrap();
        assert_eq!(result.error_count(), 1);
        assert!(result.errors()[0].contains("unsupported source type"));
    }

    #[test]
    fn missing_bootstrap_breaks_the_run() {
        let dir = tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.set_bootstrap(Some("missing.sh".to_string()));

        let err = BackupRunner.run(&config).unwrap_err();
        assert!(err.to_string().contains("bootstrap file not found"));
    }

    #[test]
    fn bootstrap_is_found_on_include_path() {
        let dir = tempdir().unwrap();
        let lib = dir.path().join("lib");
        fs::create_dir(&lib).unwrap();
        fs::write(lib.join("boot.sh"), "true\n").unwrap();

        let mut config = config_in(dir.path());
        config.set_bootstrap(Some("boot.sh".to_string()));
        config.set_include_paths(vec![lib.clone()]);

        assert_eq!(resolve_bootstrap("boot.sh", &config).unwrap(), lib.join("boot.sh"));
    }
}
