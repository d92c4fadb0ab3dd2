use std::cell::RefCell;
use std::io::Write;
use std::path::Path;

use owo_colors::OwoColorize;

use crate::configuration::Backup;
use crate::runner::RunResult;

/// Receives progress events from a backup run.
pub trait Sink {
    fn on_run_start(&self, _config_file: &Path) {}
    fn on_backup_start(&self, _backup: &Backup) {}
    fn on_backup_end(&self, _backup: &Backup, _succeeded: bool) {}
    fn on_debug(&self, _message: &str) {}
    fn on_run_end(&self, _result: &RunResult) {}
}

/// Human-readable progress on a terminal stream.
///
/// Per-backup lines appear only when verbose; debug lines only when
/// `detailed` (debug or simulate mode).
pub struct ConsolePrinter<W: Write> {
    out: RefCell<W>,
    verbose: bool,
    colors: bool,
    detailed: bool,
}

impl ConsolePrinter<std::io::Stdout> {
    pub fn stdout(verbose: bool, colors: bool, detailed: bool) -> Self {
        Self::new(std::io::stdout(), verbose, colors, detailed)
    }
}

impl<W: Write> ConsolePrinter<W> {
    pub fn new(out: W, verbose: bool, colors: bool, detailed: bool) -> Self {
        Self {
            out: RefCell::new(out),
            verbose,
            colors,
            detailed,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn line(&self, text: &str) {
        // a closed stdout must not abort the run
        let _ = writeln!(self.out.borrow_mut(), "{text}");
    }

    fn status(&self, text: &str, good: bool) -> String {
        match (self.colors, good) {
            (false, _) => text.to_string(),
            (true, true) => text.green().bold().to_string(),
            (true, false) => text.red().bold().to_string(),
        }
    }
}

impl<W: Write> Sink for ConsolePrinter<W> {
    fn on_run_start(&self, config_file: &Path) {
        if self.verbose {
            self.line(&format!("Configuration: {}", config_file.display()));
            self.line("");
        }
    }

    fn on_backup_start(&self, backup: &Backup) {
        if self.verbose {
            self.line(&format!("backup: [{}] {}", backup.source.kind, backup.name));
        }
    }

    fn on_backup_end(&self, backup: &Backup, succeeded: bool) {
        if self.verbose {
            let status = if succeeded { "ok" } else { "failed" };
            self.line(&format!("  {}: {}", backup.name, self.status(status, succeeded)));
        }
    }

    fn on_debug(&self, message: &str) {
        if self.detailed {
            let text = format!("  > {message}");
            if self.colors {
                self.line(&text.dimmed().to_string());
            } else {
                self.line(&text);
            }
        }
    }

    fn on_run_end(&self, result: &RunResult) {
        self.line("");
        if result.was_successful() {
            let text = format!(
                "OK ({} backup{}, {} error{})",
                result.backups(),
                plural(result.backups()),
                result.error_count(),
                plural(result.error_count()),
            );
            self.line(&self.status(&text, true));
        } else {
            let text = format!(
                "FAILURE! Backups: {}, failed: {}, errors: {}",
                result.backups(),
                result.backups_failed(),
                result.error_count(),
            );
            self.line(&self.status(&text, false));
            for error in result.errors() {
                self.line(&format!("  {error}"));
            }
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
