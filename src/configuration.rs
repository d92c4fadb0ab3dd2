use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::printer::Sink;

/// Where a backup's data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub kind: String,
    pub options: BTreeMap<String, String>,
}

/// Where a backup's data is written to. `dirname` is absolute once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub dirname: PathBuf,
    pub filename: String,
}

impl Target {
    pub fn path(&self) -> PathBuf {
        self.dirname.join(&self.filename)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub name: String,
    pub stop_on_failure: bool,
    pub source: Source,
    pub target: Target,
}

/// Validated backup settings, as loaded from a configuration document and
/// adjusted by command-line overrides.
pub struct Configuration {
    filename: PathBuf,
    working_dir: PathBuf,
    verbose: bool,
    colors: bool,
    debug: bool,
    simulate: bool,
    bootstrap: Option<String>,
    include_paths: Vec<PathBuf>,
    limit: Vec<String>,
    backups: Vec<Backup>,
    sinks: Vec<Box<dyn Sink>>,
}

impl Configuration {
    pub fn new(filename: &Path) -> Self {
        let working_dir = filename
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            filename: filename.to_path_buf(),
            working_dir,
            verbose: false,
            colors: false,
            debug: false,
            simulate: false,
            bootstrap: None,
            include_paths: Vec::new(),
            limit: Vec::new(),
            backups: Vec::new(),
            sinks: Vec::new(),
        }
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn colors(&self) -> bool {
        self.colors
    }

    pub fn set_colors(&mut self, colors: bool) {
        self.colors = colors;
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn simulate(&self) -> bool {
        self.simulate
    }

    pub fn set_simulate(&mut self, simulate: bool) {
        self.simulate = simulate;
    }

    pub fn bootstrap(&self) -> Option<&str> {
        self.bootstrap.as_deref()
    }

    pub fn set_bootstrap(&mut self, bootstrap: Option<String>) {
        self.bootstrap = bootstrap;
    }

    pub fn include_paths(&self) -> &[PathBuf] {
        &self.include_paths
    }

    pub fn set_include_paths(&mut self, paths: Vec<PathBuf>) {
        self.include_paths = paths;
    }

    /// Names of the backups to run; empty means all of them.
    pub fn limit(&self) -> &[String] {
        &self.limit
    }

    pub fn set_limit(&mut self, limit: Vec<String>) {
        self.limit = limit;
    }

    pub fn backups(&self) -> &[Backup] {
        &self.backups
    }

    pub fn add_backup(&mut self, backup: Backup) {
        self.backups.push(backup);
    }

    /// Backups selected by the limit, in declaration order.
    pub fn selected_backups(&self) -> impl Iterator<Item = &Backup> {
        self.backups
            .iter()
            .filter(move |b| self.limit.is_empty() || self.limit.iter().any(|l| *l == b.name))
    }

    pub fn add_sink(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn sinks(&self) -> &[Box<dyn Sink>] {
        &self.sinks
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("filename", &self.filename)
            .field("verbose", &self.verbose)
            .field("colors", &self.colors)
            .field("debug", &self.debug)
            .field("simulate", &self.simulate)
            .field("bootstrap", &self.bootstrap)
            .field("include_paths", &self.include_paths)
            .field("limit", &self.limit)
            .field("backups", &self.backups)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
