use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::configuration::{Backup, Configuration, Source, Target};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid xml configuration: {0}")]
    Xml(#[from] quick_xml::de::DeError),
    #[error("invalid json configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),
}

/// Document formats the loader understands, picked by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Xml,
    Json,
}

impl Format {
    /// `phpbu.xml.dist` is treated like `phpbu.xml`.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = name.strip_suffix(".dist").unwrap_or(&name);
        let ext = Path::new(name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "xml" => Ok(Format::Xml),
            "json" => Ok(Format::Json),
            _ => Err(LoadError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Build a configuration from the document at `path`.
pub fn load_configuration(path: &Path) -> Result<Configuration, LoadError> {
    let format = Format::from_path(path)?;
    debug!(path = %path.display(), ?format, "loading configuration");

    let contents = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let document = match format {
        Format::Xml => quick_xml::de::from_str::<XmlDocument>(&contents)?.into_document(),
        Format::Json => serde_json::from_str::<Document>(&contents)?,
    };

    let mut config = Configuration::new(path);
    config.set_verbose(document.verbose);
    config.set_colors(document.colors);
    config.set_debug(document.debug);
    config.set_bootstrap(document.bootstrap.filter(|b| !b.is_empty()));
    let base = config.working_dir().to_path_buf();
    for backup in document.backups {
        config.add_backup(backup.resolve(&base));
    }
    Ok(config)
}

// ── JSON shape (also the normalized form of the XML shape) ───────────────────

#[derive(Debug, Default, Deserialize)]
struct Document {
    #[serde(default)]
    verbose: bool,
    #[serde(default)]
    colors: bool,
    #[serde(default)]
    debug: bool,
    bootstrap: Option<String>,
    #[serde(default)]
    backups: Vec<BackupDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupDocument {
    name: String,
    #[serde(default)]
    stop_on_failure: bool,
    source: SourceDocument,
    target: TargetDocument,
}

#[derive(Debug, Deserialize)]
struct SourceDocument {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    options: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct TargetDocument {
    dirname: String,
    filename: String,
}

impl BackupDocument {
    fn resolve(self, base: &Path) -> Backup {
        let dirname = PathBuf::from(&self.target.dirname);
        let dirname = if dirname.is_absolute() {
            dirname
        } else {
            base.join(dirname)
        };
        Backup {
            name: self.name,
            stop_on_failure: self.stop_on_failure,
            source: Source {
                kind: self.source.kind,
                options: self.source.options,
            },
            target: Target {
                dirname,
                filename: self.target.filename,
            },
        }
    }
}

// ── XML shape ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct XmlDocument {
    #[serde(rename = "@verbose", default)]
    verbose: bool,
    #[serde(rename = "@colors", default)]
    colors: bool,
    #[serde(rename = "@debug", default)]
    debug: bool,
    #[serde(rename = "@bootstrap")]
    bootstrap: Option<String>,
    #[serde(default)]
    backups: XmlBackups,
}

#[derive(Debug, Default, Deserialize)]
struct XmlBackups {
    #[serde(rename = "backup", default)]
    backup: Vec<XmlBackup>,
}

#[derive(Debug, Deserialize)]
struct XmlBackup {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@stopOnFailure", default)]
    stop_on_failure: bool,
    source: XmlSource,
    target: XmlTarget,
}

#[derive(Debug, Deserialize)]
struct XmlSource {
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "option", default)]
    options: Vec<XmlOption>,
}

#[derive(Debug, Deserialize)]
struct XmlOption {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@value")]
    value: String,
}

#[derive(Debug, Deserialize)]
struct XmlTarget {
    #[serde(rename = "@dirname")]
    dirname: String,
    #[serde(rename = "@filename")]
    filename: String,
}

impl XmlDocument {
    fn into_document(self) -> Document {
        let backups = self
            .backups
            .backup
            .into_iter()
            .map(|b| BackupDocument {
                name: b.name,
                stop_on_failure: b.stop_on_failure,
                source: SourceDocument {
                    kind: b.source.kind,
                    options: b
                        .source
                        .options
                        .into_iter()
                        .map(|o| (o.name, o.value))
                        .collect(),
                },
                target: TargetDocument {
                    dirname: b.target.dirname,
                    filename: b.target.filename,
                },
            })
            .collect();
        Document {
            verbose: self.verbose,
            colors: self.colors,
            debug: self.debug,
            bootstrap: self.bootstrap,
            backups,
        }
    }
}
