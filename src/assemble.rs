use std::path::Path;

use tracing::debug;

use crate::args::{OverrideKey, OverrideRecord, TokenValue};
use crate::configuration::Configuration;
use crate::loader::{load_configuration, LoadError};
use crate::printer::ConsolePrinter;

type Setter = fn(&mut Configuration, &TokenValue);

/// Settings the command line may override, each with the setter it drives.
const OVERRIDES: [(OverrideKey, Setter); 5] = [
    (OverrideKey::Verbose, set_verbose),
    (OverrideKey::Colors, set_colors),
    (OverrideKey::Debug, set_debug),
    (OverrideKey::Simulate, set_simulate),
    (OverrideKey::Bootstrap, set_bootstrap),
];

fn set_verbose(config: &mut Configuration, value: &TokenValue) {
    config.set_verbose(value.as_flag());
}

fn set_colors(config: &mut Configuration, value: &TokenValue) {
    config.set_colors(value.as_flag());
}

fn set_debug(config: &mut Configuration, value: &TokenValue) {
    config.set_debug(value.as_flag());
}

fn set_simulate(config: &mut Configuration, value: &TokenValue) {
    config.set_simulate(value.as_flag());
}

fn set_bootstrap(config: &mut Configuration, value: &TokenValue) {
    config.set_bootstrap(value.as_text().map(str::to_string));
}

/// Load the configuration at `path` and lay the command-line overrides over
/// it, then attach the console sink.
pub fn assemble(path: &Path, overrides: &OverrideRecord) -> Result<Configuration, LoadError> {
    let mut config = load_configuration(path)?;
    apply_overrides(&mut config, overrides);

    let printer = ConsolePrinter::stdout(
        config.verbose(),
        config.colors(),
        config.debug() || config.simulate(),
    );
    config.add_sink(Box::new(printer));
    Ok(config)
}

/// Overrides that are absent or empty leave the loaded value untouched.
pub fn apply_overrides(config: &mut Configuration, overrides: &OverrideRecord) {
    for (key, setter) in OVERRIDES {
        if let Some(value) = overrides.effective(key) {
            debug!(?key, ?value, "command line overrides configuration");
            setter(config, value);
        }
    }

    config.set_limit(
        overrides
            .text(OverrideKey::Limit)
            .map(split_limit)
            .unwrap_or_default(),
    );

    if let Some(paths) = overrides.text(OverrideKey::IncludePath) {
        config.set_include_paths(
            std::env::split_paths(paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect(),
        );
    }
}

/// Split `a,b,c` into its names, keeping first occurrences in order.
pub fn split_limit(raw: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in raw.split(',').filter(|n| !n.is_empty()) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    fn document(contents: &str) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("phpbu.xml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    fn record(entries: &[(OverrideKey, TokenValue)]) -> OverrideRecord {
        let mut record = OverrideRecord::default();
        for (key, value) in entries {
            record.set(*key, value.clone());
        }
        record
    }

    #[test]
    fn overrides_win_over_file_settings() {
        let (_dir, path) = document(r#"<phpbu verbose="false" colors="false" bootstrap="file.sh"/>"#);
        let overrides = record(&[
            (OverrideKey::Verbose, TokenValue::Flag(true)),
            (OverrideKey::Colors, TokenValue::Flag(true)),
            (OverrideKey::Simulate, TokenValue::Flag(true)),
            (OverrideKey::Bootstrap, TokenValue::Text("cli.sh".into())),
        ]);

        let config = assemble(&path, &overrides).unwrap();
        assert!(config.verbose());
        assert!(config.colors());
        assert!(config.simulate());
        assert!(!config.debug());
        assert_eq!(config.bootstrap(), Some("cli.sh"));
        assert_eq!(config.sinks().len(), 1);
    }

    #[test]
    fn empty_overrides_keep_file_settings() {
        let (_dir, path) = document(r#"<phpbu verbose="true" debug="true" bootstrap="file.sh"/>"#);
        let overrides = record(&[
            (OverrideKey::Bootstrap, TokenValue::Text(String::new())),
            (OverrideKey::Verbose, TokenValue::Absent),
            (OverrideKey::Debug, TokenValue::Flag(false)),
        ]);

        let config = assemble(&path, &overrides).unwrap();
        assert!(config.verbose());
        assert!(config.debug());
        assert_eq!(config.bootstrap(), Some("file.sh"));
    }

    #[test]
    fn assembling_twice_is_stable() {
        let (_dir, path) = document(r#"<phpbu colors="true"/>"#);
        let empty = OverrideRecord::default();

        let first = assemble(&path, &empty).unwrap();
        let second = assemble(&path, &empty).unwrap();
        assert_eq!(format!("{first:?}"), format!("{second:?}"));
    }

    #[test]
    fn limit_is_split_in_order() {
        assert_eq!(split_limit("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(split_limit("c,a,c,,b"), vec!["c", "a", "b"]);
        assert!(split_limit("").is_empty());
    }

    #[test]
    fn absent_or_empty_limit_means_no_restriction() {
        let (_dir, path) = document("<phpbu/>");
        let config = assemble(&path, &OverrideRecord::default()).unwrap();
        assert!(config.limit().is_empty());

        let overrides = record(&[(OverrideKey::Limit, TokenValue::Text(String::new()))]);
        let config = assemble(&path, &overrides).unwrap();
        assert!(config.limit().is_empty());

        let overrides = record(&[(OverrideKey::Limit, TokenValue::Text("a,b,c".into()))]);
        let config = assemble(&path, &overrides).unwrap();
        assert_eq!(config.limit(), ["a", "b", "c"]);
    }

    #[test]
    fn include_path_is_split_with_os_separator() {
        let (_dir, path) = document("<phpbu/>");
        let joined = std::env::join_paths(["/opt/one", "/opt/two"]).unwrap();
        let overrides = record(&[(
            OverrideKey::IncludePath,
            TokenValue::Text(joined.to_string_lossy().into_owned()),
        )]);

        let config = assemble(&path, &overrides).unwrap();
        assert_eq!(
            config.include_paths(),
            [PathBuf::from("/opt/one"), PathBuf::from("/opt/two")]
        );
    }

    #[test]
    fn load_errors_propagate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("phpbu.ini");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(
            assemble(&path, &OverrideRecord::default()),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }
}
