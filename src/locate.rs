use std::path::{Path, PathBuf};

use tracing::debug;

/// File names searched, in order, inside a configuration directory.
pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["phpbu.xml", "phpbu.xml.dist"];

/// Resolve the configuration document to use.
///
/// An explicit path wins when it is a regular file; when it is a directory
/// the default names are searched inside it. Without an explicit path the
/// default names are searched in `cwd`. `None` means nothing could be found,
/// including an explicit path that does not exist.
pub fn locate_configuration(explicit: Option<&str>, cwd: &Path) -> Option<PathBuf> {
    match explicit {
        Some(raw) => {
            let candidate = cwd.join(raw);
            if candidate.is_file() {
                debug!(path = %candidate.display(), "using explicit configuration file");
                return candidate.canonicalize().ok();
            }
            if candidate.is_dir() {
                return search_directory(&candidate);
            }
            debug!(path = %candidate.display(), "explicit configuration path does not exist");
            None
        }
        None => search_directory(cwd),
    }
}

fn search_directory(dir: &Path) -> Option<PathBuf> {
    DEFAULT_CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .and_then(|path| {
            debug!(path = %path.display(), "found default configuration file");
            path.canonicalize().ok()
        })
}
