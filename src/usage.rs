pub const LOGO: &str = r"
       __          __
      / /_  ____  / /_  __  __
     / __ \/ __ \/ __ \/ / / /
    / /_/ / /_/ / /_/ / /_/ /
   / .___/\____/_.___/\__,_/
  /_/   backup bootstrap
";

pub const HELP: &str = "Usage: phpbu [option]

  --bootstrap=<file>         A \"bootstrap\" file that is run before any backup.
  --colors                   Use colors in output.
  --configuration=<file|dir> A phpbu configuration file or a directory holding one.
  --debug                    Display debugging information during backup generation.
  --include-path=<paths>     Additional directories to search for the bootstrap file.
  --limit=<subset>           Limit backup execution to a subset (comma separated names).
  --simulate                 Perform a trial run with no changes made.
  -h, --help                 Print this usage information.
  -v, --verbose              Output more verbose information.
  -V, --version              Output version information and exit.
  --self-upgrade             Upgrade phpbu to the latest version.
  --version-check            Check whether phpbu is up to date.
";

/// First line of every interactive run.
pub fn version_string() -> String {
    format!("phpbu {}", clap::crate_version!())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_names_package_version() {
        assert_eq!(
            version_string(),
            format!("phpbu {}", env!("CARGO_PKG_VERSION"))
        );
    }
}
