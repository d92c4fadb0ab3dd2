use std::collections::BTreeMap;
use std::ffi::OsString;

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use thiserror::Error;
use tracing::debug;

/// Malformed command line, carrying the tokenizer's own message.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ArgumentError(String);

/// Value carried by a single option occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValue {
    Flag(bool),
    Text(String),
    Absent,
}

impl TokenValue {
    /// Absent, `false` and the empty string never override anything.
    pub fn is_empty(&self) -> bool {
        match self {
            TokenValue::Flag(b) => !b,
            TokenValue::Text(s) => s.is_empty(),
            TokenValue::Absent => true,
        }
    }

    pub fn as_flag(&self) -> bool {
        match self {
            TokenValue::Flag(b) => *b,
            TokenValue::Text(s) => !matches!(s.as_str(), "" | "0" | "false"),
            TokenValue::Absent => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TokenValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One parsed option in command-line order, named by its long form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionToken {
    pub name: String,
    pub value: TokenValue,
}

impl OptionToken {
    pub fn new(name: &str, value: TokenValue) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

/// Keys an option may contribute to the override record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OverrideKey {
    Bootstrap,
    Colors,
    Configuration,
    Debug,
    IncludePath,
    Limit,
    Simulate,
    Verbose,
}

impl OverrideKey {
    pub fn from_option(name: &str) -> Option<Self> {
        let key = match name {
            "bootstrap" => OverrideKey::Bootstrap,
            "colors" => OverrideKey::Colors,
            "configuration" => OverrideKey::Configuration,
            "debug" => OverrideKey::Debug,
            "include-path" => OverrideKey::IncludePath,
            "limit" => OverrideKey::Limit,
            "simulate" => OverrideKey::Simulate,
            "verbose" => OverrideKey::Verbose,
            _ => return None,
        };
        Some(key)
    }
}

/// Command-line settings that take precedence over the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideRecord {
    values: BTreeMap<OverrideKey, TokenValue>,
}

impl OverrideRecord {
    pub fn set(&mut self, key: OverrideKey, value: TokenValue) {
        self.values.insert(key, value);
    }

    pub fn get(&self, key: OverrideKey) -> Option<&TokenValue> {
        self.values.get(&key)
    }

    /// The value for `key` if one was supplied and it is not empty.
    pub fn effective(&self, key: OverrideKey) -> Option<&TokenValue> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn text(&self, key: OverrideKey) -> Option<&str> {
        self.effective(key).and_then(TokenValue::as_text)
    }

    pub fn configuration(&self) -> Option<&str> {
        self.text(OverrideKey::Configuration)
    }
}

/// What the process should do after reading its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Run(OverrideRecord),
    Help,
    Version,
    SelfUpgrade,
    VersionCheck,
}

const FLAGS: [&str; 7] = [
    "colors",
    "debug",
    "simulate",
    "help",
    "version",
    "self-upgrade",
    "version-check",
];
const VALUES: [&str; 5] = ["bootstrap", "configuration", "include-path", "limit", "verbose"];

fn command() -> Command {
    Command::new("phpbu")
        .disable_help_flag(true)
        .disable_version_flag(true)
        .args_override_self(true)
        .arg(Arg::new("bootstrap").long("bootstrap").value_name("file"))
        .arg(Arg::new("colors").long("colors").action(ArgAction::SetTrue))
        .arg(
            Arg::new("configuration")
                .long("configuration")
                .value_name("file|dir"),
        )
        .arg(Arg::new("debug").long("debug").action(ArgAction::SetTrue))
        .arg(
            Arg::new("include-path")
                .long("include-path")
                .value_name("paths"),
        )
        .arg(Arg::new("limit").long("limit").value_name("a,b,c"))
        .arg(Arg::new("simulate").long("simulate").action(ArgAction::SetTrue))
        .arg(
            Arg::new("help")
                .short('h')
                .long("help")
                .action(ArgAction::SetTrue),
        )
        .arg(
            // presence flag; a value may be attached but is never used
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("true"),
        )
        .arg(
            Arg::new("version")
                .short('V')
                .long("version")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("self-upgrade")
                .long("self-upgrade")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("version-check")
                .long("version-check")
                .action(ArgAction::SetTrue),
        )
        // stray words are accepted and dropped
        .arg(
            Arg::new("operands")
                .num_args(0..)
                .action(ArgAction::Append)
                .hide(true),
        )
}

/// Split argv (including the binary name) into option tokens, in the order
/// they were given.
pub fn tokenize<I, T>(args: I) -> Result<Vec<OptionToken>, ArgumentError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = command()
        .try_get_matches_from(args)
        .map_err(|e| ArgumentError(e.to_string().trim_end().to_string()))?;

    if let Some(operands) = matches.get_many::<String>("operands") {
        debug!(operands = ?operands.collect::<Vec<_>>(), "ignoring operands");
    }

    let mut indexed: Vec<(usize, OptionToken)> = Vec::new();
    for name in FLAGS {
        if let Some(index) = given_index(&matches, name) {
            indexed.push((index, OptionToken::new(name, TokenValue::Flag(true))));
        }
    }
    for name in VALUES {
        if let Some(index) = given_index(&matches, name) {
            let value = matches
                .get_one::<String>(name)
                .map(|s| TokenValue::Text(s.clone()))
                .unwrap_or(TokenValue::Absent);
            indexed.push((index, OptionToken::new(name, value)));
        }
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, token)| token).collect())
}

fn given_index(matches: &ArgMatches, name: &str) -> Option<usize> {
    if matches.value_source(name) != Some(ValueSource::CommandLine) {
        return None;
    }
    matches.index_of(name)
}

/// Fold tokens into a directive. Informational and self-maintenance options
/// end processing where they appear; unknown names are skipped.
pub fn translate(tokens: &[OptionToken]) -> Directive {
    let mut record = OverrideRecord::default();
    for token in tokens {
        match token.name.as_str() {
            "help" => return Directive::Help,
            "version" => return Directive::Version,
            "self-upgrade" => return Directive::SelfUpgrade,
            "version-check" => return Directive::VersionCheck,
            name => match OverrideKey::from_option(name) {
                Some(OverrideKey::Verbose) => {
                    record.set(OverrideKey::Verbose, TokenValue::Flag(true))
                }
                Some(key) => record.set(key, token.value.clone()),
                None => debug!(option = name, "ignoring unrecognized option"),
            },
        }
    }
    Directive::Run(record)
}
