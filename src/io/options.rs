//! Declarative option tables and the command-style token parser that
//! resolves them.
//!
//! Every codec declares a fixed table of [`OptionSpec`] and a typed
//! configuration struct implementing [`CodecOptions`]. Raw tokens such as
//! `["--channel", "reference", "--keep-format"]` are only ever looked at by
//! the `clap` parser [`command`] builds; the codecs themselves read typed
//! fields.
use clap::builder::PossibleValuesParser;
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use indexmap::IndexMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    #[error("Unknown option: {0}")]
    UnknownOption(String),
    #[error("Option --{0} requires a value")]
    MissingValue(String),
    #[error("Invalid value {value:?} for --{name}, expected one of {choices:?}")]
    InvalidChoice {
        name: String,
        value: String,
        choices: Vec<String>,
    },
    #[error("Option --{0} is a flag and does not take a value")]
    UnexpectedValue(String),
    #[error("Unexpected argument: {0}")]
    UnexpectedArgument(String),
    #[error("Invalid value {value:?} for --{name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
}

/// The kind of value an option takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// A switch that is either present or absent
    Flag,
    /// Any string
    Text,
    /// One string out of a fixed set
    Choice(&'static [&'static str]),
}

/// A single declared option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    /// The option name, without the leading `--`
    pub name: &'static str,
    pub kind: OptionKind,
    /// The default value. Flags default to off regardless.
    pub default: &'static str,
    pub help: &'static str,
}

impl OptionSpec {
    pub const fn flag(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            kind: OptionKind::Flag,
            default: "",
            help,
        }
    }

    pub const fn text(name: &'static str, default: &'static str, help: &'static str) -> Self {
        Self {
            name,
            kind: OptionKind::Text,
            default,
            help,
        }
    }

    pub const fn choice(
        name: &'static str,
        choices: &'static [&'static str],
        default: &'static str,
        help: &'static str,
    ) -> Self {
        Self {
            name,
            kind: OptionKind::Choice(choices),
            default,
            help,
        }
    }

    /// The `--name` argument parsing this option
    pub fn to_arg(&self) -> Arg {
        let arg = Arg::new(self.name).long(self.name).help(self.help);
        let arg = match self.kind {
            OptionKind::Flag => return arg.action(ArgAction::SetTrue),
            OptionKind::Text => arg.action(ArgAction::Set).allow_hyphen_values(true),
            OptionKind::Choice(choices) => arg
                .action(ArgAction::Set)
                .value_parser(PossibleValuesParser::new(choices.iter().copied())),
        };
        if self.default.is_empty() {
            arg
        } else {
            arg.default_value(self.default)
        }
    }
}

/// Build the argument parser for an option table. It takes bare tokens,
/// without a program name, and a later occurrence of an option replaces an
/// earlier one.
pub fn command(table: &[OptionSpec]) -> Command {
    Command::new("options")
        .no_binary_name(true)
        .disable_help_flag(true)
        .args_override_self(true)
        .args(table.iter().map(OptionSpec::to_arg))
}

fn option_name(arg: &str) -> String {
    arg.split([' ', '='])
        .next()
        .unwrap_or(arg)
        .trim_start_matches("--")
        .to_string()
}

impl From<clap::Error> for OptionError {
    fn from(err: clap::Error) -> Self {
        let context = |kind: ContextKind| match err.get(kind) {
            Some(ContextValue::String(s)) => Some(s.clone()),
            Some(ContextValue::Strings(s)) => Some(s.join(",")),
            _ => None,
        };
        let arg = context(ContextKind::InvalidArg).unwrap_or_default();
        match err.kind() {
            ErrorKind::UnknownArgument if arg.starts_with("--") => Self::UnknownOption(arg),
            ErrorKind::UnknownArgument => Self::UnexpectedArgument(arg),
            ErrorKind::TooManyValues => Self::UnexpectedValue(option_name(&arg)),
            ErrorKind::InvalidValue => match context(ContextKind::InvalidValue) {
                Some(value) => Self::InvalidChoice {
                    name: option_name(&arg),
                    value,
                    choices: match err.get(ContextKind::ValidValue) {
                        Some(ContextValue::Strings(s)) => s.clone(),
                        _ => Vec::new(),
                    },
                },
                None => Self::MissingValue(option_name(&arg)),
            },
            _ => Self::UnexpectedArgument(err.to_string().trim().to_string()),
        }
    }
}

/// A resolved option value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Flag(bool),
    Text(String),
}

/// The outcome of resolving a token sequence against an option table.
///
/// Every declared option has an entry, holding either the parsed token or
/// the declared default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedOptions {
    values: IndexMap<&'static str, OptionValue>,
    explicit: Vec<&'static str>,
}

impl ResolvedOptions {
    /// Collect the values of `table` from matches of a [`command`] built
    /// from it, or of any command carrying the same arguments.
    pub fn from_matches(table: &[OptionSpec], matches: &ArgMatches) -> Self {
        let mut resolved = Self::default();
        for spec in table {
            let value = match spec.kind {
                OptionKind::Flag => OptionValue::Flag(matches.get_flag(spec.name)),
                OptionKind::Text | OptionKind::Choice(_) => OptionValue::Text(
                    matches
                        .get_one::<String>(spec.name)
                        .cloned()
                        .unwrap_or_else(|| spec.default.to_string()),
                ),
            };
            resolved.values.insert(spec.name, value);
            if matches.value_source(spec.name) == Some(ValueSource::CommandLine) {
                resolved.explicit.push(spec.name);
            }
        }
        resolved
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(OptionValue::Flag(true)))
    }

    pub fn text(&self, name: &str) -> &str {
        match self.values.get(name) {
            Some(OptionValue::Text(s)) => s.as_str(),
            _ => "",
        }
    }

    /// Whether the option was given explicitly rather than defaulted
    pub fn is_explicit(&self, name: &str) -> bool {
        self.explicit.iter().any(|n| *n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&&'static str, &OptionValue)> {
        self.values.iter()
    }
}

/// Resolve a sequence of command-style tokens against an option table.
///
/// Accepts `--name value`, `--name=value` and `--flag`.
pub fn resolve<S: AsRef<str>>(
    table: &[OptionSpec],
    tokens: &[S],
) -> Result<ResolvedOptions, OptionError> {
    let matches = command(table).try_get_matches_from(tokens.iter().map(|t| t.as_ref()))?;
    Ok(ResolvedOptions::from_matches(table, &matches))
}

/// The documentation of one option: name, value type, default and help text
pub type OptionHelp = (String, String, String, String);

/// A typed configuration struct for one codec, built from its option table.
pub trait CodecOptions: Sized + Clone {
    /// The declared option table
    fn option_table() -> Vec<OptionSpec>;

    /// Build the typed configuration from resolved values
    fn from_resolved(resolved: &ResolvedOptions) -> Result<Self, OptionError>;

    /// Resolve tokens and build the typed configuration in one step
    fn parse<S: AsRef<str>>(tokens: &[S]) -> Result<Self, OptionError> {
        let resolved = resolve(&Self::option_table(), tokens)?;
        Self::from_resolved(&resolved)
    }

    /// The argument parser for [`CodecOptions::option_table`]
    fn command() -> Command {
        command(&Self::option_table())
    }

    /// Describe every declared option, for documentation and command line
    /// generation.
    fn options_help() -> Vec<OptionHelp> {
        Self::command()
            .get_arguments()
            .map(|arg| {
                let kind = if !arg.get_action().takes_values() {
                    "flag".to_string()
                } else {
                    let choices: Vec<String> = arg
                        .get_possible_values()
                        .iter()
                        .map(|v| v.get_name().to_string())
                        .collect();
                    if choices.is_empty() {
                        "string".to_string()
                    } else {
                        format!("choice{{{}}}", choices.join(","))
                    }
                };
                let default = arg
                    .get_default_values()
                    .iter()
                    .map(|v| v.to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join(",");
                let help = arg.get_help().map(|h| h.to_string()).unwrap_or_default();
                (arg.get_id().as_str().to_string(), kind, default, help)
            })
            .collect()
    }
}

/// Options shared by every reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonReaderOptions {
    /// Stored under [`FIELD_INSTRUMENT`] when the source names no instrument
    pub instrument: String,
    /// Stored under [`FIELD_FORMAT`] unless `keep_format` is set
    pub format: String,
    pub keep_format: bool,
}

/// The sample data key holding the instrument name
pub const FIELD_INSTRUMENT: &str = "Instrument";
/// The sample data key holding the format marker
pub const FIELD_FORMAT: &str = "Format";

impl Default for CommonReaderOptions {
    fn default() -> Self {
        Self {
            instrument: "unknown".to_string(),
            format: "NIR".to_string(),
            keep_format: false,
        }
    }
}

impl CommonReaderOptions {
    pub const TABLE: [OptionSpec; 3] = [
        OptionSpec::text("instrument", "unknown", "the instrument name"),
        OptionSpec::text("format", "NIR", "the format type"),
        OptionSpec::flag(
            "keep-format",
            "whether to not override the format obtained from the file",
        ),
    ];

    pub fn from_resolved(resolved: &ResolvedOptions) -> Self {
        Self {
            instrument: resolved.text("instrument").to_string(),
            format: resolved.text("format").to_string(),
            keep_format: resolved.flag("keep-format"),
        }
    }

    /// Fill in the instrument and format markers on a freshly read spectrum
    pub fn apply(&self, spectrum: &mut crate::spectrum::Spectrum) {
        if !spectrum.has(FIELD_INSTRUMENT) {
            spectrum.set(FIELD_INSTRUMENT, self.instrument.as_str());
        }
        if !self.keep_format || !spectrum.has(FIELD_FORMAT) {
            spectrum.set(FIELD_FORMAT, self.format.as_str());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const TABLE: [OptionSpec; 3] = [
        OptionSpec::flag("all-spectra", "load everything"),
        OptionSpec::text("key", "SNM", "the key"),
        OptionSpec::choice("channel", &["all", "sample"], "all", "the channel"),
    ];

    #[test]
    fn test_defaults() {
        let resolved = resolve::<&str>(&TABLE, &[]).unwrap();
        assert!(!resolved.flag("all-spectra"));
        assert_eq!(resolved.text("key"), "SNM");
        assert_eq!(resolved.text("channel"), "all");
        assert!(!resolved.is_explicit("key"));
    }

    #[test]
    fn test_resolve_tokens() {
        let resolved = resolve(
            &TABLE,
            &["--all-spectra", "--key", "NAM", "--channel=sample"],
        )
        .unwrap();
        assert!(resolved.flag("all-spectra"));
        assert_eq!(resolved.text("key"), "NAM");
        assert_eq!(resolved.text("channel"), "sample");
        assert!(resolved.is_explicit("channel"));
    }

    #[test]
    fn test_later_occurrence_wins() {
        let resolved = resolve(&TABLE, &["--key", "NAM", "--key=-SNM"]).unwrap();
        assert_eq!(resolved.text("key"), "-SNM");
        assert!(resolved.is_explicit("key"));
        assert!(!resolved.is_explicit("channel"));
    }

    #[derive(Debug, Clone)]
    struct Toy;

    impl CodecOptions for Toy {
        fn option_table() -> Vec<OptionSpec> {
            TABLE.to_vec()
        }

        fn from_resolved(_resolved: &ResolvedOptions) -> Result<Self, OptionError> {
            Ok(Toy)
        }
    }

    #[test]
    fn test_options_help() {
        let help = Toy::options_help();
        assert_eq!(help.len(), 3);
        assert_eq!(help[0].0, "all-spectra");
        assert_eq!(help[0].1, "flag");
        assert_eq!(help[1].1, "string");
        assert_eq!(help[1].2, "SNM");
        assert_eq!(help[2].1, "choice{all,sample}");
        assert_eq!(help[2].3, "the channel");
    }

    #[test]
    fn test_resolve_errors() {
        assert_eq!(
            resolve(&TABLE, &["--bogus"]).unwrap_err(),
            OptionError::UnknownOption("--bogus".to_string())
        );
        assert_eq!(
            resolve(&TABLE, &["--key"]).unwrap_err(),
            OptionError::MissingValue("key".to_string())
        );
        match resolve(&TABLE, &["--channel", "result"]).unwrap_err() {
            OptionError::InvalidChoice { name, value, .. } => {
                assert_eq!(name, "channel");
                assert_eq!(value, "result");
            }
            other => panic!("Expected an invalid choice, got {other:?}"),
        }
        assert!(matches!(
            resolve(&TABLE, &["--all-spectra=yes"]).unwrap_err(),
            OptionError::UnexpectedValue(_)
        ));
        assert_eq!(
            resolve(&TABLE, &["stray"]).unwrap_err(),
            OptionError::UnexpectedArgument("stray".to_string())
        );
    }

    #[test]
    fn test_common_apply() {
        let resolved = resolve(&CommonReaderOptions::TABLE, &["--keep-format"]).unwrap();
        let opts = CommonReaderOptions::from_resolved(&resolved);
        let mut spec = crate::spectrum::Spectrum::new("x");
        spec.set(FIELD_FORMAT, "OPUS");
        opts.apply(&mut spec);
        assert_eq!(spec.get(FIELD_FORMAT).unwrap().to_string(), "OPUS");
        assert_eq!(spec.get(FIELD_INSTRUMENT).unwrap().to_string(), "unknown");

        let opts = CommonReaderOptions::default();
        opts.apply(&mut spec);
        assert_eq!(spec.get(FIELD_FORMAT).unwrap().to_string(), "NIR");
    }
}
