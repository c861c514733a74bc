use std::io::{self, BufRead, BufReader};
use std::path::Path;

use log::{debug, warn};
use regex::Regex;

use crate::io::compression::is_gzipped_extension;
use crate::io::options::{CodecOptions, CommonReaderOptions, OptionError, OptionSpec, ResolvedOptions};
use crate::io::traits::{Configuration, SpectrumIOError, SpectrumReader};
use crate::io::utils::STREAM_NAME;
use crate::spectrum::{Spectrum, DEFAULT_ID};

use super::DEFAULT_SEPARATOR;

/// How to turn a file name into a sample id
#[derive(Debug, Clone, Default)]
pub enum SampleIdExtraction {
    /// The file name without directories and extension
    #[default]
    FileStem,
    /// A capture group of a regular expression matched against the file name
    Pattern { regex: Regex, group: String },
}

impl SampleIdExtraction {
    fn file_stem(name: &str) -> String {
        let (_, path) = is_gzipped_extension(Path::new(name));
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_ID.to_string())
    }

    /// Derive the id for `name`. A bare stream has no name and gets
    /// [`DEFAULT_ID`].
    pub fn extract(&self, name: &str) -> String {
        if name == STREAM_NAME {
            return DEFAULT_ID.to_string();
        }
        match self {
            Self::FileStem => Self::file_stem(name),
            Self::Pattern { regex, group } => {
                let captured = regex.captures(name).and_then(|caps| match group.parse::<usize>() {
                    Ok(i) => caps.get(i),
                    Err(_) => caps.name(group),
                });
                match captured {
                    Some(m) => m.as_str().to_string(),
                    None => {
                        warn!(
                            "Sample id pattern {} group {group} did not match {name}",
                            regex.as_str()
                        );
                        Self::file_stem(name)
                    }
                }
            }
        }
    }
}

/// Options of [`XYReader`]
#[derive(Debug, Clone)]
pub struct XYReaderOptions {
    pub common: CommonReaderOptions,
    pub separator: String,
    pub sample_id: SampleIdExtraction,
}

impl Default for XYReaderOptions {
    fn default() -> Self {
        Self {
            common: CommonReaderOptions::default(),
            separator: DEFAULT_SEPARATOR.to_string(),
            sample_id: SampleIdExtraction::default(),
        }
    }
}

impl CodecOptions for XYReaderOptions {
    fn option_table() -> Vec<OptionSpec> {
        let mut table = CommonReaderOptions::TABLE.to_vec();
        table.extend([
            OptionSpec::text(
                "separator",
                DEFAULT_SEPARATOR,
                "the separator to use for identifying X and Y columns",
            ),
            OptionSpec::text(
                "sample-id-extraction",
                "",
                "the regular expression for extracting the sample ID from the filename",
            ),
            OptionSpec::text(
                "sample-id-group",
                "1",
                "the group number or name of the sample ID in the regular expression",
            ),
        ]);
        table
    }

    fn from_resolved(resolved: &ResolvedOptions) -> Result<Self, OptionError> {
        let separator = resolved.text("separator");
        if separator.is_empty() {
            return Err(OptionError::InvalidValue {
                name: "separator".into(),
                value: separator.to_string(),
                reason: "must not be empty".into(),
            });
        }
        let pattern = resolved.text("sample-id-extraction");
        let sample_id = if pattern.is_empty() {
            SampleIdExtraction::FileStem
        } else {
            let regex = Regex::new(pattern).map_err(|e| OptionError::InvalidValue {
                name: "sample-id-extraction".into(),
                value: pattern.to_string(),
                reason: e.to_string(),
            })?;
            SampleIdExtraction::Pattern {
                regex,
                group: resolved.text("sample-id-group").to_string(),
            }
        };
        Ok(Self {
            common: CommonReaderOptions::from_resolved(resolved),
            separator: separator.to_string(),
            sample_id,
        })
    }
}

/// Reads one spectrum per file from `wave<separator>amplitude` lines.
///
/// Points are stored last to first, so the lines are reversed on reading.
/// Blank lines are skipped.
#[derive(Debug, Default, Clone)]
pub struct XYReader {
    configuration: Configuration<XYReaderOptions>,
}

impl XYReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: XYReaderOptions) -> Self {
        Self {
            configuration: Configuration::Resolved(options),
        }
    }

    pub fn from_args<S: AsRef<str>>(tokens: &[S]) -> Result<Self, SpectrumIOError> {
        let mut reader = Self::new();
        reader.resolve_options(tokens)?;
        Ok(reader)
    }

    fn parse_number(value: &str, line_number: usize) -> Result<f64, SpectrumIOError> {
        value.trim().parse::<f64>().map_err(|e| {
            SpectrumIOError::Parse(format!("{value:?} on line {line_number}: {e}"))
        })
    }
}

impl SpectrumReader for XYReader {
    type Options = XYReaderOptions;

    fn configuration(&self) -> &Configuration<Self::Options> {
        &self.configuration
    }

    fn configuration_mut(&mut self) -> &mut Configuration<Self::Options> {
        &mut self.configuration
    }

    fn read_spectra<R: io::Read + ?Sized>(
        &self,
        options: &Self::Options,
        source: &mut R,
        name: &str,
    ) -> Result<Vec<Spectrum>, SpectrumIOError> {
        let mut spectrum = Spectrum::new(options.sample_id.extract(name));
        let handle = BufReader::new(source);
        for (i, line) in handle.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split(options.separator.as_str());
            let (Some(wave), Some(amplitude)) = (parts.next(), parts.next()) else {
                return Err(SpectrumIOError::Parse(format!(
                    "line {}: expected two columns separated by {:?}",
                    i + 1,
                    options.separator
                )));
            };
            spectrum.push(
                Self::parse_number(wave, i + 1)?,
                Self::parse_number(amplitude, i + 1)?,
            );
        }
        spectrum.reverse();
        debug!("Read {spectrum} from {name}");
        options.common.apply(&mut spectrum);
        Ok(vec![spectrum])
    }
}
