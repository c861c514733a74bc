use std::io;
use std::str::FromStr;

use log::{debug, warn};

use super::block::{BlockType, ChannelTag};
use super::constants::*;
use super::decoder::{Channel, DecodedFile};
use super::text::{command_lines, CommandLine};
use crate::io::options::{
    CodecOptions, CommonReaderOptions, OptionError, OptionSpec, ResolvedOptions, FIELD_INSTRUMENT,
};
use crate::io::traits::{Configuration, SpectrumIOError, SpectrumReader};
use crate::io::utils::read_to_buffer;
use crate::spectrum::{make_ids_unique, Spectrum, DEFAULT_ID};

/// Which channels of a file to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelSelection {
    #[default]
    All,
    Only(ChannelTag),
}

impl ChannelSelection {
    pub const CHOICES: &'static [&'static str] = &["all", "sample", "reference", "result"];

    pub fn accepts(&self, tag: ChannelTag) -> bool {
        match self {
            Self::All => true,
            Self::Only(t) => *t == tag,
        }
    }
}

impl FromStr for ChannelSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            ChannelTag::from_str(s).map(Self::Only)
        }
    }
}

/// Parse a block type written in hex, with or without a `0x` prefix
pub fn parse_block_type(value: &str) -> Result<u32, String> {
    let digits = value
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    u32::from_str_radix(digits, 16).map_err(|e| e.to_string())
}

/// Options of [`OpusExtReader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpusExtOptions {
    pub common: CommonReaderOptions,
    pub channel: ChannelSelection,
    /// Only emit data blocks with this masked type
    pub spectrum_block_type: Option<u32>,
    /// The command line operation holding the sample id
    pub operation: String,
    /// The command line key holding the sample id
    pub key: String,
    /// Store the values of every command line, not just `operation`
    pub add_command_lines: bool,
    /// Store the whole history log under `Opus.Log`
    pub add_log: bool,
}

impl Default for OpusExtOptions {
    fn default() -> Self {
        Self {
            common: CommonReaderOptions::default(),
            channel: ChannelSelection::All,
            spectrum_block_type: None,
            operation: OPERATION_MEASURE_SAMPLE.to_string(),
            key: KEY_SAMPLE_ID.to_string(),
            add_command_lines: false,
            add_log: false,
        }
    }
}

impl CodecOptions for OpusExtOptions {
    fn option_table() -> Vec<OptionSpec> {
        let mut table = CommonReaderOptions::TABLE.to_vec();
        table.extend([
            OptionSpec::choice(
                "channel",
                ChannelSelection::CHOICES,
                "all",
                "which channels to load",
            ),
            OptionSpec::text(
                "spectrum-block-type",
                "",
                "only load data blocks of this type, in hex, e.g. 100f",
            ),
            OptionSpec::text(
                "operation",
                OPERATION_MEASURE_SAMPLE,
                "the command line operation to get the sample ID from",
            ),
            OptionSpec::text(
                "key",
                KEY_SAMPLE_ID,
                "the command line key holding the sample ID",
            ),
            OptionSpec::flag(
                "add-command-lines",
                "whether to add the values of all command lines as sample data",
            ),
            OptionSpec::flag("add-log", "whether to add the complete log as sample data"),
        ]);
        table
    }

    fn from_resolved(resolved: &ResolvedOptions) -> Result<Self, OptionError> {
        let channel = resolved.text("channel");
        let channel = ChannelSelection::from_str(channel).map_err(|reason| {
            OptionError::InvalidValue {
                name: "channel".into(),
                value: channel.to_string(),
                reason,
            }
        })?;
        let block_type = resolved.text("spectrum-block-type");
        let spectrum_block_type = if block_type.is_empty() {
            None
        } else {
            Some(
                parse_block_type(block_type).map_err(|reason| OptionError::InvalidValue {
                    name: "spectrum-block-type".into(),
                    value: block_type.to_string(),
                    reason,
                })?,
            )
        };
        Ok(Self {
            common: CommonReaderOptions::from_resolved(resolved),
            channel,
            spectrum_block_type,
            operation: resolved.text("operation").to_string(),
            key: resolved.text("key").to_string(),
            add_command_lines: resolved.flag("add-command-lines"),
            add_log: resolved.flag("add-log"),
        })
    }
}

/// Reads every channel of an OPUS file.
///
/// Each data block becomes one spectrum tagged with its channel under the
/// `channel` key. The `channel` and `spectrum-block-type` options narrow
/// down which blocks are emitted. Sample ids come from the command lines in
/// the history log.
#[derive(Debug, Default, Clone)]
pub struct OpusExtReader {
    configuration: Configuration<OpusExtOptions>,
}

impl OpusExtReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: OpusExtOptions) -> Self {
        Self {
            configuration: Configuration::Resolved(options),
        }
    }

    pub fn from_args<S: AsRef<str>>(tokens: &[S]) -> Result<Self, SpectrumIOError> {
        let mut reader = Self::new();
        reader.resolve_options(tokens)?;
        Ok(reader)
    }

    /// An explicit block type takes precedence over the channel selection
    fn selected(options: &OpusExtOptions, channel: &Channel) -> bool {
        match options.spectrum_block_type {
            Some(t) => BlockType(t).masked() == channel.block_type.masked(),
            None => options.channel.accepts(channel.tag),
        }
    }

    /// Store command line values under `Opus.[n.]operation.type.key` and
    /// return the sample id, if the configured operation carried one. When
    /// several command lines of that operation carry the key, the last wins.
    fn apply_command_lines(
        options: &OpusExtOptions,
        commands: &[CommandLine],
        spectrum: &mut Spectrum,
    ) -> Option<String> {
        let mut sample_id = None;
        for (i, cmd) in commands.iter().enumerate() {
            let matches = cmd.operation == options.operation;
            if matches {
                if let Some(id) = cmd.get(&options.key) {
                    sample_id = Some(id.to_string());
                }
            }
            if !(matches || options.add_command_lines) {
                continue;
            }
            let index = if matches {
                String::new()
            } else {
                format!("{}.", i + 1)
            };
            for (key, value) in cmd.typed_values() {
                spectrum.set(
                    format!(
                        "{PREFIX_OPUS}{index}{}.{}.{key}",
                        cmd.operation, cmd.command_type
                    ),
                    value,
                );
            }
        }
        sample_id
    }

    /// Decode every selected channel from an in-memory file
    pub fn decode(
        &self,
        options: &OpusExtOptions,
        buffer: &[u8],
    ) -> Result<Vec<Spectrum>, SpectrumIOError> {
        let decoded = DecodedFile::decode(buffer)?;
        let history = decoded.history();
        let commands = command_lines(history.iter().copied());
        let instrument = decoded
            .parameter_value(INS)
            .map(|v| v.to_string());

        let channels: Vec<Channel> = decoded
            .channels()
            .into_iter()
            .filter(|c| Self::selected(options, c))
            .collect();
        if channels.is_empty() {
            warn!("No channel matched the selection {:?}", options.channel);
        }
        let many = channels.len() > 1;

        let mut spectra = Vec::with_capacity(channels.len());
        for channel in channels {
            let mut spectrum = channel.spectrum;
            let sample_id = Self::apply_command_lines(options, &commands, &mut spectrum);
            let base = match sample_id {
                Some(id) => id,
                None => {
                    debug!(
                        "No {} found in {} command lines",
                        options.key, options.operation
                    );
                    DEFAULT_ID.to_string()
                }
            };
            spectrum.id = if many {
                format!("{base}-{}", channel.tag)
            } else {
                base
            };
            if let Some(instrument) = instrument.as_ref() {
                spectrum.set(FIELD_INSTRUMENT, instrument.as_str());
            }
            if options.add_log {
                spectrum.set(FIELD_OPUS_LOG, history.join("\n"));
            }
            options.common.apply(&mut spectrum);
            spectra.push(spectrum);
        }
        make_ids_unique(&mut spectra);
        Ok(spectra)
    }
}

impl SpectrumReader for OpusExtReader {
    type Options = OpusExtOptions;

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
        let buffer = read_to_buffer(source)?;
        debug!("Read {} bytes from {name}", buffer.len());
        self.decode(options, &buffer)
    }
}
