//! Turning a whole OPUS buffer into classified blocks and per-channel
//! spectra.
use log::{info, warn};

use super::block::{
    to_hex_string, Block, BlockType, ChannelTag, DataBlock, DataKind, DirectoryEntry, TextBlock,
    UnknownBlock,
};
use super::constants::*;
use super::directory::BlockDirectory;
use super::params::{decode_parameters, ParameterBlock};
use crate::io::traits::SpectrumIOError;
use crate::params::SampleValue;
use crate::spectrum::{Spectrum, DEFAULT_ID};

/// The abscissa described by a data status parameter block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axis {
    pub first: f64,
    pub last: f64,
    pub num_points: usize,
}

impl Axis {
    /// Read `FXV`, `LXV` and `NPT`. `None` if any is missing, an error if
    /// `NPT` is negative.
    pub fn from_parameters(parameters: &ParameterBlock) -> Option<Result<Self, SpectrumIOError>> {
        let first = parameters.get_f64(FXV)?;
        let last = parameters.get_f64(LXV)?;
        let num_points = parameters.get_i64(NPT)?;
        if num_points < 0 {
            return Some(Err(SpectrumIOError::MalformedBlock(format!(
                "Negative point count {num_points} in block {}",
                parameters.entry.index
            ))));
        }
        Some(Ok(Self {
            first,
            last,
            num_points: num_points as usize,
        }))
    }

    /// The step between consecutive points, 0 for fewer than two points
    pub fn increment(&self) -> f64 {
        if self.num_points > 1 {
            (self.last - self.first) / (self.num_points - 1) as f64
        } else {
            0.0
        }
    }

    pub fn waves(&self) -> Vec<f64> {
        let increment = self.increment();
        (0..self.num_points)
            .map(|i| self.first + i as f64 * increment)
            .collect()
    }
}

/// One spectrum materialized from a data block
#[derive(Debug, Clone)]
pub struct Channel {
    /// Index of the data block in the directory
    pub block_index: usize,
    pub block_type: BlockType,
    pub tag: ChannelTag,
    pub data_kind: Option<DataKind>,
    pub spectrum: Spectrum,
}

fn classify<'a>(entry: DirectoryEntry, bytes: &'a [u8]) -> Block<'a> {
    let block_type = entry.block_type;
    if block_type.is_data() {
        Block::Data(DataBlock { entry, bytes })
    } else if block_type.is_parameter() {
        Block::Parameter(decode_parameters(entry, bytes))
    } else if block_type.is_text() {
        Block::Text(TextBlock::from_bytes(entry, bytes))
    } else {
        Block::Unknown(UnknownBlock { entry, bytes })
    }
}

/// Every block of one file, in directory order.
///
/// Data and unknown blocks borrow from the file buffer, parameter and text
/// blocks are decoded eagerly.
#[derive(Debug, Clone)]
pub struct DecodedFile<'a> {
    pub directory: BlockDirectory,
    pub blocks: Vec<Block<'a>>,
}

impl<'a> DecodedFile<'a> {
    /// Parse the directory and classify every block it lists.
    ///
    /// A directory entry that lies outside the buffer fails the whole file.
    /// Blocks of unknown type are kept as [`Block::Unknown`].
    pub fn decode(buffer: &'a [u8]) -> Result<Self, SpectrumIOError> {
        let directory = BlockDirectory::parse(buffer)?;
        let mut blocks = Vec::with_capacity(directory.len());
        for entry in directory.iter() {
            if directory.is_self_entry(entry) || entry.block_type.is_dummy() {
                continue;
            }
            let bytes = buffer.get(entry.offset..entry.end()).ok_or(
                SpectrumIOError::TruncatedFile {
                    offset: entry.offset,
                    length: entry.length_bytes(),
                    available: buffer.len(),
                },
            )?;
            let block = classify(*entry, bytes);
            if let Block::Unknown(_) = block {
                warn!("Unknown block type {} for {entry}", entry.block_type);
            }
            blocks.push(block);
        }
        Ok(Self { directory, blocks })
    }

    pub fn data_blocks(&self) -> impl Iterator<Item = &DataBlock<'a>> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Data(d) => Some(d),
            _ => None,
        })
    }

    pub fn parameter_blocks(&self) -> impl Iterator<Item = &ParameterBlock> {
        self.blocks.iter().filter_map(|b| b.as_parameters())
    }

    pub fn text_blocks(&self) -> impl Iterator<Item = &TextBlock> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Text(t) => Some(t),
            _ => None,
        })
    }

    pub fn unknown_blocks(&self) -> impl Iterator<Item = &UnknownBlock<'a>> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Unknown(u) => Some(u),
            _ => None,
        })
    }

    /// The history log: every entry of every text block, in directory order
    pub fn history(&self) -> Vec<&str> {
        self.text_blocks().flat_map(|t| t.entries()).collect()
    }

    /// All text blocks joined into one string, entries separated by newlines
    pub fn history_text(&self) -> String {
        self.history().join("\n")
    }

    /// The first value stored under `key` in any parameter block
    pub fn parameter_value(&self, key: &str) -> Option<&SampleValue> {
        self.parameter_blocks().find_map(|p| p.get(key))
    }

    /// The data status block for the `occurrence`th data block of its type.
    ///
    /// When a file holds more data blocks of one type than data status
    /// blocks, the extra data blocks share the first one.
    pub fn data_status_for(
        &self,
        data: &DataBlock<'_>,
        occurrence: usize,
    ) -> Option<&ParameterBlock> {
        let wanted = data.entry.block_type.data_status_type();
        let candidates: Vec<&ParameterBlock> = self
            .parameter_blocks()
            .filter(|p| p.entry.block_type == wanted)
            .collect();
        candidates
            .get(occurrence)
            .or_else(|| candidates.first())
            .copied()
    }

    /// The non data status parameter blocks that apply to `tag`: those whose
    /// channel bits are unset or name the same channel.
    pub fn shared_parameters_for(&self, tag: ChannelTag) -> impl Iterator<Item = &ParameterBlock> {
        self.parameter_blocks().filter(move |p| {
            let block_type = p.entry.block_type;
            block_type.parameter_bits() != 1
                && match block_type.channel() {
                    None => true,
                    Some(t) => t == tag,
                }
        })
    }

    /// Build the spectrum of one data block.
    ///
    /// `occurrence` counts the data blocks of the same type that precede this
    /// one. The spectrum gets its own copy of every applicable parameter, so
    /// two channels sharing a parameter block never share state.
    pub fn materialize(
        &self,
        data: &DataBlock<'_>,
        occurrence: usize,
    ) -> Result<Channel, SpectrumIOError> {
        let block_type = data.entry.block_type;
        let tag = block_type.channel().ok_or_else(|| {
            SpectrumIOError::MalformedBlock(format!(
                "Data block {} of type {block_type} has no channel",
                data.entry.index
            ))
        })?;

        let mut spectrum = Spectrum::new(DEFAULT_ID);
        let mut warnings: Vec<String> = Vec::new();
        for parameters in self.shared_parameters_for(tag) {
            parameters.copy_into(&mut spectrum.sample_data);
            warnings.extend(parameters.diagnostics.iter().cloned());
        }

        let data_status = self.data_status_for(data, occurrence);
        let axis = match data_status {
            Some(parameters) => {
                parameters.copy_into(&mut spectrum.sample_data);
                warnings.extend(parameters.diagnostics.iter().cloned());
                match Axis::from_parameters(parameters).transpose()? {
                    Some(axis) => Some((axis, parameters.get_f64(CSF).unwrap_or(1.0))),
                    None => {
                        warnings.push(format!(
                            "Parameter block {} lacks {FXV}, {LXV} or {NPT}",
                            parameters.entry.index
                        ));
                        None
                    }
                }
            }
            None => {
                warnings.push(format!(
                    "No parameter block of type {} for data block {}",
                    block_type.data_status_type(),
                    data.entry.index
                ));
                None
            }
        };

        match axis {
            Some((axis, scale)) => {
                let values = data.values(axis.num_points).ok_or_else(|| {
                    SpectrumIOError::MalformedBlock(format!(
                        "Data block {} holds {} values but {NPT} is {}",
                        data.entry.index,
                        data.capacity(),
                        axis.num_points
                    ))
                })?;
                spectrum.waves = axis.waves();
                spectrum.amplitudes = values.into_iter().map(|v| v as f64 * scale).collect();
                spectrum.set(FIELD_OPUS_FIRST_X, axis.first);
                spectrum.set(FIELD_OPUS_LAST_X, axis.last);
                spectrum.set(FIELD_OPUS_NUM_POINTS, axis.num_points as i64);
                spectrum.set(FIELD_OPUS_DIFF, axis.increment());
                spectrum.set(FIELD_OPUS_SCALE, scale);
            }
            None => {
                let values = data.all_values();
                spectrum.waves = (0..values.len()).map(|i| i as f64).collect();
                spectrum.amplitudes = values.into_iter().map(|v| v as f64).collect();
            }
        }

        spectrum.set(FIELD_CHANNEL, tag.name());
        spectrum.set(
            FIELD_OPUS_BLOCK_TYPE_DPF,
            to_hex_string(block_type.data_status_type().raw()),
        );
        spectrum.set(FIELD_OPUS_BLOCK_TYPE_HEX, to_hex_string(block_type.masked()));
        if !warnings.is_empty() {
            for w in warnings.iter() {
                warn!("{w}");
            }
            spectrum.set(FIELD_OPUS_WARNING, warnings.join("; "));
        }
        spectrum.validate()?;

        info!(
            "Materialized {} channel from block {} with {} points",
            tag,
            data.entry.index,
            spectrum.len()
        );
        Ok(Channel {
            block_index: data.entry.index,
            block_type,
            tag,
            data_kind: block_type.data_kind(),
            spectrum,
        })
    }

    /// Build a spectrum for every data block, in directory order.
    ///
    /// A data block that cannot be turned into a well-formed spectrum is
    /// logged and skipped, the remaining channels are still returned.
    pub fn channels(&self) -> Vec<Channel> {
        let mut seen: Vec<BlockType> = Vec::new();
        let mut channels = Vec::new();
        for data in self.data_blocks() {
            let block_type = data.entry.block_type;
            let occurrence = seen.iter().filter(|t| **t == block_type).count();
            seen.push(block_type);
            match self.materialize(data, occurrence) {
                Ok(channel) => channels.push(channel),
                Err(e) => warn!("Skipping data block {}: {e}", data.entry.index),
            }
        }
        channels
    }

    /// The first data block whose masked type is `block_type`
    pub fn find_data_block(&self, block_type: u32) -> Option<&DataBlock<'a>> {
        self.data_blocks()
            .find(|d| d.entry.block_type.masked() == block_type)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::opus::testing::{axis_parameters, OpusFileBuilder, ParameterBlockBuilder};

    const SAMPLE: u32 = 0x0407;
    const REFERENCE: u32 = 0x040B;

    fn single_channel() -> Vec<u8> {
        OpusFileBuilder::new()
            .data(BLOCK_TYPE_MAIN, &[1.0, 2.0, 3.0, 4.0])
            .parameters(
                BLOCK_TYPE_MAIN | BLOCK_TYPE_INCREMENT_DATA_TO_DPF,
                axis_parameters(4000.0, 3997.0, 4),
            )
            .build()
    }

    #[test_log::test]
    fn test_axis_reconstruction() {
        let buffer = single_channel();
        let decoded = DecodedFile::decode(&buffer).unwrap();
        let channels = decoded.channels();
        assert_eq!(channels.len(), 1);
        let channel = &channels[0];
        assert_eq!(channel.tag, ChannelTag::Result);
        assert_eq!(channel.data_kind, Some(DataKind::Absorbance));
        let spectrum = &channel.spectrum;
        assert_eq!(spectrum.waves, vec![4000.0, 3999.0, 3998.0, 3997.0]);
        assert_eq!(spectrum.amplitudes, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(spectrum.get(NPT), Some(&SampleValue::Integer(4)));
        assert_eq!(spectrum.get(FIELD_OPUS_DIFF), Some(&SampleValue::Number(-1.0)));
        assert_eq!(
            spectrum.get(FIELD_OPUS_BLOCK_TYPE_HEX),
            Some(&SampleValue::Text("100f".into()))
        );
        assert!(!spectrum.has(FIELD_OPUS_WARNING));
    }

    #[test]
    fn test_single_point_axis() {
        let axis = Axis {
            first: 10.0,
            last: 20.0,
            num_points: 1,
        };
        assert_eq!(axis.increment(), 0.0);
        assert_eq!(axis.waves(), vec![10.0]);
        let empty = Axis {
            num_points: 0,
            ..axis
        };
        assert!(empty.waves().is_empty());
    }

    #[test]
    fn test_scale_factor() {
        let buffer = OpusFileBuilder::new()
            .data(BLOCK_TYPE_MAIN, &[1.0, 2.0])
            .parameters(
                BLOCK_TYPE_MAIN | BLOCK_TYPE_INCREMENT_DATA_TO_DPF,
                axis_parameters(1.0, 2.0, 2).real(CSF, 0.5),
            )
            .build();
        let decoded = DecodedFile::decode(&buffer).unwrap();
        let channels = decoded.channels();
        assert_eq!(channels[0].spectrum.amplitudes, vec![0.5, 1.0]);
    }

    #[test_log::test]
    fn test_truncated_file() {
        let mut buffer = single_channel();
        buffer.truncate(buffer.len() - 8);
        assert!(matches!(
            DecodedFile::decode(&buffer),
            Err(SpectrumIOError::TruncatedFile { .. })
        ));
    }

    #[test]
    fn test_unterminated_parameters() {
        let buffer = OpusFileBuilder::new()
            .data(BLOCK_TYPE_MAIN, &[1.0, 2.0, 3.0])
            .block(
                BLOCK_TYPE_MAIN | BLOCK_TYPE_INCREMENT_DATA_TO_DPF,
                axis_parameters(3.0, 1.0, 3).unterminated(),
            )
            .build();
        let decoded = DecodedFile::decode(&buffer).unwrap();
        let channels = decoded.channels();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].spectrum.waves, vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_shared_parameter_block() {
        let buffer = OpusFileBuilder::new()
            .data(BLOCK_TYPE_MAIN, &[1.0, 2.0])
            .data(BLOCK_TYPE_MAIN, &[5.0, 6.0])
            .parameters(
                BLOCK_TYPE_MAIN | BLOCK_TYPE_INCREMENT_DATA_TO_DPF,
                axis_parameters(10.0, 11.0, 2),
            )
            .build();
        let decoded = DecodedFile::decode(&buffer).unwrap();
        let mut channels = decoded.channels();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].spectrum.amplitudes, vec![1.0, 2.0]);
        assert_eq!(channels[1].spectrum.amplitudes, vec![5.0, 6.0]);
        assert_eq!(channels[0].spectrum.waves, channels[1].spectrum.waves);

        channels[0].spectrum.set(NPT, 99i64);
        assert_eq!(channels[1].spectrum.get(NPT), Some(&SampleValue::Integer(2)));
    }

    #[test]
    fn test_channels_and_shared_metadata() {
        let buffer = OpusFileBuilder::new()
            .parameters(0x20, ParameterBlockBuilder::new().string(INS, "MPA"))
            .parameters(0x28, ParameterBlockBuilder::new().string("RSN", "ref"))
            .data(SAMPLE, &[1.0, 1.0])
            .parameters(SAMPLE | 0x10, axis_parameters(1.0, 2.0, 2))
            .data(REFERENCE, &[2.0, 2.0, 2.0])
            .parameters(REFERENCE | 0x10, axis_parameters(1.0, 3.0, 3))
            .build();
        let decoded = DecodedFile::decode(&buffer).unwrap();
        let channels = decoded.channels();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].tag, ChannelTag::Sample);
        assert_eq!(channels[0].spectrum.len(), 2);
        assert_eq!(
            channels[0].spectrum.get(INS),
            Some(&SampleValue::Text("MPA".into()))
        );
        assert!(!channels[0].spectrum.has("RSN"));
        assert_eq!(channels[1].tag, ChannelTag::Reference);
        assert_eq!(channels[1].spectrum.len(), 3);
        assert!(channels[1].spectrum.has("RSN"));
        assert!(channels[1].spectrum.has(INS));
    }

    #[test_log::test]
    fn test_shared_block_diagnostics_attached() {
        let mut instrument = ParameterBlockBuilder::new().string(INS, "MPA").finish();
        instrument.extend_from_slice(b"junk");
        let buffer = OpusFileBuilder::new()
            .block(0x20, instrument)
            .data(SAMPLE, &[1.0, 1.0])
            .parameters(SAMPLE | 0x10, axis_parameters(1.0, 2.0, 2))
            .build();
        let decoded = DecodedFile::decode(&buffer).unwrap();
        let channels = decoded.channels();
        assert_eq!(channels.len(), 1);
        let spectrum = &channels[0].spectrum;
        assert_eq!(spectrum.get(INS), Some(&SampleValue::Text("MPA".into())));
        let warning = spectrum.get(FIELD_OPUS_WARNING).unwrap().to_string();
        assert!(warning.contains("trailing data after END"), "{warning}");
    }

    #[test]
    fn test_unsorted_directory() {
        let buffer = OpusFileBuilder::new()
            .data(BLOCK_TYPE_MAIN, &[1.0, 2.0, 3.0, 4.0])
            .parameters(
                BLOCK_TYPE_MAIN | BLOCK_TYPE_INCREMENT_DATA_TO_DPF,
                axis_parameters(4000.0, 3997.0, 4),
            )
            .reverse_directory()
            .build();
        let decoded = DecodedFile::decode(&buffer).unwrap();
        assert!(decoded.directory.entries[1].block_type.is_parameter());
        let channels = decoded.channels();
        assert_eq!(channels.len(), 1);
        assert_eq!(
            channels[0].spectrum.waves,
            vec![4000.0, 3999.0, 3998.0, 3997.0]
        );
    }

    #[test_log::test]
    fn test_missing_parameters_fall_back_to_index() {
        let buffer = OpusFileBuilder::new()
            .data(BLOCK_TYPE_MAIN, &[7.0, 8.0, 9.0])
            .build();
        let decoded = DecodedFile::decode(&buffer).unwrap();
        let channels = decoded.channels();
        assert_eq!(channels.len(), 1);
        let spectrum = &channels[0].spectrum;
        assert_eq!(spectrum.waves, vec![0.0, 1.0, 2.0]);
        assert_eq!(spectrum.amplitudes, vec![7.0, 8.0, 9.0]);
        assert!(spectrum.has(FIELD_OPUS_WARNING));
    }

    #[test_log::test]
    fn test_bad_channel_skipped() {
        let buffer = OpusFileBuilder::new()
            .data(SAMPLE, &[1.0, 2.0])
            .parameters(SAMPLE | 0x10, axis_parameters(1.0, 10.0, 10))
            .data(REFERENCE, &[1.0, 2.0])
            .parameters(REFERENCE | 0x10, axis_parameters(1.0, 2.0, 2))
            .build();
        let decoded = DecodedFile::decode(&buffer).unwrap();
        let channels = decoded.channels();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].tag, ChannelTag::Reference);
    }

    #[test_log::test]
    fn test_unknown_blocks_kept() {
        let buffer = OpusFileBuilder::new()
            .block(0x8000_0000, vec![1, 2, 3, 4])
            .text(BLOCK_TYPE_TEXT, "first\0second")
            .build();
        let decoded = DecodedFile::decode(&buffer).unwrap();
        assert_eq!(decoded.unknown_blocks().count(), 1);
        assert_eq!(decoded.unknown_blocks().next().unwrap().bytes, &[1, 2, 3, 4]);
        assert_eq!(decoded.history(), vec!["first", "second"]);
        assert!(decoded.channels().is_empty());
    }
}
