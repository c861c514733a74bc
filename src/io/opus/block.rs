use std::fmt::Display;
use std::str::FromStr;

use super::constants::*;
use super::params::ParameterBlock;

/// Format an integer as unsigned lowercase hex without leading zeros,
/// the notation OPUS block types are reported in.
pub fn to_hex_string(value: u32) -> String {
    format!("{value:x}")
}

/// The channel a block belongs to, from bits 2-3 of its type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChannelTag {
    /// The single channel measurement of the sample
    Sample,
    /// The background measurement
    Reference,
    /// The sample ratioed against the reference, e.g. absorbance
    Result,
}

impl ChannelTag {
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            1 => Some(Self::Sample),
            2 => Some(Self::Reference),
            3 => Some(Self::Result),
            _ => None,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sample => "sample",
            Self::Reference => "reference",
            Self::Result => "result",
        }
    }
}

impl Display for ChannelTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChannelTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sample" => Ok(Self::Sample),
            "reference" => Ok(Self::Reference),
            "result" => Ok(Self::Result),
            _ => Err(format!("Unknown channel {s:?}")),
        }
    }
}

/// What a data block's values measure, from bits 10-15 of its type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    SingleChannel,
    Interferogram,
    Phase,
    Absorbance,
    Transmittance,
    KubelkaMunk,
    Trace,
    Other(u32),
}

impl DataKind {
    pub fn from_bits(bits: u32) -> Option<Self> {
        let kind = match bits {
            0 => return None,
            1 => Self::SingleChannel,
            2 => Self::Interferogram,
            3 => Self::Phase,
            4 => Self::Absorbance,
            5 => Self::Transmittance,
            6 => Self::KubelkaMunk,
            7 => Self::Trace,
            n => Self::Other(n),
        };
        Some(kind)
    }
}

/// What a parameter block describes, from bits 4-9 of its type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    /// The axis description of one data block
    DataStatus,
    Instrument,
    Acquisition,
    FourierTransform,
    Plot,
    Optics,
    Sample,
    /// The info block, a parameter table filed under a text type
    Info,
    Other(u32),
}

impl ParameterKind {
    pub fn from_bits(bits: u32) -> Option<Self> {
        let kind = match bits {
            0 => return None,
            1 => Self::DataStatus,
            2 => Self::Instrument,
            3 => Self::Acquisition,
            4 => Self::FourierTransform,
            5 => Self::Plot,
            6 => Self::Optics,
            10 => Self::Sample,
            n => Self::Other(n),
        };
        Some(kind)
    }
}

/// The 32-bit type tag of a directory entry.
///
/// The tag is a bit field: bits 0-1 hold the complex part, bits 2-3 the
/// channel, bits 4-9 the parameter kind, bits 10-15 the data kind and bits
/// 16-23 the text kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockType(pub u32);

impl BlockType {
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// The bits that identify a spectrum, as used by the `spectrum-block-type`
    /// option
    pub const fn masked(&self) -> u32 {
        self.0 & BLOCK_TYPE_SPEC_MASK
    }

    pub fn channel_bits(&self) -> u32 {
        (self.0 >> CHANNEL_SHIFT) & CHANNEL_MASK
    }

    pub fn channel(&self) -> Option<ChannelTag> {
        ChannelTag::from_bits(self.channel_bits())
    }

    pub fn parameter_bits(&self) -> u32 {
        (self.0 >> PARAMETER_SHIFT) & PARAMETER_MASK
    }

    pub fn data_bits(&self) -> u32 {
        (self.0 >> DATA_SHIFT) & DATA_MASK
    }

    pub fn text_bits(&self) -> u32 {
        (self.0 >> TEXT_SHIFT) & TEXT_MASK
    }

    pub fn data_kind(&self) -> Option<DataKind> {
        DataKind::from_bits(self.data_bits())
    }

    pub fn parameter_kind(&self) -> Option<ParameterKind> {
        if let Some(kind) = ParameterKind::from_bits(self.parameter_bits()) {
            Some(kind)
        } else if self.0 & 0xFFFF == 0 && self.text_bits() == TEXT_KIND_INFO {
            Some(ParameterKind::Info)
        } else {
            None
        }
    }

    pub fn is_dummy(&self) -> bool {
        self.0 == BLOCK_TYPE_DUMMY
    }

    pub fn is_data(&self) -> bool {
        self.parameter_bits() == 0 && self.data_bits() != 0 && self.channel().is_some()
    }

    pub fn is_parameter(&self) -> bool {
        self.parameter_kind().is_some()
    }

    pub fn is_text(&self) -> bool {
        self.0 & 0xFFFF == 0 && self.text_bits() != 0 && !self.is_parameter()
    }

    /// The type of the data status parameter block describing this data block
    pub fn data_status_type(&self) -> BlockType {
        BlockType(self.0 | BLOCK_TYPE_INCREMENT_DATA_TO_DPF)
    }
}

impl Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&to_hex_string(self.0))
    }
}

/// One entry of the block directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectoryEntry {
    /// The position of this entry in the directory
    pub index: usize,
    pub block_type: BlockType,
    /// Absolute byte offset of the block
    pub offset: usize,
    /// Block length in 32-bit words
    pub length_words: usize,
}

impl DirectoryEntry {
    pub fn length_bytes(&self) -> usize {
        self.length_words.saturating_mul(WORD_SIZE)
    }

    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.length_bytes())
    }
}

impl Display for DirectoryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "definition={}, type={}, maskedTypeHex={}, start={}, lenBlocks={}",
            self.index,
            self.block_type,
            to_hex_string(self.block_type.masked()),
            self.offset,
            self.length_words
        )
    }
}

/// An array of single precision floats
#[derive(Debug, Clone, Copy)]
pub struct DataBlock<'a> {
    pub entry: DirectoryEntry,
    pub bytes: &'a [u8],
}

impl<'a> DataBlock<'a> {
    /// The number of values the block has room for
    pub fn capacity(&self) -> usize {
        self.bytes.len() / WORD_SIZE
    }

    /// Decode the first `count` values, or `None` if the block is too short
    pub fn values(&self, count: usize) -> Option<Vec<f32>> {
        let n_bytes = count.checked_mul(WORD_SIZE)?;
        let raw = self.bytes.get(..n_bytes)?;
        Some(decode_f32_le(raw))
    }

    pub fn all_values(&self) -> Vec<f32> {
        decode_f32_le(&self.bytes[..self.capacity() * WORD_SIZE])
    }
}

#[cfg(target_endian = "little")]
fn decode_f32_le(raw: &[u8]) -> Vec<f32> {
    bytemuck::pod_collect_to_vec(raw)
}

#[cfg(target_endian = "big")]
fn decode_f32_le(raw: &[u8]) -> Vec<f32> {
    raw.chunks_exact(WORD_SIZE)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// A text block, split into its NUL-separated entries
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub entry: DirectoryEntry,
    pub text: String,
}

impl TextBlock {
    pub fn from_bytes(entry: DirectoryEntry, bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes).into_owned();
        Self { entry, text }
    }

    /// The non-empty, trimmed entries of the block
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.text
            .split('\0')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

/// A block nothing here knows how to decode. The raw bytes are kept so the
/// block could be re-emitted unchanged.
#[derive(Debug, Clone, Copy)]
pub struct UnknownBlock<'a> {
    pub entry: DirectoryEntry,
    pub bytes: &'a [u8],
}

/// A decoded block, borrowing from the file buffer where it can
#[derive(Debug, Clone)]
pub enum Block<'a> {
    Data(DataBlock<'a>),
    Parameter(ParameterBlock),
    Text(TextBlock),
    Unknown(UnknownBlock<'a>),
}

impl<'a> Block<'a> {
    pub fn entry(&self) -> &DirectoryEntry {
        match self {
            Self::Data(b) => &b.entry,
            Self::Parameter(b) => &b.entry,
            Self::Text(b) => &b.entry,
            Self::Unknown(b) => &b.entry,
        }
    }

    pub fn block_type(&self) -> BlockType {
        self.entry().block_type
    }

    pub fn as_parameters(&self) -> Option<&ParameterBlock> {
        match self {
            Self::Parameter(b) => Some(b),
            _ => None,
        }
    }
}
