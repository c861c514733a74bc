//! Decoding of OPUS parameter blocks.
//!
//! A parameter block is a sequence of entries, each laid out as
//!
//! | bytes | content                                         |
//! |-------|-------------------------------------------------|
//! | 0..3  | three character key, e.g. `NPT`                 |
//! | 3     | NUL                                             |
//! | 4..6  | `u16` type code                                 |
//! | 6..8  | `u16` value size in 16-bit words                |
//! | 8..   | the value, `size * 2` bytes                     |
//!
//! terminated by an entry keyed `END`. Some writers omit the terminator, so
//! running out of bytes ends the scan just as well.
use std::fmt::Display;

use indexmap::IndexMap;
use log::{debug, warn};

use super::block::DirectoryEntry;
use super::constants::{PARAMETER_END, PARAMETER_HEADER_LENGTH};
use crate::params::{SampleData, SampleValue};

/// The value type of a parameter entry, from its type code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterType {
    /// `I`: 32-bit signed integer
    Integer,
    /// `R`: IEEE-754 real, 32 or 64 bits wide depending on the entry size
    Real,
    /// `S`: free text
    String,
    /// `U`: a text value from a fixed set
    Enum,
    /// `U`: a text value from a fixed set, sub-enumeration
    SubEnum,
}

impl ParameterType {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Integer),
            1 => Some(Self::Real),
            2 => Some(Self::String),
            3 => Some(Self::Enum),
            4 => Some(Self::SubEnum),
            _ => None,
        }
    }

    pub const fn code(&self) -> u16 {
        match self {
            Self::Integer => 0,
            Self::Real => 1,
            Self::String => 2,
            Self::Enum => 3,
            Self::SubEnum => 4,
        }
    }

    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Integer => "I",
            Self::Real => "R",
            Self::String => "S",
            Self::Enum | Self::SubEnum => "U",
        }
    }
}

impl Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// The decoded contents of one parameter block
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterBlock {
    pub entry: DirectoryEntry,
    /// Decoded values by key. A key repeated within the block keeps its last
    /// value.
    pub values: IndexMap<String, SampleValue>,
    /// Whether the `END` sentinel was seen
    pub terminated: bool,
    /// Recoverable anomalies met while decoding
    pub diagnostics: Vec<String>,
}

impl ParameterBlock {
    pub fn get(&self, key: &str) -> Option<&SampleValue> {
        self.values.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.to_f64())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.to_i64())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy every value into `sample_data`, replacing existing keys
    pub fn copy_into(&self, sample_data: &mut SampleData) {
        for (k, v) in self.values.iter() {
            sample_data.insert(k.clone(), v.clone());
        }
    }
}

fn is_key_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Decode a single entry's value. Returns `None` when the value bytes do not
/// fit the type.
fn decode_value(parameter_type: ParameterType, raw: &[u8]) -> Option<SampleValue> {
    match parameter_type {
        ParameterType::Integer => {
            let bytes: [u8; 4] = raw.get(..4)?.try_into().ok()?;
            Some(SampleValue::Integer(i32::from_le_bytes(bytes) as i64))
        }
        ParameterType::Real => match raw.len() {
            4 => {
                let bytes: [u8; 4] = raw.try_into().ok()?;
                Some(SampleValue::Number(f32::from_le_bytes(bytes) as f64))
            }
            n if n >= 8 => {
                let bytes: [u8; 8] = raw[..8].try_into().ok()?;
                Some(SampleValue::Number(f64::from_le_bytes(bytes)))
            }
            _ => None,
        },
        ParameterType::String | ParameterType::Enum | ParameterType::SubEnum => {
            let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
            let text = String::from_utf8_lossy(&raw[..end]).trim().to_string();
            Some(SampleValue::Text(text))
        }
    }
}

/// Decode the raw bytes of one parameter block.
///
/// Never fails: malformed entries end the scan or are skipped, and the reason
/// is recorded in [`ParameterBlock::diagnostics`].
pub fn decode_parameters(entry: DirectoryEntry, bytes: &[u8]) -> ParameterBlock {
    let mut block = ParameterBlock {
        entry,
        ..Default::default()
    };
    let mut pos = 0usize;
    while pos + PARAMETER_HEADER_LENGTH <= bytes.len() {
        let key = &bytes[pos..pos + 3];
        if key == PARAMETER_END {
            block.terminated = true;
            let rest = &bytes[(pos + PARAMETER_HEADER_LENGTH).min(bytes.len())..];
            if rest.iter().any(|b| *b != 0) {
                block.diagnostics.push(format!(
                    "{} bytes of trailing data after END in block {}",
                    rest.len(),
                    entry.index
                ));
            }
            break;
        }
        if !key.iter().copied().all(is_key_byte) {
            // Zero padding or garbage where the next key should be
            if key.iter().any(|b| *b != 0) {
                block.diagnostics.push(format!(
                    "Invalid parameter key at byte {} in block {}",
                    pos, entry.index
                ));
            }
            break;
        }
        let key = String::from_utf8_lossy(key).into_owned();
        let type_code = u16::from_le_bytes([bytes[pos + 4], bytes[pos + 5]]);
        let size = u16::from_le_bytes([bytes[pos + 6], bytes[pos + 7]]) as usize * 2;
        let value_start = pos + PARAMETER_HEADER_LENGTH;
        let value_end = value_start + size;
        if value_end > bytes.len() {
            block.diagnostics.push(format!(
                "Parameter {key} declares {size} bytes but only {} remain in block {}",
                bytes.len() - value_start,
                entry.index
            ));
            break;
        }
        let raw = &bytes[value_start..value_end];
        pos = value_end;

        let Some(parameter_type) = ParameterType::from_code(type_code) else {
            block.diagnostics.push(format!(
                "Parameter {key} has unknown type code {type_code}"
            ));
            continue;
        };
        match decode_value(parameter_type, raw) {
            Some(value) => {
                block.values.insert(key, value);
            }
            None => block.diagnostics.push(format!(
                "Parameter {key} of type {parameter_type} cannot be read from {} bytes",
                raw.len()
            )),
        }
    }
    if !block.terminated {
        debug!(
            "Parameter block {} ended without END after {} entries",
            entry.index,
            block.values.len()
        );
    }
    for diagnostic in block.diagnostics.iter() {
        warn!("{diagnostic}");
    }
    block
}
