//! Builders for synthetic OPUS files used by the tests.
#![cfg(test)]

use super::constants::*;
use super::params::ParameterType;

/// Assembles the bytes of a parameter block
#[derive(Debug, Default, Clone)]
pub struct ParameterBlockBuilder {
    bytes: Vec<u8>,
}

impl ParameterBlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry with an explicit type code. `value` is padded to a
    /// whole number of 16-bit words.
    pub fn raw(mut self, key: &str, type_code: u16, value: &[u8]) -> Self {
        assert_eq!(key.len(), 3);
        let mut value = value.to_vec();
        if value.len() % 2 != 0 {
            value.push(0);
        }
        self.bytes.extend_from_slice(key.as_bytes());
        self.bytes.push(0);
        self.bytes.extend_from_slice(&type_code.to_le_bytes());
        self.bytes
            .extend_from_slice(&((value.len() / 2) as u16).to_le_bytes());
        self.bytes.extend_from_slice(&value);
        self
    }

    pub fn int(self, key: &str, value: i32) -> Self {
        self.raw(key, ParameterType::Integer.code(), &value.to_le_bytes())
    }

    pub fn real(self, key: &str, value: f64) -> Self {
        self.raw(key, ParameterType::Real.code(), &value.to_le_bytes())
    }

    pub fn real32(self, key: &str, value: f32) -> Self {
        self.raw(key, ParameterType::Real.code(), &value.to_le_bytes())
    }

    pub fn string(self, key: &str, value: &str) -> Self {
        let mut raw = value.as_bytes().to_vec();
        raw.push(0);
        self.raw(key, ParameterType::String.code(), &raw)
    }

    /// Append an `Enum` or `SubEnum` entry
    pub fn enumeration(self, key: &str, parameter_type: ParameterType, value: &str) -> Self {
        let mut raw = value.as_bytes().to_vec();
        raw.push(0);
        self.raw(key, parameter_type.code(), &raw)
    }

    /// The block bytes without the `END` sentinel
    pub fn unterminated(self) -> Vec<u8> {
        self.bytes
    }

    /// The block bytes followed by the `END` sentinel
    pub fn finish(mut self) -> Vec<u8> {
        self.bytes.extend_from_slice(PARAMETER_END);
        self.bytes.extend_from_slice(&[0, 0, 0, 0, 0]);
        self.bytes
    }
}

/// The data status parameters of a spectrum axis
pub fn axis_parameters(first: f64, last: f64, count: i32) -> ParameterBlockBuilder {
    ParameterBlockBuilder::new()
        .int(NPT, count)
        .real(FXV, first)
        .real(LXV, last)
}

pub fn float_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Assembles a whole OPUS file: header, directory, then the blocks in the
/// order they were added.
#[derive(Debug, Default, Clone)]
pub struct OpusFileBuilder {
    blocks: Vec<(u32, Vec<u8>)>,
    reverse_directory: bool,
}

impl OpusFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(mut self, block_type: u32, mut bytes: Vec<u8>) -> Self {
        while bytes.len() % WORD_SIZE != 0 {
            bytes.push(0);
        }
        self.blocks.push((block_type, bytes));
        self
    }

    pub fn data(self, block_type: u32, values: &[f32]) -> Self {
        self.block(block_type, float_bytes(values))
    }

    pub fn parameters(self, block_type: u32, parameters: ParameterBlockBuilder) -> Self {
        self.block(block_type, parameters.finish())
    }

    pub fn text(self, block_type: u32, text: &str) -> Self {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        self.block(block_type, bytes)
    }

    /// List the blocks in the directory in the opposite order to their
    /// placement in the file
    pub fn reverse_directory(mut self) -> Self {
        self.reverse_directory = true;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let num_blocks = self.blocks.len() + 1;
        let directory_length = num_blocks * DIRECTORY_ENTRY_LENGTH;
        let mut offset = HEADER_LENGTH + directory_length;

        let mut buffer = Vec::new();
        buffer.extend_from_slice(&MAGIC);
        buffer.extend_from_slice(&920622.0f64.to_le_bytes());
        buffer.extend_from_slice(&(HEADER_LENGTH as u32).to_le_bytes());
        buffer.extend_from_slice(&(num_blocks as u32).to_le_bytes());
        buffer.extend_from_slice(&(num_blocks as u32).to_le_bytes());

        let mut entries = Vec::new();
        for (block_type, bytes) in self.blocks.iter() {
            entries.push((*block_type, bytes.len() / WORD_SIZE, offset));
            offset += bytes.len();
        }
        if self.reverse_directory {
            entries.reverse();
        }
        entries.insert(0, (BLOCK_TYPE_DUMMY, directory_length / WORD_SIZE, HEADER_LENGTH));

        for (block_type, length, offset) in entries {
            buffer.extend_from_slice(&block_type.to_le_bytes());
            buffer.extend_from_slice(&(length as u32).to_le_bytes());
            buffer.extend_from_slice(&(offset as u32).to_le_bytes());
        }
        for (_, bytes) in self.blocks {
            buffer.extend_from_slice(&bytes);
        }
        buffer
    }
}
