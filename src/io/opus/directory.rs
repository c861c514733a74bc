use log::debug;

use super::block::{BlockType, DirectoryEntry};
use super::constants::*;
use crate::io::traits::SpectrumIOError;

fn truncated(offset: usize, length: usize, buffer: &[u8]) -> SpectrumIOError {
    SpectrumIOError::TruncatedFile {
        offset,
        length,
        available: buffer.len(),
    }
}

/// Read a little endian `u32`, failing if it lies beyond the buffer
pub(crate) fn read_u32(buffer: &[u8], offset: usize) -> Result<u32, SpectrumIOError> {
    let bytes = offset
        .checked_add(4)
        .and_then(|end| buffer.get(offset..end))
        .ok_or_else(|| truncated(offset, 4, buffer))?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub(crate) fn read_f64(buffer: &[u8], offset: usize) -> Result<f64, SpectrumIOError> {
    let bytes = offset
        .checked_add(8)
        .and_then(|end| buffer.get(offset..end))
        .ok_or_else(|| truncated(offset, 8, buffer))?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Ok(f64::from_le_bytes(raw))
}

/// The fixed-size header at the start of every OPUS file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpusHeader {
    pub version: f64,
    pub directory_offset: usize,
    pub max_blocks: usize,
    pub num_blocks: usize,
}

impl OpusHeader {
    pub fn parse(buffer: &[u8]) -> Result<Self, SpectrumIOError> {
        if buffer.len() < HEADER_LENGTH {
            return Err(truncated(0, HEADER_LENGTH, buffer));
        }
        if buffer[..MAGIC.len()] != MAGIC {
            return Err(SpectrumIOError::MalformedBlock(format!(
                "Not an OPUS file, expected magic {:02x?} but found {:02x?}",
                MAGIC,
                &buffer[..MAGIC.len()]
            )));
        }
        let header = Self {
            version: read_f64(buffer, VERSION_OFFSET)?,
            directory_offset: read_u32(buffer, DIRECTORY_POINTER_OFFSET)? as usize,
            max_blocks: read_u32(buffer, MAX_BLOCKS_OFFSET)? as usize,
            num_blocks: read_u32(buffer, NUM_BLOCKS_OFFSET)? as usize,
        };
        if header.num_blocks > header.max_blocks {
            return Err(SpectrumIOError::MalformedBlock(format!(
                "Directory claims {} entries but only has room for {}",
                header.num_blocks, header.max_blocks
            )));
        }
        debug!(
            "OPUS header: version={}, directory_offset={}, num_blocks={}/{}",
            header.version, header.directory_offset, header.num_blocks, header.max_blocks
        );
        Ok(header)
    }
}

/// The parsed block directory of one file, in file order
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDirectory {
    pub header: OpusHeader,
    pub entries: Vec<DirectoryEntry>,
}

impl BlockDirectory {
    /// Parse the header and every directory entry.
    ///
    /// Any entry that points past the end of `buffer` fails the whole file
    /// with [`SpectrumIOError::TruncatedFile`].
    pub fn parse(buffer: &[u8]) -> Result<Self, SpectrumIOError> {
        let header = OpusHeader::parse(buffer)?;
        let directory_length = header.num_blocks * DIRECTORY_ENTRY_LENGTH;
        if header.directory_offset + directory_length > buffer.len() {
            return Err(truncated(header.directory_offset, directory_length, buffer));
        }

        let mut entries = Vec::with_capacity(header.num_blocks);
        for index in 0..header.num_blocks {
            let position = header.directory_offset + index * DIRECTORY_ENTRY_LENGTH;
            let block_type = BlockType(read_u32(buffer, position)?);
            let length_words = read_u32(buffer, position + 4)? as usize;
            let offset = read_u32(buffer, position + 8)? as usize;
            let entry = DirectoryEntry {
                index,
                block_type,
                offset,
                length_words,
            };
            if entry.end() > buffer.len() {
                return Err(truncated(entry.offset, entry.length_bytes(), buffer));
            }
            debug!("Definition #{index}: {entry}");
            entries.push(entry);
        }
        Ok(Self { header, entries })
    }

    /// Whether `entry` describes the directory itself
    pub fn is_self_entry(&self, entry: &DirectoryEntry) -> bool {
        entry.offset == self.header.directory_offset
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DirectoryEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::opus::testing::OpusFileBuilder;

    #[test]
    fn test_parse_directory() {
        let buffer = OpusFileBuilder::new()
            .block(0x100F, vec![0u8; 16])
            .block(0x101F, vec![0u8; 8])
            .build();
        let directory = BlockDirectory::parse(&buffer).unwrap();
        // The directory lists itself first
        assert_eq!(directory.len(), 3);
        assert!(directory.is_self_entry(&directory.entries[0]));
        assert_eq!(directory.entries[1].block_type, BlockType(0x100F));
        assert_eq!(directory.entries[1].length_words, 4);
        assert_eq!(directory.entries[2].length_bytes(), 8);
        assert!(directory.entries[2].offset > directory.entries[1].offset);
    }

    #[test]
    fn test_bad_magic() {
        let mut buffer = OpusFileBuilder::new().block(0x100F, vec![0u8; 4]).build();
        buffer[0] = b'X';
        assert!(matches!(
            BlockDirectory::parse(&buffer),
            Err(SpectrumIOError::MalformedBlock(_))
        ));
    }

    #[test]
    fn test_short_header() {
        assert!(matches!(
            BlockDirectory::parse(&MAGIC),
            Err(SpectrumIOError::TruncatedFile { .. })
        ));
    }

    #[test]
    fn test_entry_past_end() {
        let mut buffer = OpusFileBuilder::new().block(0x100F, vec![0u8; 16]).build();
        buffer.truncate(buffer.len() - 4);
        match BlockDirectory::parse(&buffer) {
            Err(SpectrumIOError::TruncatedFile {
                length, available, ..
            }) => {
                assert_eq!(length, 16);
                assert_eq!(available, buffer.len());
            }
            other => panic!("Expected a truncated file error, got {other:?}"),
        }
    }
}
