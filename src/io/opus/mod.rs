//! Reading Bruker OPUS files.
//!
//! An OPUS file is a 24 byte header followed by a directory of typed blocks:
//! float arrays holding spectra, parameter blocks holding `KEY -> value`
//! metadata, and NUL-separated text logs. The directory may list blocks in
//! any order, and nothing links a data block to its parameters except their
//! type codes.
//!
//! Both readers load the whole file into memory before decoding, since the
//! directory can point anywhere in it.
//!
//! - [`OpusReader`] reads only the main absorbance block.
//! - [`OpusExtReader`] reads every channel (sample, reference, result) and
//!   can add the command lines and history log as sample data.
//!
//! ```no_run
//! use spectralio::prelude::*;
//! use spectralio::io::opus::OpusExtReader;
//!
//! let reader = OpusExtReader::from_args(&["--channel", "reference"])?;
//! for spectrum in reader.read_path("scan.0")? {
//!     println!("{spectrum}");
//! }
//! # Ok::<(), spectralio::io::SpectrumIOError>(())
//! ```
pub mod block;
pub mod constants;
pub mod decoder;
pub mod directory;
mod ext;
pub mod params;
mod reader;
pub mod text;

#[cfg(test)]
pub(crate) mod testing;

pub use block::{Block, BlockType, ChannelTag, DataKind, DirectoryEntry, ParameterKind};
pub use decoder::{Axis, Channel, DecodedFile};
pub use directory::{BlockDirectory, OpusHeader};
pub use ext::{parse_block_type, ChannelSelection, OpusExtOptions, OpusExtReader};
pub use params::{decode_parameters, ParameterBlock, ParameterType};
pub use reader::{OpusOptions, OpusReader, MISSING_SAMPLE_ID};
