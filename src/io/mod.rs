//! Reading and writing spectral data file formats.
//!
//! Every format is a [`SpectrumReader`] and/or [`SpectrumWriter`] with its
//! own typed options. Readers and writers must be configured exactly once
//! before use, either from command-style tokens or from an options struct.
//!
//! - [`opus`]: Bruker OPUS binary files, read only
//! - [`xy`]: ASCII-XY text files, read and write
//!
//! Paths ending in `.gz` are compressed on write, and gzip input is
//! detected by its magic bytes on read.

pub(crate) mod compression;
pub mod options;
#[cfg(feature = "opus")]
pub mod opus;
pub(crate) mod traits;
mod utils;
#[cfg(feature = "xy")]
pub mod xy;

pub use crate::io::compression::{is_gzipped, is_gzipped_extension};
pub use crate::io::options::{
    command, CodecOptions, CommonReaderOptions, OptionError, OptionHelp, OptionKind, OptionSpec,
    ResolvedOptions,
};
pub use crate::io::traits::{
    validate_batch, Configuration, SpectrumIOError, SpectrumReader, SpectrumWriter,
};
pub use crate::io::utils::{read_to_buffer, FileSource, FileWrapper, STREAM_NAME};

#[cfg(feature = "opus")]
pub use crate::io::opus::{OpusExtOptions, OpusExtReader, OpusOptions, OpusReader};

#[cfg(feature = "xy")]
pub use crate::io::xy::{XYReader, XYReaderOptions, XYWriter, XYWriterOptions};
