//! The traits and types needed to read and write spectra
pub use crate::io::{CodecOptions, SpectrumIOError, SpectrumReader, SpectrumWriter};
pub use crate::params::{SampleData, SampleValue};
pub use crate::spectrum::Spectrum;
pub use std::io::prelude::*;
