//! `spectralio` reads and writes spectral data files, chiefly Bruker OPUS
//! binaries produced by FT-IR and NIR instruments.
//!
//! A file is decoded into [`Spectrum`] records: an id, paired wave and
//! amplitude arrays, and a map of sample data.
//!
//! ```no_run
//! use spectralio::prelude::*;
//! use spectralio::OpusExtReader;
//!
//! let mut reader = OpusExtReader::new();
//! reader.resolve_options(&["--channel", "sample"])?;
//! for spectrum in reader.read_path("scan.0")? {
//!     println!("{spectrum}");
//! }
//! # Ok::<(), SpectrumIOError>(())
//! ```
pub mod io;
pub mod params;
pub mod prelude;
pub mod spectrum;

pub use crate::params::{SampleData, SampleValue};
pub use crate::spectrum::{make_ids_unique, Spectrum};

#[cfg(feature = "opus")]
pub use crate::io::opus::{OpusExtReader, OpusReader};
#[cfg(feature = "xy")]
pub use crate::io::xy::{XYReader, XYWriter};
