//! The ASCII-XY text format: one spectrum per file, one
//! `wave<separator>amplitude` pair per line.
mod reader;
mod writer;

pub use reader::{SampleIdExtraction, XYReader, XYReaderOptions};
pub use writer::{XYWriter, XYWriterOptions};

pub const DEFAULT_SEPARATOR: &str = ";";
