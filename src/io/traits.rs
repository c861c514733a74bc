//! The contract shared by every spectrum reader and writer.
//!
//! A reader or writer starts out unconfigured. Its options are resolved
//! exactly once, either from command-style tokens with
//! [`SpectrumReader::resolve_options`] or from a typed struct, and only then
//! may it touch a byte source or sink. Calling a read or write method on an
//! unconfigured instance fails with [`SpectrumIOError::NotConfigured`].
use std::io;
use std::path;

use log::debug;
use thiserror::Error;

use crate::io::compression::{open_decompressed, CompressedSink};
use crate::io::options::{CodecOptions, OptionError, OptionHelp};
use crate::io::utils::{FileSource, FileWrapper, STREAM_NAME};
use crate::spectrum::{ArrayLengthMismatch, Spectrum};

#[derive(Debug, Error)]
pub enum SpectrumIOError {
    #[error("Invalid options: {0}")]
    Options(
        #[from]
        #[source]
        OptionError,
    ),
    #[error("Options must be resolved before reading or writing")]
    NotConfigured,
    #[error("Options have already been resolved and cannot be changed")]
    AlreadyConfigured,
    #[error("Block at offset {offset} with length {length} extends past the end of the file ({available} bytes)")]
    TruncatedFile {
        offset: usize,
        length: usize,
        available: usize,
    },
    #[error("Malformed block: {0}")]
    MalformedBlock(String),
    #[error("Invariant violated: {0}")]
    InvariantViolation(
        #[from]
        #[source]
        ArrayLengthMismatch,
    ),
    #[error("Failed to parse {0}")]
    Parse(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    #[error("Encountered an IO error: {0}")]
    IOError(
        #[from]
        #[source]
        io::Error,
    ),
}

impl From<SpectrumIOError> for io::Error {
    fn from(value: SpectrumIOError) -> Self {
        match value {
            SpectrumIOError::IOError(e) => e,
            SpectrumIOError::TruncatedFile { .. } => {
                Self::new(io::ErrorKind::UnexpectedEof, value)
            }
            SpectrumIOError::Options(_) => Self::new(io::ErrorKind::InvalidInput, value),
            _ => Self::new(io::ErrorKind::InvalidData, value),
        }
    }
}

/// The option state of a reader or writer
#[derive(Debug, Clone)]
pub enum Configuration<C> {
    Unresolved,
    Resolved(C),
}

impl<C> Default for Configuration<C> {
    fn default() -> Self {
        Self::Unresolved
    }
}

impl<C: CodecOptions> Configuration<C> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn get(&self) -> Result<&C, SpectrumIOError> {
        match self {
            Self::Resolved(options) => Ok(options),
            Self::Unresolved => Err(SpectrumIOError::NotConfigured),
        }
    }

    /// Install a typed configuration. Fails if one is already present.
    pub fn set(&mut self, options: C) -> Result<&C, SpectrumIOError> {
        if self.is_resolved() {
            return Err(SpectrumIOError::AlreadyConfigured);
        }
        *self = Self::Resolved(options);
        self.get()
    }

    /// Resolve command-style tokens into the typed configuration
    pub fn resolve<S: AsRef<str>>(&mut self, tokens: &[S]) -> Result<&C, SpectrumIOError> {
        if self.is_resolved() {
            return Err(SpectrumIOError::AlreadyConfigured);
        }
        let options = C::parse(tokens)?;
        self.set(options)
    }
}

/// Check a whole batch before any of it is written
pub fn validate_batch(spectra: &[Spectrum]) -> Result<(), SpectrumIOError> {
    for spectrum in spectra {
        spectrum.validate()?;
    }
    Ok(())
}

/// A source of [`Spectrum`] records in one format.
///
/// Implementors provide [`SpectrumReader::read_spectra`], which decodes
/// everything the stream holds in one blocking pass. The provided methods
/// handle option resolution and the path/stream distinction.
pub trait SpectrumReader {
    type Options: CodecOptions;

    fn configuration(&self) -> &Configuration<Self::Options>;

    fn configuration_mut(&mut self) -> &mut Configuration<Self::Options>;

    /// Decode all spectra from `source`. `name` is the file name the bytes
    /// came from, or [`STREAM_NAME`] for a bare stream.
    fn read_spectra<R: io::Read + ?Sized>(
        &self,
        options: &Self::Options,
        source: &mut R,
        name: &str,
    ) -> Result<Vec<Spectrum>, SpectrumIOError>;

    /// The resolved options, or [`SpectrumIOError::NotConfigured`]
    fn options(&self) -> Result<&Self::Options, SpectrumIOError> {
        self.configuration().get()
    }

    /// Resolve command-style option tokens. May only be done once.
    fn resolve_options<S: AsRef<str>>(&mut self, tokens: &[S]) -> Result<(), SpectrumIOError> {
        self.configuration_mut().resolve(tokens).map(|_| ())
    }

    /// Install a typed configuration directly. May only be done once.
    fn set_options(&mut self, options: Self::Options) -> Result<(), SpectrumIOError> {
        self.configuration_mut().set(options).map(|_| ())
    }

    fn options_help() -> Vec<OptionHelp>
    where
        Self: Sized,
    {
        Self::Options::options_help()
    }

    /// Read all spectra from the file at `path`. Each call re-opens the file
    /// from its start.
    fn read_path<P: AsRef<path::Path>>(&self, path: P) -> Result<Vec<Spectrum>, SpectrumIOError> {
        let options = self.options()?;
        let path = path.as_ref();
        debug!("Reading spectra from {}", path.display());
        let mut handle = open_decompressed(path)?;
        self.read_spectra(options, &mut handle, &path.to_string_lossy())
    }

    /// Read all spectra from the current position of `stream`. The stream is
    /// left open.
    fn read_stream<R: io::Read + ?Sized>(
        &self,
        stream: &mut R,
    ) -> Result<Vec<Spectrum>, SpectrumIOError> {
        let options = self.options()?;
        self.read_spectra(options, stream, STREAM_NAME)
    }

    /// Read all spectra from a path or a caller-owned stream. An empty
    /// source yields no spectra.
    fn read_source<R: io::Read>(
        &self,
        source: &mut FileSource<R>,
    ) -> Result<Vec<Spectrum>, SpectrumIOError> {
        self.options()?;
        match &mut source.source {
            FileWrapper::FileSystem(path) => self.read_path(path.as_path()),
            FileWrapper::Stream(stream) => self.read_stream(stream),
            FileWrapper::Empty => Ok(Vec::new()),
        }
    }
}

/// A sink for [`Spectrum`] records in one format.
///
/// The whole batch is validated before anything is written, so a batch
/// containing an invalid spectrum leaves the sink untouched.
pub trait SpectrumWriter {
    type Options: CodecOptions;

    fn configuration(&self) -> &Configuration<Self::Options>;

    fn configuration_mut(&mut self) -> &mut Configuration<Self::Options>;

    /// Encode an already validated batch into `sink`
    fn write_spectra<W: io::Write + ?Sized>(
        &self,
        options: &Self::Options,
        spectra: &[Spectrum],
        sink: &mut W,
    ) -> Result<(), SpectrumIOError>;

    /// Reject a batch before anything is opened or written. The default
    /// checks every spectrum's array lengths.
    fn check_batch(
        &self,
        _options: &Self::Options,
        spectra: &[Spectrum],
    ) -> Result<(), SpectrumIOError> {
        validate_batch(spectra)
    }

    fn options(&self) -> Result<&Self::Options, SpectrumIOError> {
        self.configuration().get()
    }

    fn resolve_options<S: AsRef<str>>(&mut self, tokens: &[S]) -> Result<(), SpectrumIOError> {
        self.configuration_mut().resolve(tokens).map(|_| ())
    }

    fn set_options(&mut self, options: Self::Options) -> Result<(), SpectrumIOError> {
        self.configuration_mut().set(options).map(|_| ())
    }

    fn options_help() -> Vec<OptionHelp>
    where
        Self: Sized,
    {
        Self::Options::options_help()
    }

    /// Write the batch to `stream` and flush it. The stream is left open.
    fn write_stream<W: io::Write + ?Sized>(
        &self,
        spectra: &[Spectrum],
        stream: &mut W,
    ) -> Result<(), SpectrumIOError> {
        let options = self.options()?;
        self.check_batch(options, spectra)?;
        self.write_spectra(options, spectra, stream)?;
        stream.flush()?;
        Ok(())
    }

    /// Write the batch to a new file at `path`, gzip-compressed if the path
    /// ends in `.gz`
    fn write_path<P: AsRef<path::Path>>(
        &self,
        spectra: &[Spectrum],
        path: P,
    ) -> Result<(), SpectrumIOError> {
        let options = self.options()?;
        self.check_batch(options, spectra)?;
        let path = path.as_ref();
        debug!("Writing {} spectra to {}", spectra.len(), path.display());
        let mut sink = CompressedSink::create(path)?;
        self.write_spectra(options, spectra, &mut sink)?;
        sink.finish()?;
        Ok(())
    }
}
