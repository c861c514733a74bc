use std::io;

use log::debug;

use crate::io::options::{CodecOptions, OptionError, OptionSpec, ResolvedOptions};
use crate::io::traits::{validate_batch, Configuration, SpectrumIOError, SpectrumWriter};
use crate::spectrum::Spectrum;

use super::DEFAULT_SEPARATOR;

/// Options of [`XYWriter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XYWriterOptions {
    pub separator: String,
}

impl Default for XYWriterOptions {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

impl CodecOptions for XYWriterOptions {
    fn option_table() -> Vec<OptionSpec> {
        vec![OptionSpec::text(
            "separator",
            DEFAULT_SEPARATOR,
            "the separator to use for identifying X and Y columns",
        )]
    }

    fn from_resolved(resolved: &ResolvedOptions) -> Result<Self, OptionError> {
        Ok(Self {
            separator: resolved.text("separator").to_string(),
        })
    }
}

/// Writes a single spectrum as `wave<separator>amplitude` lines, last point
/// first. Sample data is not written.
#[derive(Debug, Default, Clone)]
pub struct XYWriter {
    configuration: Configuration<XYWriterOptions>,
}

impl XYWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: XYWriterOptions) -> Self {
        Self {
            configuration: Configuration::Resolved(options),
        }
    }

    pub fn from_args<S: AsRef<str>>(tokens: &[S]) -> Result<Self, SpectrumIOError> {
        let mut writer = Self::new();
        writer.resolve_options(tokens)?;
        Ok(writer)
    }
}

impl SpectrumWriter for XYWriter {
    type Options = XYWriterOptions;

    fn configuration(&self) -> &Configuration<Self::Options> {
        &self.configuration
    }

    fn configuration_mut(&mut self) -> &mut Configuration<Self::Options> {
        &mut self.configuration
    }

    fn check_batch(
        &self,
        _options: &Self::Options,
        spectra: &[Spectrum],
    ) -> Result<(), SpectrumIOError> {
        if spectra.len() != 1 {
            return Err(SpectrumIOError::Unsupported(format!(
                "can only write a single spectrum, got {}",
                spectra.len()
            )));
        }
        validate_batch(spectra)
    }

    fn write_spectra<W: io::Write + ?Sized>(
        &self,
        options: &Self::Options,
        spectra: &[Spectrum],
        sink: &mut W,
    ) -> Result<(), SpectrumIOError> {
        let [spectrum] = spectra else {
            return Err(SpectrumIOError::Unsupported(format!(
                "can only write a single spectrum, got {}",
                spectra.len()
            )));
        };
        for (wave, amplitude) in spectrum.points().rev() {
            writeln!(sink, "{wave}{}{amplitude}", options.separator)?;
        }
        debug!("Wrote {spectrum}");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::io::Cursor;

    use super::*;
    use crate::io::traits::SpectrumReader;
    use crate::io::xy::{XYReader, XYReaderOptions};

    fn spectrum() -> Spectrum {
        Spectrum::from_arrays("wheat", vec![4000.0, 3999.5, 3999.0], vec![0.25, 0.5, 1.0])
            .unwrap()
    }

    #[test]
    fn test_write_stream() {
        let writer = XYWriter::with_options(XYWriterOptions::default());
        let mut buffer = Vec::new();
        writer.write_stream(&[spectrum()], &mut buffer).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "3999;1\n3999.5;0.5\n4000;0.25\n"
        );
    }

    #[test]
    fn test_round_trip() {
        let writer = XYWriter::from_args(&["--separator", "\t"]).unwrap();
        let mut buffer = Vec::new();
        writer.write_stream(&[spectrum()], &mut buffer).unwrap();

        let reader = XYReader::from_args(&["--separator", "\t"]).unwrap();
        let spectra = reader.read_stream(&mut Cursor::new(buffer)).unwrap();
        let original = spectrum();
        assert_eq!(spectra[0].waves, original.waves);
        assert_eq!(spectra[0].amplitudes, original.amplitudes);
    }

    #[test]
    fn test_invariant_violation() {
        let writer = XYWriter::with_options(XYWriterOptions::default());
        let mut bad = spectrum();
        bad.amplitudes.pop();
        let mut buffer = Vec::new();
        let err = writer.write_stream(&[bad], &mut buffer).unwrap_err();
        match err {
            SpectrumIOError::InvariantViolation(e) => {
                assert_eq!(e.waves, 3);
                assert_eq!(e.amplitudes, 2);
            }
            other => panic!("Expected an invariant violation, got {other:?}"),
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_single_spectrum_only() {
        let writer = XYWriter::with_options(XYWriterOptions::default());
        let mut buffer = Vec::new();
        assert!(matches!(
            writer.write_stream(&[spectrum(), spectrum()], &mut buffer),
            Err(SpectrumIOError::Unsupported(_))
        ));
        assert!(buffer.is_empty());
        assert!(matches!(
            XYWriter::new().write_stream(&[spectrum()], &mut buffer),
            Err(SpectrumIOError::NotConfigured)
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        assert!(writer.write_path(&[], &path).is_err());
        assert!(!path.exists());
    }

    #[test_log::test]
    fn test_write_path_gzip() -> Result<(), SpectrumIOError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("wheat_12.txt.gz");
        let writer = XYWriter::with_options(XYWriterOptions::default());
        writer.write_path(&[spectrum()], &path)?;
        assert!(fs::read(&path)?.starts_with(b"\x1f\x8b"));

        let reader = XYReader::with_options(XYReaderOptions::default());
        let spectra = reader.read_path(&path)?;
        assert_eq!(spectra[0].id, "wheat_12");
        assert_eq!(spectra[0].waves, spectrum().waves);
        Ok(())
    }
}
