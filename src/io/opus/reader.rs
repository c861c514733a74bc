use std::io;

use log::{debug, warn};

use super::constants::*;
use super::decoder::DecodedFile;
use super::text::{find_quoted_value, parse_braced_metadata};
use crate::io::options::{CodecOptions, CommonReaderOptions, OptionError, OptionSpec, ResolvedOptions};
use crate::io::traits::{Configuration, SpectrumIOError, SpectrumReader};
use crate::io::utils::read_to_buffer;
use crate::params::SampleValue;
use crate::spectrum::Spectrum;

/// The id given to a spectrum whose sample name cannot be found
pub const MISSING_SAMPLE_ID: &str = "ERR";

/// Options of [`OpusReader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpusOptions {
    pub common: CommonReaderOptions,
    /// The key whose value becomes the spectrum id
    pub sample_id: String,
    /// Store the block layout of the file under `Trace.*` keys
    pub add_trace_to_report: bool,
}

impl Default for OpusOptions {
    fn default() -> Self {
        Self {
            common: CommonReaderOptions::default(),
            sample_id: KEY_SAMPLE_ID.to_string(),
            add_trace_to_report: false,
        }
    }
}

impl CodecOptions for OpusOptions {
    fn option_table() -> Vec<OptionSpec> {
        let mut table = CommonReaderOptions::TABLE.to_vec();
        table.extend([
            OptionSpec::text(
                "sample-id",
                KEY_SAMPLE_ID,
                "the key of the value to use as sample ID",
            ),
            OptionSpec::flag(
                "add-trace-to-report",
                "whether to store the block layout of the file in the report",
            ),
        ]);
        table
    }

    fn from_resolved(resolved: &ResolvedOptions) -> Result<Self, OptionError> {
        Ok(Self {
            common: CommonReaderOptions::from_resolved(resolved),
            sample_id: resolved.text("sample-id").to_string(),
            add_trace_to_report: resolved.flag("add-trace-to-report"),
        })
    }
}

/// Reads the main absorbance spectrum of an OPUS file.
///
/// Only the first data block of type `0x100F` is read. Its id comes from the
/// history text (`SNM='...'`), falling back to the parameter blocks and then
/// to [`MISSING_SAMPLE_ID`]. Use [`OpusExtReader`](super::OpusExtReader) to
/// read every channel.
#[derive(Debug, Default, Clone)]
pub struct OpusReader {
    configuration: Configuration<OpusOptions>,
}

impl OpusReader {
    /// An unconfigured reader
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: OpusOptions) -> Self {
        Self {
            configuration: Configuration::Resolved(options),
        }
    }

    pub fn from_args<S: AsRef<str>>(tokens: &[S]) -> Result<Self, SpectrumIOError> {
        let mut reader = Self::new();
        reader.resolve_options(tokens)?;
        Ok(reader)
    }

    /// Decode the main spectrum from an in-memory file
    pub fn decode(
        &self,
        options: &OpusOptions,
        buffer: &[u8],
    ) -> Result<Vec<Spectrum>, SpectrumIOError> {
        let decoded = DecodedFile::decode(buffer)?;
        let Some(data) = decoded.find_data_block(BLOCK_TYPE_MAIN) else {
            warn!("No data block of type {BLOCK_TYPE_MAIN:x} found");
            return Ok(Vec::new());
        };
        let mut channel = match decoded.materialize(data, 0) {
            Ok(channel) => channel,
            Err(e) => {
                warn!("Failed to read the main spectrum: {e}");
                return Ok(Vec::new());
            }
        };
        let spectrum = &mut channel.spectrum;

        let text = decoded.history_text();
        spectrum.id = match find_quoted_value(&text, &options.sample_id) {
            Some(id) => id.to_string(),
            None => match decoded.parameter_value(&options.sample_id) {
                Some(value) => value.to_string(),
                None => {
                    debug!("No value for {} found", options.sample_id);
                    MISSING_SAMPLE_ID.to_string()
                }
            },
        };
        for (key, value) in parse_braced_metadata(&text) {
            spectrum.set(key, value);
        }

        if options.add_trace_to_report {
            for (key, value) in Self::trace(&decoded, data.entry.offset, data.entry.length_bytes()) {
                spectrum.set(format!("{PREFIX_TRACE}{key}"), value);
            }
        }
        options.common.apply(spectrum);
        Ok(vec![channel.spectrum])
    }

    fn trace(
        decoded: &DecodedFile<'_>,
        data_offset: usize,
        data_length: usize,
    ) -> Vec<(&'static str, SampleValue)> {
        let header = &decoded.directory.header;
        let mut trace = vec![
            ("Version", SampleValue::Number(header.version)),
            ("DirectoryOffset", (header.directory_offset as i64).into()),
            ("MaxBlocks", (header.max_blocks as i64).into()),
            ("NumBlocks", (header.num_blocks as i64).into()),
            ("ABOffset", (data_offset as i64).into()),
            ("ABLength", (data_length as i64).into()),
        ];
        if let Some(text) = decoded.text_blocks().next() {
            trace.push(("TextOffset", (text.entry.offset as i64).into()));
            trace.push(("TextLength", (text.entry.length_bytes() as i64).into()));
        }
        trace
    }
}

impl SpectrumReader for OpusReader {
    type Options = OpusOptions;

    fn configuration(&self) -> &Configuration<Self::Options> {
        &self.configuration
    }

    fn configuration_mut(&mut self) -> &mut Configuration<Self::Options> {
        &mut self.configuration
    }

    fn read_spectra<R: io::Read + ?Sized>(
        &self,
        options: &Self::Options,
        source: &mut R,
        name: &str,
    ) -> Result<Vec<Spectrum>, SpectrumIOError> {
        let buffer = read_to_buffer(source)?;
        debug!("Read {} bytes from {name}", buffer.len());
        self.decode(options, &buffer)
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;
    use crate::io::options::{FIELD_FORMAT, FIELD_INSTRUMENT};
    use crate::io::opus::testing::{axis_parameters, OpusFileBuilder, ParameterBlockBuilder};
    use crate::io::utils::FileSource;

    fn main_spectrum(text: Option<&str>) -> Vec<u8> {
        let mut builder = OpusFileBuilder::new()
            .data(BLOCK_TYPE_MAIN, &[1.0, 2.0, 3.0, 4.0])
            .parameters(
                BLOCK_TYPE_MAIN | BLOCK_TYPE_INCREMENT_DATA_TO_DPF,
                axis_parameters(4000.0, 3997.0, 4),
            )
            .parameters(0xA0, ParameterBlockBuilder::new().string(KEY_SAMPLE_ID, "param id"));
        if let Some(text) = text {
            builder = builder.text(BLOCK_TYPE_TEXT, text);
        }
        builder.build()
    }

    #[test_log::test]
    fn test_read_main_spectrum() {
        let reader = OpusReader::with_options(OpusOptions::default());
        let buffer = main_spectrum(Some(
            "COMMAND_LINE MeasureSample ([<p>], {SNM='Wheat 12', NSS=32, BAD=x});",
        ));
        let spectra = reader.read_stream(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(spectra.len(), 1);
        let spectrum = &spectra[0];
        assert_eq!(spectrum.id, "Wheat 12");
        assert_eq!(spectrum.waves, vec![4000.0, 3999.0, 3998.0, 3997.0]);
        assert_eq!(spectrum.amplitudes, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(spectrum.get("NSS"), Some(&SampleValue::Number(32.0)));
        assert!(!spectrum.has("BAD"));
        assert_eq!(
            spectrum.get(FIELD_INSTRUMENT),
            Some(&SampleValue::Text("unknown".into()))
        );
        assert_eq!(spectrum.get(FIELD_FORMAT), Some(&SampleValue::Text("NIR".into())));
        assert!(!spectrum.sample_data.keys().any(|k| k.starts_with(PREFIX_TRACE)));
    }

    #[test]
    fn test_sample_id_fallbacks() {
        let reader = OpusReader::with_options(OpusOptions::default());
        let spectra = reader.decode(reader.options().unwrap(), &main_spectrum(None)).unwrap();
        assert_eq!(spectra[0].id, "param id");

        let reader = OpusReader::from_args(&["--sample-id", "XYZ"]).unwrap();
        let spectra = reader.decode(reader.options().unwrap(), &main_spectrum(None)).unwrap();
        assert_eq!(spectra[0].id, MISSING_SAMPLE_ID);
    }

    #[test]
    fn test_trace() {
        let reader = OpusReader::from_args(&["--add-trace-to-report"]).unwrap();
        let spectra = reader
            .decode(reader.options().unwrap(), &main_spectrum(Some("log")))
            .unwrap();
        let spectrum = &spectra[0];
        assert_eq!(spectrum.get("Trace.NumBlocks"), Some(&SampleValue::Integer(5)));
        assert_eq!(spectrum.get("Trace.ABLength"), Some(&SampleValue::Integer(16)));
        assert!(spectrum.has("Trace.TextOffset"));
    }

    #[test]
    fn test_only_main_block() {
        let buffer = OpusFileBuilder::new()
            .data(0x0407, &[1.0])
            .parameters(0x0417, axis_parameters(1.0, 1.0, 1))
            .build();
        let reader = OpusReader::with_options(OpusOptions::default());
        assert!(reader.decode(reader.options().unwrap(), &buffer).unwrap().is_empty());
    }

    #[test]
    fn test_unconfigured() {
        let reader = OpusReader::new();
        assert!(matches!(
            reader.read_stream(&mut Cursor::new(main_spectrum(None))),
            Err(SpectrumIOError::NotConfigured)
        ));
        let mut empty = FileSource::<Cursor<Vec<u8>>>::default();
        assert!(matches!(
            reader.read_source(&mut empty),
            Err(SpectrumIOError::NotConfigured)
        ));
    }

    #[test]
    fn test_read_source() -> Result<(), SpectrumIOError> {
        let reader = OpusReader::with_options(OpusOptions::default());
        let mut empty = FileSource::<Cursor<Vec<u8>>>::default();
        assert!(reader.read_source(&mut empty)?.is_empty());

        let mut stream = FileSource::from_stream(Cursor::new(main_spectrum(None)));
        assert_eq!(reader.read_source(&mut stream)?[0].id, "param id");

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("wheat.0");
        std::fs::write(&path, main_spectrum(None))?;
        let mut source = FileSource::<Cursor<Vec<u8>>>::from_path(path.clone());
        assert_eq!(reader.read_source(&mut source)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_not_opus() {
        let reader = OpusReader::with_options(OpusOptions::default());
        let err = reader
            .read_stream(&mut Cursor::new(b"wave;amplitude\n4000;0.5\n3999;0.25\n".to_vec()))
            .unwrap_err();
        assert!(matches!(err, SpectrumIOError::MalformedBlock(_)));
    }
}
