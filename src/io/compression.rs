use std::fs;
use std::io::{self, prelude::*, BufReader, BufWriter};
use std::path;

use flate2::{bufread::MultiGzDecoder, write::GzEncoder, Compression};

pub fn is_gzipped(header: &[u8]) -> bool {
    header.starts_with(b"\x1f\x8b")
}

pub fn is_gzipped_extension(path: &path::Path) -> (bool, path::PathBuf) {
    if let Some(ext) = path.extension() {
        if ext.to_ascii_lowercase() == "gz" {
            (true, path.with_extension(""))
        } else {
            (false, path.to_path_buf())
        }
    } else {
        (false, path.to_path_buf())
    }
}

/// Open a file for reading, decompressing it on the fly when it starts with
/// the gzip magic bytes.
pub fn open_decompressed(path: &path::Path) -> io::Result<Box<dyn Read>> {
    let mut handle = BufReader::new(fs::File::open(path)?);
    let gzipped = is_gzipped(handle.fill_buf()?);
    if gzipped {
        Ok(Box::new(MultiGzDecoder::new(handle)))
    } else {
        Ok(Box::new(handle))
    }
}

/// A file sink that compresses its output when the path ends in `.gz`
pub enum CompressedSink {
    Plain(BufWriter<fs::File>),
    Gzip(GzEncoder<BufWriter<fs::File>>),
}

impl CompressedSink {
    pub fn create(path: &path::Path) -> io::Result<Self> {
        let handle = BufWriter::new(fs::File::create(path)?);
        if is_gzipped_extension(path).0 {
            Ok(Self::Gzip(GzEncoder::new(handle, Compression::default())))
        } else {
            Ok(Self::Plain(handle))
        }
    }

    /// Flush all buffered bytes and write the gzip trailer if there is one
    pub fn finish(self) -> io::Result<()> {
        match self {
            Self::Plain(mut handle) => handle.flush(),
            Self::Gzip(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for CompressedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(handle) => handle.write(buf),
            Self::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(handle) => handle.flush(),
            Self::Gzip(encoder) => encoder.flush(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_gzip_round_trip() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("spectrum.txt.gz");
        let (gz, stem) = is_gzipped_extension(&path);
        assert!(gz);
        assert_eq!(stem.file_name().unwrap(), "spectrum.txt");

        let mut sink = CompressedSink::create(&path)?;
        sink.write_all(b"4000;0.5\n")?;
        sink.finish()?;

        let raw = fs::read(&path)?;
        assert!(is_gzipped(&raw));

        let mut text = String::new();
        open_decompressed(&path)?.read_to_string(&mut text)?;
        assert_eq!(text, "4000;0.5\n");
        Ok(())
    }
}
