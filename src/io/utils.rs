use std::io;
use std::path;

#[derive(Debug, Clone, Default)]
pub enum FileWrapper<T: io::Read> {
    FileSystem(path::PathBuf),
    Stream(T),
    #[default]
    Empty,
}

/// Where a reader gets its bytes from: a path on disk, which is opened and
/// closed by the reader, or a stream owned by the caller.
#[derive(Debug, Clone, Default)]
pub struct FileSource<T: io::Read> {
    pub source: FileWrapper<T>,
}

impl<T: io::Read> FileSource<T> {
    pub fn from_path<P>(path: P) -> FileSource<T>
    where
        P: Into<path::PathBuf>,
    {
        FileSource {
            source: FileWrapper::FileSystem(path.into()),
        }
    }

    pub fn from_stream(stream: T) -> FileSource<T> {
        FileSource {
            source: FileWrapper::Stream(stream),
        }
    }
}

/// The name a reader sees for a source that has no file name
pub const STREAM_NAME: &str = ".";

/// Read everything left in a stream into memory.
///
/// Block-addressed formats need the whole file at once since their offsets
/// are absolute.
pub fn read_to_buffer<R: io::Read + ?Sized>(stream: &mut R) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    stream.read_to_end(&mut buffer)?;
    Ok(buffer)
}
