//! Data source seams consumed by the engine.
//!
//! File enumeration lives upstream: whatever walks directories or expands
//! globs hands the engine a [`SourceProvider`]. Providers are re-iterable
//! because the counter probe and each scan pass walk the sequence
//! independently.

use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::PathBuf;

/// Readable, seekable stream with a known length.
pub trait SourceStream: Read + Seek + Send {
    fn len(&self) -> io::Result<u64>;
}

impl SourceStream for File {
    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

/// Producer of a byte stream with a stable identifier, typically a path.
///
/// The scanner opens a source exactly once, reads it sequentially after one
/// rewind, and drops the stream on every exit path.
pub trait DataSource: Send {
    fn identifier(&self) -> &str;
    fn open(&self) -> io::Result<Box<dyn SourceStream>>;
}

/// Lazily yielded source sequence. An `Err` item models the enumeration
/// infrastructure itself failing mid-walk.
pub type SourceIter<'a> = Box<dyn Iterator<Item = io::Result<Box<dyn DataSource>>> + Send + 'a>;

/// Re-iterable supply of data sources.
pub trait SourceProvider: Send + Sync {
    fn sources(&self) -> SourceIter<'_>;
}

/// Data source backed by a filesystem path.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    identifier: String,
}

impl FileSource {
    pub fn new(path: PathBuf) -> Self {
        let identifier = path.to_string_lossy().into_owned();
        Self { path, identifier }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl DataSource for FileSource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn open(&self) -> io::Result<Box<dyn SourceStream>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}

/// Provider over a fixed list of paths; the minimal adapter between an
/// upstream enumerator and the engine.
#[derive(Debug, Clone, Default)]
pub struct FileListProvider {
    paths: Vec<PathBuf>,
}

impl FileListProvider {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl SourceProvider for FileListProvider {
    fn sources(&self) -> SourceIter<'_> {
        Box::new(
            self.paths
                .iter()
                .cloned()
                .map(|path| Ok(Box::new(FileSource::new(path)) as Box<dyn DataSource>)),
        )
    }
}
