//! Where document files live.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Reads document contents by Themis case id and file name.
pub trait DocumentStore: Send + Sync {
    fn read(&self, source_case_id: i64, filename: &str) -> io::Result<Vec<u8>>;
}

/// Files laid out as `{root}/{case id}/{file name}`.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of a document inside its case directory.
    ///
    /// File names come from the source database and must stay inside the
    /// case directory: absolute names and `..` are rejected.
    pub fn path_for(&self, source_case_id: i64, filename: &str) -> io::Result<PathBuf> {
        let name = Path::new(filename);
        let contained = name.components().next().is_some()
            && name.components().all(|c| matches!(c, Component::Normal(_)));
        if !contained {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("file name '{}' leaves the case directory", filename),
            ));
        }
        Ok(self.root.join(source_case_id.to_string()).join(name))
    }
}

impl DocumentStore for FsDocumentStore {
    fn read(&self, source_case_id: i64, filename: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.path_for(source_case_id, filename)?)
    }
}
