//! Destinations for committed entries

use crate::archive::{Archive, Entry};
use crate::error::Result;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

/// Receives each entry the parser accepts.
pub trait EntrySink {
    /// Write one accepted entry. `checksum` is the stored digest, if any.
    fn write_entry(&mut self, name: &str, checksum: Option<&str>, content: &[u8]) -> Result<()>;
}

/// Writes entries as files under a root directory.
///
/// Content goes to a temporary file next to the target which is then
/// renamed over it, so a failing write never leaves a partial target file.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl EntrySink for DirectorySink {
    fn write_entry(&mut self, name: &str, _checksum: Option<&str>, content: &[u8]) -> Result<()> {
        let target = self.root.join(name);
        let parent = match target.parent() {
            Some(parent) => parent.to_path_buf(),
            None => self.root.clone(),
        };
        std::fs::create_dir_all(&parent)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.persist(&target).map_err(|e| e.error)?;

        debug!(path = %target.display(), bytes = content.len(), "wrote entry");
        Ok(())
    }
}

/// Collects entries into an in-memory [`Archive`].
#[derive(Debug, Default)]
pub struct MemorySink {
    archive: Archive,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    pub fn into_archive(self) -> Archive {
        self.archive
    }
}

impl EntrySink for MemorySink {
    fn write_entry(&mut self, name: &str, checksum: Option<&str>, content: &[u8]) -> Result<()> {
        let mut entry = Entry::new(name, content);
        entry.checksum = checksum.map(str::to_string);
        self.archive.add_entry(entry);
        Ok(())
    }
}

impl<S: EntrySink + ?Sized> EntrySink for &mut S {
    fn write_entry(&mut self, name: &str, checksum: Option<&str>, content: &[u8]) -> Result<()> {
        (**self).write_entry(name, checksum, content)
    }
}
