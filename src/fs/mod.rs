// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

pub mod mock;

/// Abstract filesystem interface.
///
/// Config, registry, cursor and change-log access all go through this trait
/// so tests can run against [`mock::MockFileSystem`].
pub trait FileSystem: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Read everything from byte `offset` to the current end of file.
    fn read_from(&self, path: &Path, offset: u64) -> Result<Vec<u8>>;

    /// Replace the contents of `path` so that readers observe either the old
    /// or the new contents, never a partial write.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()>;

    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading file {:?}", path))
    }

    fn read_from(&self, path: &Path, offset: u64) -> Result<Vec<u8>> {
        let mut file = fs::File::open(path).with_context(|| format!("opening file {:?}", path))?;
        file.seek(SeekFrom::Start(offset))
            .with_context(|| format!("seeking to {offset} in {:?}", path))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .with_context(|| format!("reading file {:?}", path))?;
        Ok(buf)
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;

        // Temp file in the same directory so the rename stays on one filesystem.
        let mut tmp = NamedTempFile::new_in(parent)
            .with_context(|| format!("creating temp file in {:?}", parent))?;
        tmp.write_all(contents)
            .with_context(|| format!("writing temp file for {:?}", path))?;
        tmp.as_file()
            .sync_all()
            .with_context(|| format!("syncing temp file for {:?}", path))?;
        tmp.persist(path)
            .map_err(|e| e.error)
            .with_context(|| format!("renaming temp file onto {:?}", path))?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_replaces_contents_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state/cursor");
        let fs = RealFileSystem;

        fs.write_atomic(&path, b"first").unwrap();
        fs.write_atomic(&path, b"second").unwrap();

        assert_eq!(fs.read_to_string(&path).unwrap(), "second");
        assert!(fs.is_file(&path));
    }

    #[test]
    fn read_from_offset_returns_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        std::fs::write(&path, b"hello world").unwrap();

        let tail = RealFileSystem.read_from(&path, 6).unwrap();
        assert_eq!(tail, b"world");
        assert!(RealFileSystem.read_from(&path, 11).unwrap().is_empty());
    }
}
