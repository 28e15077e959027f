//! `ArchiveSink` implementations: zip file, directory tree, in-memory map.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use glyphcrop_core::{ArchiveSink, GlyphError, Result};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Reject entry paths that could escape the bundle root.
pub fn validate_entry_path(path: &str) -> Result<()> {
    let bad = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.contains('\0')
        || path
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(GlyphError::Archive(format!("invalid entry path '{path}'")));
    }
    Ok(())
}

/// DEFLATE-compressed zip bundle.
pub struct ZipSink<W: Write + Seek> {
    writer: Option<ZipWriter<W>>,
    finished: Option<W>,
    entries: usize,
}

impl<W: Write + Seek> ZipSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: Some(ZipWriter::new(inner)),
            finished: None,
            entries: 0,
        }
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    /// The underlying writer, once `finish` has run.
    pub fn into_inner(self) -> Option<W> {
        self.finished
    }
}

impl ZipSink<fs::File> {
    /// Create (or truncate) a zip file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(Self::new(fs::File::create(path)?))
    }
}

impl<W: Write + Seek> ArchiveSink for ZipSink<W> {
    fn add(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        validate_entry_path(path)?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| GlyphError::Archive("zip archive already finished".into()))?;
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        writer
            .start_file(path, options)
            .map_err(|e| GlyphError::Archive(format!("{path}: {e}")))?;
        writer.write_all(bytes)?;
        self.entries += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            let inner = writer
                .finish()
                .map_err(|e| GlyphError::Archive(e.to_string()))?;
            self.finished = Some(inner);
            tracing::debug!(entries = self.entries, "zip archive finished");
        }
        Ok(())
    }
}

/// Writes entries as plain files below a root directory.
pub struct DirSink {
    root: PathBuf,
    entries: usize,
}

impl DirSink {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root, entries: 0 })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArchiveSink for DirSink {
    fn add(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        validate_entry_path(path)?;
        let target = path.split('/').fold(self.root.clone(), |acc, seg| acc.join(seg));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)?;
        self.entries += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        tracing::debug!(root = %self.root.display(), entries = self.entries, "directory bundle written");
        Ok(())
    }
}

/// Keeps entries in memory, ordered by path.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: BTreeMap<String, Vec<u8>>,
    finished: bool,
}

impl MemorySink {
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl ArchiveSink for MemorySink {
    fn add(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        validate_entry_path(path)?;
        if self.finished {
            return Err(GlyphError::Archive("bundle already finished".into()));
        }
        self.files.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn rejects_escaping_paths() {
        for bad in ["", "/abs", "../up", "a/../b", "a//b", "a\\b", "./a", "a/"] {
            assert!(validate_entry_path(bad).is_err(), "{bad:?}");
        }
        for good in ["a.tsv.txt", "x_crops_symbols/00000_א.png", "..a/b..", "space~2/f.png"] {
            assert!(validate_entry_path(good).is_ok(), "{good:?}");
        }
    }

    #[test]
    fn zip_sink_produces_archive() {
        let mut sink = ZipSink::new(Cursor::new(Vec::new()));
        sink.add("a.txt", b"hello").unwrap();
        sink.add("folder/b.png", &[1, 2, 3]).unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.entries(), 2);
        assert!(sink.add("late.txt", b"x").is_err());

        let bytes = sink.into_inner().unwrap().into_inner();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn memory_sink_refuses_writes_after_finish() {
        let mut sink = MemorySink::default();
        sink.add("a", b"1").unwrap();
        sink.finish().unwrap();
        assert!(sink.add("b", b"2").is_err());
        assert_eq!(sink.paths().collect::<Vec<_>>(), ["a"]);
    }
}
