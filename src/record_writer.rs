//! Output sink (SPEC_FULL.md §4.6): appends one NDJSON line per record to
//! the file named by its partition path. Compression, rollover, and
//! upload to `upload_path` are handled by an external process watching
//! `storage_path` — out of scope here, same as the teacher's own
//! `PartitionWriters` leaves `.ndjson` promotion as its sole output
//! contract and nothing downstream of it.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::open_append_with_backoff;

/// Sink for one partitioned output line at a time.
pub trait RecordWriter {
    fn write(&mut self, partition_path: &Path, line: &[u8]) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// One append-mode buffered file handle per unique partition path, under
/// `root`. Handles are opened lazily and kept open for the life of the
/// writer; `max_open_handles` bounds how many stay open at once, evicting
/// (flushing and closing) the least-recently-used handle past that bound.
pub struct FileRecordWriter {
    root: PathBuf,
    max_open_handles: usize,
    handles: HashMap<PathBuf, BufWriter<File>>,
    lru: Vec<PathBuf>,
}

impl FileRecordWriter {
    pub fn new(root: impl Into<PathBuf>, max_open_handles: usize) -> Self {
        Self { root: root.into(), max_open_handles: max_open_handles.max(1), handles: HashMap::new(), lru: Vec::new() }
    }

    fn touch_lru(&mut self, key: &Path) {
        self.lru.retain(|p| p != key);
        self.lru.push(key.to_path_buf());
    }

    fn evict_if_needed(&mut self) -> Result<()> {
        while self.handles.len() > self.max_open_handles {
            let Some(oldest) = self.lru.first().cloned() else { break };
            self.lru.remove(0);
            if let Some(mut w) = self.handles.remove(&oldest) {
                w.flush().with_context(|| format!("flush {}", oldest.display()))?;
            }
        }
        Ok(())
    }
}

impl RecordWriter for FileRecordWriter {
    fn write(&mut self, partition_path: &Path, line: &[u8]) -> Result<()> {
        let full_path = self.root.join(partition_path);

        if !self.handles.contains_key(&full_path) {
            if let Some(parent) = full_path.parent() {
                std::fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
            }
            let file = open_append_with_backoff(&full_path, 16, 50).with_context(|| format!("open {}", full_path.display()))?;
            self.handles.insert(full_path.clone(), BufWriter::new(file));
            self.evict_if_needed()?;
        }

        self.touch_lru(&full_path);
        let writer = self.handles.get_mut(&full_path).expect("just inserted or already open");
        writer.write_all(line)?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for (path, w) in &mut self.handles {
            w.flush().with_context(|| format!("flush {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_lines_to_partitioned_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FileRecordWriter::new(dir.path(), 4);

        writer.write(Path::new("release/42"), br#"{"a":1}"#).unwrap();
        writer.write(Path::new("beta/7"), br#"{"b":2}"#).unwrap();
        writer.write(Path::new("release/42"), br#"{"a":2}"#).unwrap();
        writer.flush().unwrap();

        let release = std::fs::read_to_string(dir.path().join("release/42")).unwrap();
        assert_eq!(release, "{\"a\":1}\n{\"a\":2}\n");
        let beta = std::fs::read_to_string(dir.path().join("beta/7")).unwrap();
        assert_eq!(beta, "{\"b\":2}\n");
    }

    #[test]
    fn evicts_least_recently_used_handle_past_bound() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FileRecordWriter::new(dir.path(), 1);

        writer.write(Path::new("a"), b"1").unwrap();
        writer.write(Path::new("b"), b"2").unwrap();
        assert_eq!(writer.handles.len(), 1, "oldest handle should have been evicted");

        writer.write(Path::new("a"), b"3").unwrap();
        writer.flush().unwrap();
        let a = std::fs::read_to_string(dir.path().join("a")).unwrap();
        assert_eq!(a, "1\n3\n", "re-opening in append mode must not truncate prior content");
    }
}
