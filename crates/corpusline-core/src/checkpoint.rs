//! Durable JSON-Lines checkpoints for intermediate and final record sets

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Append-only JSON-Lines persistence rooted at a data directory.
///
/// One JSON object per line, UTF-8, no enclosing array. Intermediate stage
/// files are named `<source>.jsonl`; the final corpus path is configured
/// separately and written with [`write_jsonl`].
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    data_dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    /// Remove a stage file from a previous run, if present.
    pub fn clear(&self, name: &str) -> std::io::Result<()> {
        match std::fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Append one JSON line per item to `name`, creating the file and the
    /// data directory on first use. Flushes before returning.
    pub fn append<T: Serialize>(&self, items: &[T], name: &str) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.data_dir)?;
        let path = self.path_for(name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = BufWriter::new(file);
        write_items(&mut writer, items)?;
        writer.flush()?;
        log::debug!("checkpointed {} items to {}", items.len(), path.display());
        Ok(path)
    }

    /// Read back a stage file line-by-line. Lines that fail to parse are
    /// skipped and counted, never an all-or-nothing failure.
    pub fn read_all<T: DeserializeOwned>(&self, name: &str) -> std::io::Result<(Vec<T>, usize)> {
        read_jsonl(&self.path_for(name))
    }
}

/// Write items as JSON Lines to an arbitrary path, truncating any previous
/// content. Used for the final corpus output.
pub fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(path)?);
    write_items(&mut writer, items)?;
    writer.flush()
}

/// Parse a JSON-Lines file, returning `(items, skipped_line_count)`.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> std::io::Result<(Vec<T>, usize)> {
    let reader = BufReader::new(File::open(path)?);
    let mut items = Vec::new();
    let mut skipped = 0usize;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(item) => items.push(item),
            Err(e) => {
                skipped += 1;
                log::debug!("{}: skipping line {}: {e}", path.display(), line_no + 1);
            }
        }
    }
    Ok((items, skipped))
}

fn write_items<T: Serialize>(writer: &mut impl Write, items: &[T]) -> std::io::Result<()> {
    for item in items {
        serde_json::to_writer(&mut *writer, item).map_err(std::io::Error::other)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use tempfile::TempDir;

    fn record(id: &str, title: &str) -> Record {
        Record {
            id: id.into(),
            title: title.into(),
            abstract_text: "An abstract.".into(),
            body: String::new(),
            source: "test".into(),
            domain: "physics".into(),
            provenance: Default::default(),
            categories: vec!["physics".into()],
            text: "An abstract.".into(),
        }
    }

    #[test]
    fn roundtrip_field_for_field() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        let records = vec![record("1", "First"), record("2", "Second")];

        store.append(&records, "test.jsonl").unwrap();
        let (back, skipped): (Vec<Record>, usize) = store.read_all("test.jsonl").unwrap();

        assert_eq!(skipped, 0);
        assert_eq!(back, records);
    }

    #[test]
    fn append_is_append() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.append(&[record("1", "A")], "test.jsonl").unwrap();
        store.append(&[record("2", "B")], "test.jsonl").unwrap();

        let (back, _): (Vec<Record>, usize) = store.read_all("test.jsonl").unwrap();
        assert_eq!(back.len(), 2);
    }

    #[test]
    fn bad_lines_skipped_with_count() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.append(&[record("1", "A")], "test.jsonl").unwrap();

        // Corrupt the file with a garbage line and a blank line
        let path = store.path_for("test.jsonl");
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{not json\n\n");
        std::fs::write(&path, content).unwrap();

        let (back, skipped): (Vec<Record>, usize) = store.read_all("test.jsonl").unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn clear_removes_stale_file() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.append(&[record("1", "A")], "test.jsonl").unwrap();
        store.clear("test.jsonl").unwrap();
        assert!(!store.path_for("test.jsonl").exists());
        // Clearing a missing file is fine
        store.clear("test.jsonl").unwrap();
    }

    #[test]
    fn read_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        let result: std::io::Result<(Vec<Record>, usize)> = store.read_all("absent.jsonl");
        assert!(result.is_err());
    }

    #[test]
    fn write_jsonl_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.jsonl");
        write_jsonl(&path, &[record("1", "A"), record("2", "B")]).unwrap();
        write_jsonl(&path, &[record("3", "C")]).unwrap();

        let (back, _): (Vec<Record>, usize) = read_jsonl(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].id, "3");
    }

    #[test]
    fn output_has_one_json_object_per_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.jsonl");
        write_jsonl(&path, &[record("1", "A"), record("2", "B")]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            assert!(line.starts_with('{') && line.ends_with('}'));
        }
    }
}
