//! Small durability helpers shared by every on-disk component
//! (vector store metadata, IVF index state, agent snapshots).
//!
//! The write path everywhere in this crate is "write to a sibling temp
//! path, fsync, rename into place, fsync the parent directory" so a
//! crash never leaves a half-written file where a reader expects one.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

pub(crate) fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub(crate) fn create_fully_synced(path: &Path, len: u64) -> io::Result<File> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .read(true)
        .write(true)
        .open(path)?;
    file.set_len(len)?;
    file.sync_all()?;
    Ok(file)
}

pub(crate) fn sync_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if parent.as_os_str().is_empty() {
            return Ok(());
        }
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

/// Serializes `value` to `path` via a temp-file-then-rename, so a reader
/// never observes a partially written file.
pub(crate) fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> io::Result<()> {
    ensure_parent_dir(path)?;
    let temp_path = path.with_extension("tmp");
    {
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&temp_path)?;
        let mut writer = io::BufWriter::new(&file);
        serde_json::to_writer_pretty(&mut writer, value)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
        use io::Write;
        writer.flush()?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, path)?;
    sync_parent_dir(path)?;
    Ok(())
}
