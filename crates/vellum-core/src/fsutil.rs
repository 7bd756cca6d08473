//! Filesystem utilities shared by the state records and the stores.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::VellumResult;

/// Write data to a file atomically using temp-file-then-rename.
///
/// On POSIX, `rename()` within the same filesystem is atomic: either the
/// old file or the new file is visible, never a partial write. The temp
/// file is fsynced before the rename so the data is durable on disk.
/// Single-record state files (graph, index, remote registry) all go
/// through here; object writes don't need it because objects are
/// create-if-absent and never rewritten.
pub fn atomic_write(path: &Path, data: &[u8]) -> VellumResult<()> {
    let tmp = path.with_extension("tmp");
    let mut file = File::create(&tmp)?;
    file.write_all(data)?;
    file.sync_data()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Enumerate the plain filenames directly inside `dir`, sorted.
///
/// Subdirectories and unreadable entries are skipped. Returns an empty
/// list when the directory does not exist.
pub fn plain_filenames_in(dir: &Path) -> VellumResult<Vec<String>> {
    let mut names = Vec::new();
    if !dir.is_dir() {
        return Ok(names);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
