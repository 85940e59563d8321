use crate::error::Result;
use std::fs::{self, File};
use std::path::Path;
use tempfile::NamedTempFile;

/// Write a file so that it either appears complete or not at all.
///
/// Content goes to a temporary file in the destination directory, which is
/// renamed over `path` once `write` succeeds. On error the temporary file is
/// removed and any existing file at `path` is left untouched.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp_file = NamedTempFile::new_in(dir)?;
    write(temp_file.as_file_mut())?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path).map_err(|e| e.error)?;

    Ok(())
}
