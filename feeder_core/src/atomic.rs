//! Crash-safe file replacement for persisted state.

use std::{fs, io::Write, path::Path};

/// Replace `path` with `bytes` so that readers see either the old or the new
/// content, never a torn write: write a sibling temp file, fsync, rename.
/// Missing parent directories are created.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}
