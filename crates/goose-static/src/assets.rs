//! Copying of the `static/` tree into the output directory.

use std::fs;
use std::io;
use std::path::Path;

use walkdir::{DirEntry, WalkDir};

/// Whether a directory entry is hidden (its name starts with a dot).
pub fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Copy every non-hidden file under `src` into `dst`, preserving relative
/// paths. Hidden directories are skipped together with their contents.
///
/// Once the files are in place, `dst` takes on the permission bits of `src`.
/// Returns the number of files copied.
pub fn copy_dir_contents(src: &Path, dst: &Path) -> io::Result<usize> {
    let mut copied = 0;

    let walker = WalkDir::new(src)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dst.join(relative);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &target)?;
        tracing::debug!("Copied {}", relative.display());
        copied += 1;
    }

    fs::create_dir_all(dst)?;
    let permissions = fs::metadata(src)?.permissions();
    fs::set_permissions(dst, permissions)?;

    Ok(copied)
}
