use std::fs;
use std::io;
use std::path::Path;

/// Total size in bytes of all regular files below `path`.
///
/// Symlinks are not followed. Blocking; run it off the async runtime.
pub fn disk_usage(path: &Path) -> io::Result<u64> {
    let mut size = 0;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            size += disk_usage(&entry.path())?;
        } else if file_type.is_file() {
            size += entry.metadata()?.len();
        }
    }
    Ok(size)
}
