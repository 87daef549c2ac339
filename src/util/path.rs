use std::io;
use std::path::{Path, MAIN_SEPARATOR};

/// `path` with the platform separator replaced by `/`.
///
/// On Unix a `\` is a legal file name character and is kept.
pub fn to_slash_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if MAIN_SEPARATOR == '/' {
        raw.into_owned()
    } else {
        raw.replace(MAIN_SEPARATOR, "/")
    }
}

/// `path` relative to `root`, with `/` separators.
pub fn relative_slash_path(root: &Path, path: &Path) -> io::Result<String> {
    let relative = pathdiff::diff_paths(path, root).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "cannot compute relative path from {} to {}",
                root.display(),
                path.display()
            ),
        )
    })?;
    Ok(to_slash_path(&relative))
}

/// Last component of `path`, resolving `.` and `..` through the filesystem.
pub fn file_name_of(path: &Path) -> io::Result<String> {
    if let Some(name) = path.file_name() {
        return Ok(name.to_string_lossy().into_owned());
    }
    let canonical = path.canonicalize()?;
    canonical
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path has no name: {}", path.display()),
            )
        })
}
