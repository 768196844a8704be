use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplaceError {
    #[error("target file not found: {0}")]
    TargetMissing(PathBuf),

    #[error("target file is not valid UTF-8: {0}")]
    InvalidUtf8(PathBuf),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Replace every exact occurrence of `search` in `content` with `replace`.
///
/// Literal substring replacement, no regex semantics. Matches are found
/// left-to-right and never overlap. Everything outside the substituted
/// spans is carried over byte-for-byte, so line order and line endings
/// survive untouched.
///
/// Returns the rewritten content and the number of occurrences replaced.
/// An empty `search` replaces nothing.
pub fn replace_literal(content: &str, search: &str, replace: &str) -> (String, usize) {
    if search.is_empty() {
        return (content.to_string(), 0);
    }

    let mut out = String::with_capacity(content.len());
    let mut count = 0;
    let mut rest = content;

    while let Some(pos) = rest.find(search) {
        out.push_str(&rest[..pos]);
        out.push_str(replace);
        rest = &rest[pos + search.len()..];
        count += 1;
    }

    out.push_str(rest);
    (out, count)
}

/// Rewrite `path` in place with all occurrences of `search` replaced.
///
/// Returns the number of occurrences replaced. When nothing matched the
/// file is left untouched (no write at all, so mtime is preserved).
///
/// The write is atomic: tempfile in the same directory + fsync + rename,
/// so a crash mid-write never leaves a truncated target. After a
/// successful rewrite the mtime is bumped so the invoking build system
/// recompiles the vendored library.
pub fn rewrite_file(path: &Path, search: &str, replace: &str) -> Result<usize, ReplaceError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ReplaceError::TargetMissing(path.to_path_buf()));
        }
        Err(e) => return Err(ReplaceError::Io(e)),
    };

    let content = std::str::from_utf8(&bytes)
        .map_err(|_| ReplaceError::InvalidUtf8(path.to_path_buf()))?;

    let (rewritten, count) = replace_literal(content, search, replace);

    if count == 0 {
        return Ok(0);
    }

    atomic_write(path, rewritten.as_bytes())?;

    let now = filetime::FileTime::now();
    filetime::set_file_mtime(path, now)?;

    Ok(count)
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or the original file is unchanged.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), ReplaceError> {
    let parent = path.parent().ok_or_else(|| {
        ReplaceError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Path has no parent directory",
        ))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;

    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
