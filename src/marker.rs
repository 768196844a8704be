//! The `.patching-done` sentinel gating patch re-application.
//!
//! The marker is a zero-byte file co-located with the target. Its
//! existence is the only persisted state: present means the patch has
//! already run. This tool never deletes it; the marker's lifecycle is
//! tied to the libdeps directory, which the external clean step removes
//! wholesale (allowing re-patching after the next dependency fetch).

use std::fs;
use std::io;
use std::path::Path;

/// Default marker file name, matching what PlatformIO projects expect.
pub const MARKER_FILE_NAME: &str = ".patching-done";

/// Check whether the patch has already been recorded as applied.
pub fn is_done(marker: &Path) -> bool {
    marker.exists()
}

/// Record patch completion by creating the zero-byte sentinel.
///
/// Truncates any existing file at the path, so the marker stays zero
/// bytes even if something else wrote there.
pub fn write_done(marker: &Path) -> io::Result<()> {
    let file = fs::File::create(marker)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_absent_then_present() {
        let temp_dir = tempfile::tempdir().unwrap();
        let marker = temp_dir.path().join(MARKER_FILE_NAME);

        assert!(!is_done(&marker));
        write_done(&marker).unwrap();
        assert!(is_done(&marker));
    }

    #[test]
    fn test_marker_is_zero_bytes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let marker = temp_dir.path().join(MARKER_FILE_NAME);

        write_done(&marker).unwrap();
        assert_eq!(fs::metadata(&marker).unwrap().len(), 0);
    }

    #[test]
    fn test_write_done_truncates_existing_content() {
        let temp_dir = tempfile::tempdir().unwrap();
        let marker = temp_dir.path().join(MARKER_FILE_NAME);
        fs::write(&marker, b"stale").unwrap();

        write_done(&marker).unwrap();
        assert_eq!(fs::metadata(&marker).unwrap().len(), 0);
    }

    #[test]
    fn test_write_done_fails_in_missing_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let marker = temp_dir.path().join("no-such-dir").join(MARKER_FILE_NAME);

        assert!(write_done(&marker).is_err());
    }
}
