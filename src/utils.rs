//! Helpers for log formatting and file output.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument, warn};

use crate::error::Result;

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a count
/// of the bytes left out.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Sibling path used while a file is being written.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "output".into());
    name.push(format!(".tmp-{}", std::process::id()));
    path.with_file_name(name)
}

/// Write `bytes` to `path` through a temporary sibling and a rename.
///
/// The parent directory is created when missing. If anything fails the
/// previous file at `path`, if any, is left as it was.
#[instrument(level = "info", skip(bytes), fields(path = %path.display(), bytes = bytes.len()))]
pub async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let tmp = temp_path_for(path);
    if let Err(e) = fs::write(&tmp, bytes).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp, path).await {
        warn!(error = %e, tmp = %tmp.display(), "Rename into place failed");
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    debug!("Wrote file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ark_full_feed-{name}-{}", std::process::id()))
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let s = "é".repeat(10);
        assert_eq!(truncate_for_log(&s, 3), "ééé…(+14 bytes)");
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let tmp = temp_path_for(Path::new("output/full_feed.xml"));
        assert_eq!(tmp.parent(), Some(Path::new("output")));
        assert!(tmp.file_name().unwrap().to_string_lossy().starts_with("full_feed.xml.tmp-"));
    }

    #[tokio::test]
    async fn test_write_atomically_creates_and_replaces() {
        let dir = scratch_dir("atomic");
        let path = dir.join("nested").join("feed.xml");

        write_atomically(&path, b"first").await.unwrap();
        assert_eq!(fs::read(&path).await.unwrap(), b"first");

        write_atomically(&path, b"second").await.unwrap();
        assert_eq!(fs::read(&path).await.unwrap(), b"second");
        assert!(!temp_path_for(&path).exists());

        let _ = fs::remove_dir_all(&dir).await;
    }
}
