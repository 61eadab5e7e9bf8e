// SPDX-License-Identifier: GPL-3.0-or-later

//! Source directory scanning.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Recursively collect video files under `root`.
///
/// Symlinks are never followed, non-video extensions are skipped, and the
/// result is sorted so runs over the same tree are deterministic.
pub async fn scan_videos(root: &Path, extensions: &[String]) -> std::io::Result<Vec<PathBuf>> {
    let mut videos = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                // the run aborts only when the root itself is unreadable
                if dir == root {
                    return Err(e);
                }
                warn!(target: "scan", "skipping unreadable directory {}: {}", dir.display(), e);
                continue;
            }
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_symlink() {
                debug!(target: "scan", "skipping symlink {}", path.display());
                continue;
            }
            if file_type.is_dir() {
                pending.push(path);
            } else if has_video_extension(&path, extensions) {
                videos.push(path);
            }
        }
    }

    videos.sort();
    Ok(videos)
}

fn has_video_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .map(|e| extensions.iter().any(|known| known == &e))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exts() -> Vec<String> {
        vec!["mkv".to_string(), "mp4".to_string(), "avi".to_string()]
    }

    #[tokio::test]
    async fn finds_nested_videos_and_skips_other_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.mkv"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("season1")).unwrap();
        std::fs::write(dir.path().join("season1/b.mp4"), b"x").unwrap();

        let found = scan_videos(dir.path(), &exts()).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("a.mkv"));
        assert!(found[1].ends_with("season1/b.mp4"));
    }

    #[tokio::test]
    async fn extension_match_is_case_insensitive() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("UPPER.MKV"), b"x").unwrap();

        let found = scan_videos(dir.path(), &exts()).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinks_are_not_followed() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("real.mkv"), b"x").unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("real.mkv"),
            dir.path().join("link.mkv"),
        )
        .unwrap();

        let found = scan_videos(dir.path(), &exts()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("real.mkv"));
    }

    #[tokio::test]
    async fn missing_root_is_an_error() {
        let result = scan_videos(Path::new("/no/such/dir"), &exts()).await;
        assert!(result.is_err());
    }
}
