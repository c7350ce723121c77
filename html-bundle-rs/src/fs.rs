//! Filesystem primitives used by the pipeline.

use std::io;
use std::path::Path;

/// Ensures `dir` exists and is empty, creating it (and its parents) when missing.
///
/// Existing contents are removed entry by entry so the directory itself survives.
pub async fn empty_dir(dir: &Path) -> io::Result<()> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return tokio::fs::create_dir_all(dir).await;
        }
        Err(err) => return Err(err),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await?;
        } else {
            tokio::fs::remove_file(&path).await?;
        }
    }
    Ok(())
}

pub async fn ensure_dir(dir: &Path) -> io::Result<()> {
    tokio::fs::create_dir_all(dir).await
}

pub async fn read_text_file(path: &Path) -> io::Result<String> {
    tokio::fs::read_to_string(path).await
}

pub async fn write_text_file(path: &Path, text: &str) -> io::Result<()> {
    tokio::fs::write(path, text).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_dir_creates_missing() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("a").join("b");
        empty_dir(&dir).await.unwrap();
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn test_empty_dir_clears_contents() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("dist");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("stale.js"), "old").unwrap();
        std::fs::write(dir.join("nested").join("stale.js"), "old").unwrap();

        empty_dir(&dir).await.unwrap();

        assert!(dir.is_dir());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }
}
