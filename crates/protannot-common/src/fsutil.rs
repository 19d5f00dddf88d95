//! Atomic artifact writes
//!
//! Every run artifact is written to a sibling temp file and renamed into
//! place, so a process inspecting the run directory never sees a partial file.

use crate::error::{CommonError, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

fn temp_path_for(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| CommonError::InvalidPath(path.display().to_string()))?;
    let mut temp_name = std::ffi::OsString::from(".");
    temp_name.push(file_name);
    temp_name.push(".tmp");
    Ok(path.with_file_name(temp_name))
}

async fn write_then_rename(temp_path: &Path, path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(temp_path).await?;
    file.write_all(data).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(temp_path, path).await
}

/// Write `data` to `path` via write-then-rename. The temp file is removed
/// whenever the write fails.
pub async fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let temp_path = temp_path_for(path)?;
    if let Err(e) = write_then_rename(&temp_path, path, data).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    tracing::debug!(path = %path.display(), size_bytes = data.len(), "Wrote artifact");
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically
pub async fn write_json_atomic<T: serde::Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &json).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_atomic_creates_parent_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("run").join("seq_ids.txt");

        write_atomic(&target, b"P01308\nP01315\n").await.unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "P01308\nP01315\n");
        let leftovers: Vec<_> = std::fs::read_dir(target.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("go_terms.json");
        std::fs::write(&target, "old").unwrap();

        write_json_atomic(&target, &serde_json::json!({"P01308": ["GO:0005179"]}))
            .await
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&target).unwrap()).unwrap();
        assert_eq!(value["P01308"][0], "GO:0005179");
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // a directory in the way makes the final rename fail
        let target = dir.path().join("go_terms.tsv");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), "x").unwrap();

        assert!(write_atomic(&target, b"go_id\n").await.is_err());

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["go_terms.tsv"]);
    }

    #[tokio::test]
    async fn test_path_without_file_name_is_invalid() {
        let err = write_atomic("/", b"P01308\n").await.unwrap_err();
        assert!(matches!(err, CommonError::InvalidPath(_)));
    }
}
