use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::AsyncWriteExt;

use crate::error::DrugBriefError;

const LAST_SUMMARY_FILE: &str = "last_summary.txt";

pub fn drugbrief_cache_dir() -> PathBuf {
    match dirs::cache_dir() {
        Some(dir) => dir.join("drugbrief"),
        None => std::env::temp_dir().join("drugbrief"),
    }
}

/// Client-side store for the most recent report summary.
///
/// Holds only the summary text. Written after a successful report unless saving is
/// turned off, read by `drugbrief last`, and cleared on request. The pipeline never reads it.
#[derive(Debug, Clone)]
pub struct LastSummaryStore {
    path: PathBuf,
}

impl LastSummaryStore {
    pub fn open() -> Self {
        Self::at(drugbrief_cache_dir())
    }

    pub fn at(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(LAST_SUMMARY_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Option<String>, DrugBriefError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(None),
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Atomically replaces the stored summary (temp file + rename).
    pub async fn save(&self, summary: &str) -> Result<(), DrugBriefError> {
        let Some(dir) = self.path.parent() else {
            return Err(DrugBriefError::InvalidArgument(
                "Invalid summary store path (no parent directory)".into(),
            ));
        };
        tokio::fs::create_dir_all(dir).await?;

        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let tmp_path = dir.join(format!(
            ".{LAST_SUMMARY_FILE}.{}.{seed}.tmp",
            std::process::id()
        ));

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
            .await?;
        file.write_all(summary.as_bytes()).await?;
        file.flush().await?;
        drop(file);

        if let Err(err) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        Ok(())
    }

    /// Removes the stored summary. Returns whether anything was removed.
    pub async fn clear(&self) -> Result<bool, DrugBriefError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
