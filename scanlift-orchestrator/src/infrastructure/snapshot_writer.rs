//! Progress snapshot persistence
//!
//! The snapshot is replaced atomically: it is written to a sibling temp file and renamed
//! over `progress.json`, so readers never see a partial document.

use std::path::{Path, PathBuf};

use tracing::debug;

pub use scanlift_core::domain::SNAPSHOT_FILE;
use scanlift_core::domain::{ProgressSnapshot, ScanError};

const SNAPSHOT_TMP_FILE: &str = ".progress.json.tmp";

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write snapshot to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<SnapshotError> for ScanError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::Write { source, .. } => ScanError::Io(source),
            SnapshotError::Serialize(e) => ScanError::Io(std::io::Error::other(e)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    pub async fn write(&self, snapshot: &ProgressSnapshot) -> Result<(), SnapshotError> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        let target = self.path();
        let tmp = self.dir.join(SNAPSHOT_TMP_FILE);

        let write_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| SnapshotError::Write { path, source }
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(write_err(&self.dir))?;
        tokio::fs::write(&tmp, &json).await.map_err(write_err(&tmp))?;
        tokio::fs::rename(&tmp, &target)
            .await
            .map_err(write_err(&target))?;

        debug!(path = %target.display(), status = ?snapshot.status, "Wrote progress snapshot");
        Ok(())
    }

    /// Read the current snapshot back
    pub async fn read(&self) -> Option<ProgressSnapshot> {
        let bytes = tokio::fs::read(self.path()).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanlift_core::domain::{
        AlertCounts, ComponentProgress, PlanExecution, SnapshotStatus,
    };

    #[tokio::test]
    async fn test_write_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path().join("out"));

        let mut execution = PlanExecution {
            plan_id: "1".into(),
            started: "2026-01-01T10:00:00Z".into(),
            info: vec!["Job spider started".into()],
            ..Default::default()
        };
        let running = ProgressSnapshot::from_execution(
            &execution,
            10,
            AlertCounts::default(),
            ComponentProgress::default(),
            vec![],
        );
        writer.write(&running).await.unwrap();
        assert_eq!(writer.read().await.unwrap().status, SnapshotStatus::Running);

        execution.finished = "2026-01-01T10:01:00Z".into();
        let done = ProgressSnapshot::from_execution(
            &execution,
            60,
            AlertCounts::default(),
            ComponentProgress::default(),
            vec![],
        );
        writer.write(&done).await.unwrap();

        let read = writer.read().await.unwrap();
        assert_eq!(read.status, SnapshotStatus::Completed);
        assert_eq!(read.elapsed_seconds, 60);
        assert!(!dir.path().join("out").join(SNAPSHOT_TMP_FILE).exists());
    }
}
