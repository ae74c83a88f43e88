//! Writing downloaded results into the session output directory

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use scanlift_core::domain::{EngineApi, SNAPSHOT_FILE, ScanResult};

/// Fetch the engine's JSON findings report and write it to `output_dir/report_filename`
pub async fn write_json_report(
    engine: &dyn EngineApi,
    output_dir: &Path,
    report_filename: &str,
) -> ScanResult<PathBuf> {
    tokio::fs::create_dir_all(output_dir).await?;

    let report = engine.json_report().await?;
    let path = output_dir.join(report_filename);
    tokio::fs::write(&path, &report).await?;

    info!(path = %path.display(), bytes = report.len(), "Wrote findings report");
    Ok(path)
}

/// Final path component of an engine-side path
pub fn artifact_file_name(engine_path: &str) -> Option<&str> {
    engine_path
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
}

/// Host destinations for plan report artifacts, paired with their engine-side paths
///
/// Artifacts named like the findings report or the progress snapshot, and later
/// artifacts sharing a file name with an earlier one, are skipped so nothing the
/// session writes is overwritten.
pub fn artifact_targets(
    artifacts: &[String],
    output_dir: &Path,
    report_filename: &str,
) -> Vec<(String, PathBuf)> {
    let mut taken: HashSet<&str> = HashSet::from([report_filename, SNAPSHOT_FILE]);
    let mut targets = Vec::with_capacity(artifacts.len());

    for artifact in artifacts {
        let Some(file_name) = artifact_file_name(artifact) else {
            warn!(%artifact, "Report artifact has no file name");
            continue;
        };
        if !taken.insert(file_name) {
            warn!(%artifact, file_name, "Report artifact would overwrite another output file; skipped");
            continue;
        }
        targets.push((artifact.clone(), output_dir.join(file_name)));
    }

    targets
}
