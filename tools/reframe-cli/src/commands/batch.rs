//! Render many independent clips concurrently.
//!
//! Each clip runs on the blocking pool with its own engine; a semaphore
//! bounds how many render at once.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use reframe_common::config::AppConfig;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::render::{render_job, spawn_ctrl_c_handler, RenderJob};

/// Batch manifest. Relative paths are resolved against the manifest's directory.
#[derive(Debug, Deserialize)]
pub struct BatchManifest {
    pub clips: Vec<RenderJob>,
}

impl BatchManifest {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read manifest {}: {e}", path.display()))?;
        Self::parse(&json, path.parent().unwrap_or_else(|| Path::new(".")))
    }

    pub fn parse(json: &str, base: &Path) -> anyhow::Result<Self> {
        let mut manifest: BatchManifest =
            serde_json::from_str(json).map_err(|e| anyhow::anyhow!("Invalid manifest: {e}"))?;
        for clip in &mut manifest.clips {
            clip.resolve_paths(base);
        }
        Ok(manifest)
    }
}

pub async fn run(app: AppConfig, manifest: PathBuf, jobs: usize) -> anyhow::Result<()> {
    let manifest = BatchManifest::load(&manifest)?;
    let total = manifest.clips.len();
    let jobs = jobs.max(1);
    println!("Rendering {total} clip(s), {jobs} at a time");

    let app = Arc::new(app);
    let cancel = Arc::new(AtomicBool::new(false));
    spawn_ctrl_c_handler(Arc::clone(&cancel));

    let semaphore = Arc::new(Semaphore::new(jobs));
    let mut tasks = JoinSet::new();

    for (index, job) in manifest.clips.into_iter().enumerate() {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| anyhow::anyhow!("Batch semaphore closed: {e}"))?;
        let app = Arc::clone(&app);
        let cancel = Arc::clone(&cancel);

        tasks.spawn_blocking(move || {
            let _permit = permit;
            let result = render_job(&app, &job, Some(cancel), None);
            (index, job.output, result)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => tracing::error!("Batch task panicked: {e}"),
        }
    }
    results.sort_by_key(|(index, _, _)| *index);

    let mut failed = 0usize;
    for (index, output, result) in &results {
        match result {
            Ok(report) => println!(
                "  [{index}] OK   {} ({} frames, {:.1}s)",
                output.display(),
                report.frames,
                report.elapsed_secs
            ),
            Err(e) => {
                failed += 1;
                println!("  [{index}] FAIL {}: {e}", output.display());
            }
        }
    }

    let failed = failed + (total - results.len());
    let finished = total - failed;
    println!("\n{finished} clip(s) rendered, {failed} failed.");
    if failed > 0 {
        return Err(anyhow::anyhow!("{failed} of {total} clip(s) failed"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_resolves_relative_paths() {
        let json = r#"{
            "clips": [
                {"input": "a.mp4", "detections": "a.jsonl", "output": "out/a.mp4", "seed": 7},
                {"input": "/frames/b", "trajectory": "b.json", "output": "out/b"}
            ]
        }"#;
        let manifest = BatchManifest::parse(json, Path::new("/jobs")).unwrap();
        assert_eq!(manifest.clips.len(), 2);
        assert_eq!(manifest.clips[0].input, PathBuf::from("/jobs/a.mp4"));
        assert_eq!(manifest.clips[0].seed, Some(7));
        assert_eq!(manifest.clips[1].input, PathBuf::from("/frames/b"));
        assert_eq!(
            manifest.clips[1].trajectory,
            Some(PathBuf::from("/jobs/b.json"))
        );
    }

    #[test]
    fn test_manifest_requires_clips() {
        assert!(BatchManifest::parse("{}", Path::new(".")).is_err());
    }
}
