// WHY: Concurrent adaptation of many input files against one shared engine
// Each file is an independent call, so no coordination beyond the join is needed

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::engine::{AdaptationEngine, AdaptationResult};

/// Configuration for batch adaptation
#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    /// Abort on the first failing file instead of recording the failure
    pub fail_fast: bool,
}

/// Per-file processing statistics
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileStats {
    pub path: String,
    pub chars_processed: u64,
    pub expressions_found: u64,
    pub processing_time_ms: u64,
    /// `success` or `failed`
    pub status: String,
    pub error: Option<String>,
}

/// Result of adapting one file
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Option<AdaptationResult>,
    pub stats: FileStats,
}

/// Decode raw input bytes, rejecting anything that is not UTF-8 text
pub fn decode_input(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| {
        anyhow!(
            "invalid input: not valid UTF-8 (error at byte {})",
            e.utf8_error().valid_up_to()
        )
    })
}

async fn adapt_file(engine: Arc<AdaptationEngine>, path: PathBuf) -> Result<(AdaptationResult, u64)> {
    let start_time = std::time::Instant::now();

    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let text = decode_input(bytes).with_context(|| format!("Rejected {}", path.display()))?;

    let result = tokio::task::spawn_blocking(move || engine.process(&text))
        .await
        .context("Adaptation task panicked")?;

    Ok((result, start_time.elapsed().as_millis() as u64))
}

fn outcome_for(path: &Path, outcome: Result<(AdaptationResult, u64)>) -> FileOutcome {
    match outcome {
        Ok((result, elapsed_ms)) => FileOutcome {
            path: path.to_path_buf(),
            stats: FileStats {
                path: path.display().to_string(),
                chars_processed: result.original_text.chars().count() as u64,
                expressions_found: result.expressions.len() as u64,
                processing_time_ms: elapsed_ms,
                status: "success".to_string(),
                error: None,
            },
            result: Some(result),
        },
        Err(e) => FileOutcome {
            path: path.to_path_buf(),
            result: None,
            stats: FileStats {
                path: path.display().to_string(),
                chars_processed: 0,
                expressions_found: 0,
                processing_time_ms: 0,
                status: "failed".to_string(),
                error: Some(format!("{e:#}")),
            },
        },
    }
}

/// Adapt every file concurrently; outcomes are returned in input order
pub async fn adapt_files<P: AsRef<Path>>(
    engine: Arc<AdaptationEngine>,
    paths: &[P],
    config: BatchConfig,
) -> Result<Vec<FileOutcome>> {
    info!("Starting batch adaptation of {} files", paths.len());

    let mut tasks = JoinSet::new();
    for (index, path) in paths.iter().enumerate() {
        let engine = Arc::clone(&engine);
        let path = path.as_ref().to_path_buf();
        tasks.spawn(async move {
            let outcome = adapt_file(engine, path.clone()).await;
            (index, path, outcome)
        });
    }

    let mut slots: Vec<Option<FileOutcome>> = (0..paths.len()).map(|_| None).collect();

    while let Some(joined) = tasks.join_next().await {
        let (index, path, outcome) = joined.context("Batch task panicked")?;

        if let Err(ref e) = outcome {
            if config.fail_fast {
                tasks.abort_all();
                return Err(anyhow!("{e:#}"));
            }
            warn!("Failed to adapt {}: {:#}", path.display(), e);
        }

        slots[index] = Some(outcome_for(&path, outcome));
    }

    let outcomes: Vec<FileOutcome> = slots.into_iter().flatten().collect();
    let failed = outcomes.iter().filter(|o| o.result.is_none()).count();
    info!(
        "Completed batch adaptation: {} successful, {} failed",
        outcomes.len() - failed,
        failed
    );

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let file_path = dir.join(name);
        tokio::fs::write(&file_path, content).await.unwrap();
        file_path
    }

    #[test]
    fn test_decode_input_rejects_invalid_utf8() {
        let err = decode_input(vec![b'o', b'k', 0xFF, 0xFE]).unwrap_err();
        assert!(err.to_string().starts_with("invalid input"));
        assert!(err.to_string().contains("byte 2"));
        assert_eq!(decode_input(b"fine".to_vec()).unwrap(), "fine");
    }

    #[tokio::test]
    async fn test_adapt_files_preserves_order() {
        let temp_dir = TempDir::new().unwrap();
        let engine = Arc::new(AdaptationEngine::new().unwrap());

        let a = create_test_file(temp_dir.path(), "a.txt", b"time is money").await;
        let b = create_test_file(temp_dir.path(), "b.txt", b"nothing figurative").await;
        let c = create_test_file(temp_dir.path(), "c.txt", b"spill the beans").await;

        let outcomes = adapt_files(engine, &[&a, &b, &c], BatchConfig::default()).await.unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].path, a);
        assert_eq!(outcomes[1].path, b);
        assert_eq!(outcomes[2].path, c);
        assert_eq!(outcomes[0].stats.expressions_found, 1);
        assert_eq!(outcomes[1].stats.expressions_found, 0);
        assert_eq!(outcomes[2].result.as_ref().unwrap().adapted_text, "reveal the secret");
        assert!(outcomes.iter().all(|o| o.stats.status == "success"));
    }

    #[tokio::test]
    async fn test_adapt_files_records_failures() {
        let temp_dir = TempDir::new().unwrap();
        let engine = Arc::new(AdaptationEngine::new().unwrap());

        let good = create_test_file(temp_dir.path(), "good.txt", b"break the ice").await;
        let bad = create_test_file(temp_dir.path(), "bad.txt", &[0xFF, 0xFE, 0xFD]).await;
        let missing = temp_dir.path().join("missing.txt");

        let outcomes = adapt_files(engine, &[&good, &bad, &missing], BatchConfig::default())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_some());
        assert_eq!(outcomes[1].stats.status, "failed");
        assert!(outcomes[1].stats.error.as_ref().unwrap().contains("invalid input"));
        assert_eq!(outcomes[2].stats.status, "failed");
    }

    #[tokio::test]
    async fn test_adapt_files_fail_fast() {
        let temp_dir = TempDir::new().unwrap();
        let engine = Arc::new(AdaptationEngine::new().unwrap());
        let missing = temp_dir.path().join("missing.txt");

        let result = adapt_files(engine, &[&missing], BatchConfig { fail_fast: true }).await;
        assert!(result.is_err());
    }
}
