// Integration test utilities and common code
// WHY: Centralized invariant checks avoid duplication across integration tests

#![allow(dead_code)]

use plainspeak::{AdaptationEngine, AdaptationResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;

static SHARED_ENGINE: OnceLock<AdaptationEngine> = OnceLock::new();

/// Engine over the bundled catalog, compiled once per test binary
pub fn engine() -> &'static AdaptationEngine {
    SHARED_ENGINE.get_or_init(|| AdaptationEngine::new().expect("bundled catalog compiles"))
}

/// Character-indexed slice of `text`
pub fn char_slice(text: &str, start: usize, end: usize) -> String {
    text.chars().skip(start).take(end - start).collect()
}

/// Assert every structural guarantee a result must satisfy
pub fn assert_result_invariants(result: &AdaptationResult) {
    let original_len = result.original_text.chars().count();

    for expr in &result.expressions {
        assert!(expr.start < expr.end, "empty or inverted span: {expr:?}");
        assert!(expr.end <= original_len, "span past end of text: {expr:?}");
        assert_eq!(
            char_slice(&result.original_text, expr.start, expr.end),
            expr.original_text,
            "originalText does not match its span"
        );
    }

    for pair in result.expressions.windows(2) {
        assert!(pair[0].end <= pair[1].start, "overlapping or unsorted: {:?} / {:?}", pair[0], pair[1]);
    }

    let removed: usize = result.expressions.iter().map(|e| e.end - e.start).sum();
    let inserted: usize = result.expressions.iter().map(|e| e.simplified_text.chars().count()).sum();
    assert_eq!(
        result.adapted_text.chars().count(),
        original_len - removed + inserted,
        "adapted text length does not account for replacements"
    );
}

/// Test fixture helper for creating temporary directories with input files
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub root_path: PathBuf,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root_path = temp_dir.path().to_path_buf();

        Self {
            temp_dir,
            root_path,
        }
    }

    /// Create an input file with given content
    pub fn create_input_file<P: AsRef<Path>>(&self, relative_path: P, content: &[u8]) -> PathBuf {
        let file_path = self.root_path.join(relative_path);

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }

        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    pub fn history_path(&self) -> PathBuf {
        self.root_path.join("history.json")
    }
}
