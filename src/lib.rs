pub mod catalog;
pub mod template;
pub mod engine;
pub mod storage;
pub mod batch;

// Re-export main types for convenient access
pub use catalog::{
    Catalog, ExpressionCategory, ExpressionPattern, PatternDefinition, BUNDLED_PATTERNS
};
pub use engine::{AdaptationEngine, AdaptationResult, ExpressionMatch};

// Re-export boundary collaborators
pub use storage::{
    AdaptationStore, HistoryFile, MemoryStore, Page, StoredAdaptation
};
pub use batch::{adapt_files, decode_input, BatchConfig, FileOutcome, FileStats};
