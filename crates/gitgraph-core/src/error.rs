use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitGraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot not found at {}. Run `gitgraph generate` first", .0.display())]
    SnapshotMissing(PathBuf),

    #[error("Snapshot parse error at line {line}: {reason}")]
    SnapshotParse { line: usize, reason: String },

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, GitGraphError>;
