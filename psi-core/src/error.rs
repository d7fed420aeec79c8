//! Error handling

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, PsiError>;

#[derive(Debug, thiserror::Error)]
pub enum PsiError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(
        "Feature layout mismatch: expected v{expected_version} (hash: {expected_hash:08x}), \
         got v{actual_version} (hash: {actual_hash:08x})"
    )]
    LayoutMismatch {
        expected_version: u8,
        expected_hash: u32,
        actual_version: u8,
        actual_hash: u32,
    },

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("{0}")]
    Validation(String),
}

impl PsiError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PsiError::Io { path: path.into(), source }
    }
}
