use std::path::PathBuf;

use thiserror::Error;

/// Failures at the model seams. Callers recover from all of these locally
/// (retraining or the neutral text score); none reach an HTTP client.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Incompatible model artifact: {0}")]
    Incompatible(String),

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Transformer model unavailable: {0}")]
    Transformer(String),

    #[error("Invalid lexicon: {0}")]
    Lexicon(String),

    #[error("Classification failed: {0}")]
    Inference(String),
}

impl ModelError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ModelError::Io {
            path: path.into(),
            source,
        }
    }
}
