use std::path::PathBuf;

/// Errors raised anywhere in the coregistration stack.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Missing input: {}", path.display())]
    MissingInput { path: PathBuf },

    #[error("Insufficient correspondences: need at least {required} points, got {found}")]
    InsufficientCorrespondences { required: usize, found: usize },

    #[error("Singular transform: {0}")]
    SingularTransform(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn missing_input(path: impl Into<PathBuf>) -> Self {
        Self::MissingInput { path: path.into() }
    }

    pub fn insufficient(required: usize, found: usize) -> Self {
        Self::InsufficientCorrespondences { required, found }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
