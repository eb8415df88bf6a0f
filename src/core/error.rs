use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid profile: {reason}")]
    InvalidProfile { reason: String },

    #[error("fund catalog is empty")]
    EmptyCatalog,
}

impl EngineError {
    pub(crate) fn invalid_profile(reason: impl Into<String>) -> Self {
        EngineError::InvalidProfile {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse policy TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid policy: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to open catalog {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid fund on row {row}: {reason}")]
    InvalidFund { row: usize, reason: String },

    #[error("catalog contains no funds")]
    Empty,
}
