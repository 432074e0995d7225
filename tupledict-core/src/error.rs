/// Error type for dictionary operations.
#[derive(Debug, thiserror::Error)]
pub enum DictionaryError {
    /// The key was absent (e.g. `None` or a bare null).
    #[error("a valid key has not been provided")]
    InvalidKey,
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] toml::de::Error),
}
