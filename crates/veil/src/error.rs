use thiserror::Error;

/// Error type for the Veil engine, HTTP adapter and binary.
///
/// Request classification is never an error; these cover construction,
/// configuration and process-level failures only.
#[derive(Debug, Error)]
pub enum VeilError {
    #[error("core error: {0}")]
    Core(#[from] veil_core::CoreError),

    #[error("guard error: {0}")]
    Guard(#[from] veil_guard::GuardError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("secret not available: environment variable {0} is unset or empty")]
    MissingSecret(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for VeilError {
    fn from(e: serde_json::Error) -> Self {
        VeilError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for VeilError {
    fn from(e: toml::de::Error) -> Self {
        VeilError::Config(format!("TOML parse error: {}", e))
    }
}

pub type VeilResult<T> = Result<T, VeilError>;
