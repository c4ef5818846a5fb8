use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("store capacity must be greater than zero")]
    ZeroCapacity,

    #[error("shard count must be greater than zero")]
    ZeroShards,

    #[error("sweep interval must be greater than zero")]
    ZeroInterval,

    #[error("sweeper task failed: {0}")]
    SweeperFailed(String),
}

pub type GuardResult<T> = Result<T, GuardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            GuardError::ZeroCapacity.to_string(),
            "store capacity must be greater than zero"
        );
        assert_eq!(
            GuardError::SweeperFailed("panicked".into()).to_string(),
            "sweeper task failed: panicked"
        );
    }
}
