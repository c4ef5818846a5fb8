use thiserror::Error;

use crate::mask::Permission;

/// Construction-time errors for masks and keys.
///
/// These represent operator or programmer mistakes. Request-time checks never
/// produce a `CoreError`; they are folded into a `Reality` instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown permission id: {0}")]
    UnknownPermission(u32),

    #[error("unknown permission name: {0}")]
    UnknownPermissionName(String),

    #[error("adjacent permissions: {lower} and {upper} occupy neighbouring slots")]
    AdjacentPermissions {
        lower: Permission,
        upper: Permission,
    },

    #[error("seal secret must not be empty")]
    EmptySecret,

    #[error("crypto error: {0}")]
    Crypto(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
