//! Error types for directory cache operations.
//!
//! All public operations resolve to either a success value or a single
//! structured [`LdapCacheError`]; directory-protocol failures carry the
//! server's result code verbatim.

/// Main error type for directory cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LdapCacheError {
    /// Cannot reach or bind to the directory server. Fatal to startup;
    /// reconnect policy is the caller's decision.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// A read or write was rejected by the directory server. The result
    /// code is propagated unmodified.
    #[error("Directory error (code {code}): {message}")]
    Directory { code: u32, message: String },

    /// A query was attempted before any rebuild succeeded. Recoverable by
    /// calling `init_cache`.
    #[error("Cache not initialized, call init_cache first")]
    CacheNotInitialized,

    /// A rebuild observed zero records or the search stream errored
    /// mid-flight. The previous snapshot, if any, is preserved.
    #[error("Cache build failed: {message}")]
    CacheBuildFailed { message: String },

    /// No directory entry matched the requested username.
    #[error("User not found: {username}")]
    NotFound { username: String },

    /// Caller-supplied input violated a precondition. Rejected before any
    /// directory call is made.
    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl LdapCacheError {
    /// Connection failure with a message.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Directory rejection carrying the server result code.
    pub fn directory(code: u32, message: impl Into<String>) -> Self {
        Self::Directory {
            code,
            message: message.into(),
        }
    }

    /// Failed rebuild with a reason.
    pub fn build_failed(message: impl Into<String>) -> Self {
        Self::CacheBuildFailed {
            message: message.into(),
        }
    }

    /// Unknown username.
    pub fn not_found(username: impl Into<String>) -> Self {
        Self::NotFound {
            username: username.into(),
        }
    }

    /// Rejected caller input.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

impl From<ldap3::LdapError> for LdapCacheError {
    fn from(err: ldap3::LdapError) -> Self {
        match err {
            ldap3::LdapError::LdapResult { result } => Self::Directory {
                code: result.rc,
                message: result.text,
            },
            other => Self::Connection {
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias for directory cache operations.
pub type LdapCacheResult<T> = Result<T, LdapCacheError>;
