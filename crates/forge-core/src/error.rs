//! Error types for MeshForge

use thiserror::Error;

/// The main error type for MeshForge operations
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Backend error (transient): {0}")]
    BackendTransient(String),

    #[error("Backend error (fatal): {0}")]
    BackendFatal(String),

    #[error("Task cancelled")]
    Cancelled,

    #[error("Conformance violation on '{platform}': {detail}")]
    ConformanceViolation { platform: String, detail: String },

    #[error("Export failure ({format}): {detail}")]
    ExportFailure { format: String, detail: String },

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Import error: {0}")]
    ImportError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),
}

/// Result type alias for MeshForge operations
pub type Result<T> = std::result::Result<T, ForgeError>;

impl ForgeError {
    /// Whether the scheduler may retry the failed attempt.
    ///
    /// Only transient backend failures (timeouts, flaky I/O declared
    /// retryable by the backend) consume retry budget; everything
    /// else fails the task immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ForgeError::BackendTransient(_))
    }
}

// Manual impl because io::Error is not Clone. Task results are shared
// with every waiter on a deduplicated task, so errors must be clonable.
impl Clone for ForgeError {
    fn clone(&self) -> Self {
        match self {
            Self::InvalidRequest(s) => Self::InvalidRequest(s.clone()),
            Self::UnknownBackend(s) => Self::UnknownBackend(s.clone()),
            Self::ResourceExhausted(s) => Self::ResourceExhausted(s.clone()),
            Self::BackendTransient(s) => Self::BackendTransient(s.clone()),
            Self::BackendFatal(s) => Self::BackendFatal(s.clone()),
            Self::Cancelled => Self::Cancelled,
            Self::ConformanceViolation { platform, detail } => Self::ConformanceViolation {
                platform: platform.clone(),
                detail: detail.clone(),
            },
            Self::ExportFailure { format, detail } => Self::ExportFailure {
                format: format.clone(),
                detail: detail.clone(),
            },
            Self::ConfigError(s) => Self::ConfigError(s.clone()),
            Self::ImportError(s) => Self::ImportError(s.clone()),
            Self::IoError(e) => Self::IoError(std::io::Error::new(e.kind(), e.to_string())),
            Self::TomlParseError(s) => Self::TomlParseError(s.clone()),
        }
    }
}

impl From<toml::de::Error> for ForgeError {
    fn from(err: toml::de::Error) -> Self {
        ForgeError::TomlParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(ForgeError::BackendTransient("timeout".into()).is_retryable());
        assert!(!ForgeError::BackendFatal("bad weights".into()).is_retryable());
        assert!(!ForgeError::InvalidRequest("empty prompt".into()).is_retryable());
        assert!(!ForgeError::ResourceExhausted("no vram".into()).is_retryable());
        assert!(!ForgeError::Cancelled.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let e = ForgeError::ConformanceViolation {
            platform: "vrchat_quest".to_string(),
            detail: "could not reach 10000 triangles".to_string(),
        };
        let msg = e.to_string();
        assert!(msg.contains("vrchat_quest"));
        assert!(msg.contains("10000"));
    }
}
