// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtectError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sync state error: {0}")]
    StateFile(String),

    #[error("Authentication failed with status {status}, check username and password")]
    AuthenticationFailed { status: u16 },

    #[error("Request still unauthorized after refreshing credentials")]
    AuthorizationFailed,

    #[error("Download failed with status {status}: {message}")]
    DownloadFailed { status: u16, message: String },

    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtectError {
    /// Failures worth another attempt: unexpected statuses and network trouble.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProtectError::DownloadFailed { .. } | ProtectError::Transport(_)
        )
    }

    /// Process exit status for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProtectError::Config(_) | ProtectError::Io(_) | ProtectError::StateFile(_) => 1,
            ProtectError::AuthenticationFailed { .. } => 2,
            ProtectError::AuthorizationFailed => 3,
            ProtectError::DownloadFailed { .. } | ProtectError::Api { .. } | ProtectError::Json(_) => 4,
            ProtectError::Transport(_) => 5,
        }
    }

    /// Auth errors end the whole run; nothing downstream can succeed without a session.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            ProtectError::AuthenticationFailed { .. } | ProtectError::AuthorizationFailed
        )
    }
}

pub type Result<T> = std::result::Result<T, ProtectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let http = ProtectError::DownloadFailed { status: 500, message: "boom".into() };
        assert!(http.is_retryable());
        assert!(!ProtectError::AuthorizationFailed.is_retryable());
        assert!(!ProtectError::AuthenticationFailed { status: 403 }.is_retryable());
        assert!(!ProtectError::Config("x".into()).is_retryable());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ProtectError::Config("x".into()).exit_code(), 1);
        assert_eq!(ProtectError::AuthenticationFailed { status: 401 }.exit_code(), 2);
        assert_eq!(ProtectError::AuthorizationFailed.exit_code(), 3);
        assert_eq!(
            ProtectError::DownloadFailed { status: 404, message: String::new() }.exit_code(),
            4
        );
    }
}
