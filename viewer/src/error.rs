//! Error taxonomy for the viewer.
//!
//! Asset-level failures (`AssetLoad`) are recoverable and handled where they
//! occur. Session-level failures (`BackendInit`, `InvalidSessionData`) stop
//! rendering for the current session but never escape into the input or
//! render loop.

/// Stable machine-readable codes for error values surfaced to the host.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// Errors produced by the viewer engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewerError {
    /// A single layer or tile could not be fetched or decoded.
    #[error("asset load failed for {key}: {reason}")]
    AssetLoad { key: String, reason: String },

    /// The active render backend could not be brought up for this session.
    #[error("backend initialization failed: {0}")]
    BackendInit(String),

    /// The processing response is missing or has malformed required fields.
    #[error("invalid session data: {0}")]
    InvalidSessionData(String),

    /// A configuration value could not be parsed or is out of range.
    #[error("config parse failed: {0}")]
    ConfigParse(String),
}

impl ErrorCode for ViewerError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::AssetLoad { .. } => "E_ASSET_LOAD",
            Self::BackendInit(_) => "E_BACKEND_INIT",
            Self::InvalidSessionData(_) => "E_INVALID_SESSION",
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::AssetLoad { .. })
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;
