//! Error types for partitioned Parquet writes.

use std::time::Duration;
use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E201: Configuration missing or invalid
    E201InvalidConfig,
    /// E202: Encoding or storage write failed
    E202WriteFailure,
    /// E203: Write did not finish within its timeout
    E203WriteTimeout,
    /// E204: The worker pool could not accept or run work
    E204PoolScheduling,
    /// E205: A batch handed to the pool does not have the canonical layout
    E205InvalidBatch,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E201InvalidConfig => "E201",
            Self::E202WriteFailure => "E202",
            Self::E203WriteTimeout => "E203",
            Self::E204PoolScheduling => "E204",
            Self::E205InvalidBatch => "E205",
        }
    }
}

/// Errors that can occur during Parquet writing operations
#[derive(Debug, Error)]
pub enum WriterError {
    /// Invalid configuration provided
    #[error("[{code}] Invalid configuration: {message}")]
    InvalidConfig { code: &'static str, message: String },

    /// Write operation failed
    #[error("[{code}] Write operation failed: {message}")]
    WriteFailure { code: &'static str, message: String },

    /// Write exceeded its deadline
    #[error("[{code}] Write to '{path}' timed out after {timeout:?}")]
    Timeout {
        code: &'static str,
        path: String,
        timeout: Duration,
    },

    /// Work could not be scheduled on the pool
    #[error("[{code}] Writer pool failure: {message}")]
    PoolScheduling { code: &'static str, message: String },

    /// Batch cannot be partitioned
    #[error("[{code}] Cannot partition batch: {message}")]
    InvalidBatch { code: &'static str, message: String },
}

impl WriterError {
    /// Create an invalid config error with error code
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            code: ErrorCode::E201InvalidConfig.as_str(),
            message: message.into(),
        }
    }

    /// Create a write failure error with error code
    pub fn write_failure(message: impl Into<String>) -> Self {
        Self::WriteFailure {
            code: ErrorCode::E202WriteFailure.as_str(),
            message: message.into(),
        }
    }

    pub fn timeout(path: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            code: ErrorCode::E203WriteTimeout.as_str(),
            path: path.into(),
            timeout,
        }
    }

    pub fn pool_scheduling(message: impl Into<String>) -> Self {
        Self::PoolScheduling {
            code: ErrorCode::E204PoolScheduling.as_str(),
            message: message.into(),
        }
    }

    pub fn invalid_batch(message: impl Into<String>) -> Self {
        Self::InvalidBatch {
            code: ErrorCode::E205InvalidBatch.as_str(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidConfig { .. } => ErrorCode::E201InvalidConfig,
            Self::WriteFailure { .. } => ErrorCode::E202WriteFailure,
            Self::Timeout { .. } => ErrorCode::E203WriteTimeout,
            Self::PoolScheduling { .. } => ErrorCode::E204PoolScheduling,
            Self::InvalidBatch { .. } => ErrorCode::E205InvalidBatch,
        }
    }
}

/// Result type alias for WriterError
pub type Result<T> = std::result::Result<T, WriterError>;
