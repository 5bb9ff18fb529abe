//! Error types for pg-handler.
//!
//! Defines the main error enum used throughout the crate.

use thiserror::Error;

use crate::query::BoostType;

/// Main error type for handler operations.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Network or authentication failure while connecting (host unreachable,
    /// auth failed, timeout). Retried according to the retry policy.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// The driver rejected a connection option it does not support.
    #[error("Unsupported connection option: {0}")]
    UnsupportedOption(String),

    /// Errors reported by the database while executing or committing.
    #[error("Query error: {0}")]
    Query(String),

    /// The staged query cannot be executed (e.g. it is empty).
    #[error("query is invalid: {0}")]
    InvalidQuery(String),

    /// A boost mode was requested but the statement template cannot take
    /// the parameter rows.
    #[error("BoostType {boost} is set but {reason}")]
    BoostMode { boost: BoostType, reason: String },

    /// An argument is outside the legal domain of its type.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal invariant violated (logic defect, not user error).
    #[error("Internal error: {0}")]
    Internal(String),

    /// Closing the connection at the end of a scoped block failed.
    #[error("Exit process failed. Details are as follows.\n{0}")]
    ExitFailed(String),

    /// Reading a password or an operator answer from the terminal failed.
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Configuration errors (invalid config file, bad connection string, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl HandlerError {
    /// Creates a connectivity error with the given message.
    pub fn connectivity(msg: impl Into<String>) -> Self {
        Self::Connectivity(msg.into())
    }

    /// Creates an unsupported-option error with the given message.
    pub fn unsupported_option(msg: impl Into<String>) -> Self {
        Self::UnsupportedOption(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates an invalid query error with the given message.
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }

    /// Creates a boost mode error for the given mode.
    pub fn boost_mode(boost: BoostType, reason: impl Into<String>) -> Self {
        Self::BoostMode {
            boost,
            reason: reason.into(),
        }
    }

    /// Creates an invalid argument error with the given message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Creates an exit failure error with the given message.
    pub fn exit_failed(msg: impl Into<String>) -> Self {
        Self::ExitFailed(msg.into())
    }

    /// Creates a prompt error with the given message.
    pub fn prompt(msg: impl Into<String>) -> Self {
        Self::Prompt(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true if the error is a connection-time connectivity failure.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connectivity(_) => "Connectivity Error",
            Self::UnsupportedOption(_) => "Unsupported Option",
            Self::Query(_) => "Query Error",
            Self::InvalidQuery(_) => "Invalid Query",
            Self::BoostMode { .. } => "Boost Mode Error",
            Self::InvalidArgument(_) => "Invalid Argument",
            Self::Internal(_) => "Internal Error",
            Self::ExitFailed(_) => "Exit Failure",
            Self::Prompt(_) => "Prompt Error",
            Self::Config(_) => "Configuration Error",
        }
    }
}

/// Result type alias using HandlerError.
pub type Result<T> = std::result::Result<T, HandlerError>;
