//! Common types shared across the Prism crates.
//!
//! This crate holds the error taxonomy every component converts into before
//! crossing back to a caller, plus the observability helpers used by the
//! server binary and integration tests. It stays dependency-light so the
//! provider crates can all depend on it.
//!
//! # Overview
//!
//! - [`PrismError`] and [`Result`]: the cross-component error taxonomy
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use prism_common::PrismError;
//!
//! let err = PrismError::Input("Text is required".into());
//! assert!(err.is_client_error());
//! assert_eq!(err.to_string(), "invalid input: Text is required");
//! ```
use serde::Serialize;

pub mod observability;

/// Error taxonomy used across the Prism system.
///
/// Provider and parser errors are converted into one of these variants at
/// the boundary of the component that observed them.
#[derive(thiserror::Error, Debug)]
pub enum PrismError {
    /// The caller supplied a missing or invalid url, text, or prompt.
    #[error("invalid input: {0}")]
    Input(String),

    /// A required credential is absent or the service is disabled.
    #[error("service not configured: {0}")]
    Config(String),

    /// An outbound provider returned a non-success status or an unusable body.
    #[error("{service} request failed: {message}")]
    Upstream {
        service: &'static str,
        status: Option<u16>,
        message: String,
        body: Option<String>,
    },

    /// The model reply could not be turned into the expected JSON shape.
    #[error("no valid JSON in model response: {reason}")]
    Parse { reason: String, raw: String },

    /// A polling budget ran out before the provider produced a result.
    #[error("could not generate image after {attempts} attempts")]
    Exhausted { attempts: u32 },

    /// An internal invariant did not hold.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PrismError {
    /// Convenience constructor for upstream failures without an HTTP status.
    pub fn upstream(service: &'static str, message: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            status: None,
            message: message.into(),
            body: None,
        }
    }

    /// True when the failure was caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Input(_))
    }

    /// Short machine-readable kind, used as a structured logging field.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Input(_) => ErrorKind::Input,
            Self::Config(_) => ErrorKind::Config,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Exhausted { .. } => ErrorKind::Exhausted,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Discriminant of [`PrismError`], serialisable for logs and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Input,
    Config,
    Upstream,
    Parse,
    Exhausted,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Input => "input",
            Self::Config => "config",
            Self::Upstream => "upstream",
            Self::Parse => "parse",
            Self::Exhausted => "exhausted",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Convenient alias for results that use [`PrismError`].
pub type Result<T> = std::result::Result<T, PrismError>;
