//! Error handling for AIUP
//!
//! This module provides the error taxonomy of the installer and the user-friendly
//! error reporting used by the CLI. The error system follows two principles:
//! 1. **Strongly-typed errors** so the orchestrator and its tests can match on the
//!    exact failure mode
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Architecture
//!
//! - [`AiupError`] - Enumerated error types for every fatal failure of an update run
//! - [`ErrorContext`] - Wrapper that adds details and a suggestion for display
//!
//! # Error Categories
//!
//! - **Resolution**: [`AiupError::ResolutionFailed`] - release metadata unreachable or malformed
//! - **Transport**: [`AiupError::FetchFailed`] - download failed after every retry
//! - **Integrity**: [`AiupError::IntegrityMismatch`] - downloaded bytes do not match the digest
//! - **Processes**: [`AiupError::ProcessTermination`] - running instances survived termination
//! - **Install**: [`AiupError::InstallIo`] - directory creation, swap or chmod failed
//!
//! Errors are propagated as [`anyhow::Error`] with context attached at each layer.
//! [`user_friendly_error`] walks the chain back to the typed error for display.
//!
//! # Examples
//!
//! ```rust,no_run
//! use aiup_cli::core::{AiupError, user_friendly_error};
//!
//! let error = AiupError::IntegrityMismatch {
//!     expected: "abc".to_string(),
//!     actual: "def".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display(); // Shows colored error with suggestion
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for AIUP operations.
///
/// Every variant is fatal for the current run: the CLI reports it and exits
/// with a non-zero status. Non-fatal conditions (missing icon, unwritable
/// profile) are logged as warnings and never surface as an `AiupError`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AiupError {
    /// The release metadata endpoint could not be queried or its response was
    /// not the expected structure.
    #[error("Failed to resolve release from {endpoint}: {reason}")]
    ResolutionFailed {
        /// The metadata endpoint that was queried
        endpoint: String,
        /// Why resolution failed
        reason: String,
    },

    /// A download failed on every attempt.
    #[error("Failed to download {url} after {attempts} attempt(s): {reason}")]
    FetchFailed {
        /// The locator that was being downloaded
        url: String,
        /// Number of attempts that were made
        attempts: u32,
        /// The error of the last attempt
        reason: String,
    },

    /// The downloaded artifact does not match the expected digest.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    IntegrityMismatch {
        /// Digest advertised by the release endpoint
        expected: String,
        /// Digest computed over the downloaded bytes
        actual: String,
    },

    /// Running instances of the application could not be stopped.
    #[error("Could not stop running instance(s): {}", format_pids(.survivors))]
    ProcessTermination {
        /// Process ids still alive after forceful termination
        survivors: Vec<u32>,
    },

    /// A filesystem operation of the install phase failed.
    #[error("Install failed during {operation} at {path}: {reason}")]
    InstallIo {
        /// The operation that failed (e.g. "create install directory")
        operation: String,
        /// The path involved
        path: String,
        /// Underlying error message
        reason: String,
    },

    /// Another installer run holds the install lock.
    #[error("Timed out waiting for install lock at {path}")]
    LockTimeout {
        /// Path of the lock file
        path: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

fn format_pids(pids: &[u32]) -> String {
    pids.iter().map(u32::to_string).collect::<Vec<_>>().join(", ")
}

impl AiupError {
    /// Build an [`AiupError::InstallIo`] from an I/O error and the path involved.
    pub fn install_io(
        operation: impl Into<String>,
        path: &std::path::Path,
        err: &std::io::Error,
    ) -> Self {
        Self::InstallIo {
            operation: operation.into(),
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Error context wrapper that pairs an [`AiupError`] with user-facing help.
///
/// ```rust,no_run
/// use aiup_cli::core::{AiupError, ErrorContext};
///
/// let context = ErrorContext::new(AiupError::LockTimeout { path: "/tmp/x".into() })
///     .with_suggestion("Wait for the other installer to finish")
///     .with_details("Only one installer may modify the install directory at a time");
///
/// println!("{}", context);
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying AIUP error
    pub error: AiupError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: AiupError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors.
    ///
    /// - Error message: Red and bold
    /// - Details: Yellow
    /// - Suggestion: Green
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`].
///
/// Walks the error chain looking for an [`AiupError`] (errors are usually wrapped
/// in `anyhow` context by the time they reach the CLI). Falls back to I/O error
/// recognition and finally to a generic message that keeps the full chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    for cause in error.chain() {
        if let Some(aiup_error) = cause.downcast_ref::<AiupError>() {
            let mut ctx = create_error_context(aiup_error);
            // Keep the outer context messages, they name the step that failed
            if error.chain().count() > 1 && ctx.details.is_none() {
                ctx.details = Some(format!("{error:#}"));
            }
            return ctx;
        }
    }

    if let Some(io_error) = error.chain().find_map(|c| c.downcast_ref::<std::io::Error>()) {
        let message = format!("{error:#}");
        return match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => ErrorContext::new(AiupError::Other {
                message,
            })
            .with_suggestion("Check ownership and permissions of the install directory"),
            _ => ErrorContext::new(AiupError::Other {
                message,
            })
            .with_suggestion("Check file permissions and disk space"),
        };
    }

    ErrorContext::new(AiupError::Other {
        message: format!("{error:#}"),
    })
    .with_suggestion("Re-run with --verbose for more details")
}

/// Create a user-friendly error context from an [`AiupError`].
pub fn create_error_context(error: &AiupError) -> ErrorContext {
    match error {
        AiupError::ResolutionFailed {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Check your internet connection and the configured api_url")
            .with_details("No release information is available, so no update is possible"),
        AiupError::FetchFailed {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Check your internet connection and try again")
            .with_details("The installed binary was left untouched"),
        AiupError::IntegrityMismatch {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Try again later; if the problem persists the release may be corrupt")
            .with_details("The downloaded file was discarded and the installed binary was left untouched"),
        AiupError::ProcessTermination {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Close the application manually and re-run the installer")
            .with_details("Installing over a running binary could corrupt it, so the update was aborted"),
        AiupError::InstallIo {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Check that the install directory is writable and has free space"),
        AiupError::LockTimeout {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Wait for the other installer run to finish, then retry")
            .with_details("Only one installer may modify the install directory at a time"),
        AiupError::ConfigError {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Fix the configuration file or remove it to use the defaults"),
        AiupError::Other {
            ..
        } => ErrorContext::new(error.clone()),
    }
}
