//! Core types shared across the installer.
//!
//! Currently this is the error taxonomy and its user-facing formatting. See
//! [`error`] for the details.

pub mod error;

pub use error::{AiupError, ErrorContext, create_error_context, user_friendly_error};
