//! Unified error type for docrun.
//!
//! # Overview
//!
//! Every failure that can happen while processing a document is a
//! [`DocrunError`]. Each variant carries a stable `miette` code so that the
//! CLI can render fatal errors as diagnostics, while per-case errors are shown
//! by their bare message.
//!
//! # Error Construction
//!
//! Use `err_msg!` for message-only errors:
//!
//! ```rust
//! use docrun::{err_msg, DocrunError};
//! let err = err_msg!(Dispatch, "unknown code language {}", "ruby");
//! assert_eq!(err.to_string(), "unknown code language ruby");
//! assert!(matches!(err, DocrunError::Dispatch { .. }));
//! ```
//!
//! I/O failures keep their underlying cause and are built with
//! [`DocrunError::io`].

use std::path::Path;

use miette::Diagnostic;
use thiserror::Error;

use crate::sandbox::SandboxError;

#[derive(Debug, Error, Diagnostic)]
pub enum DocrunError {
    /// Malformed fixture metadata.
    #[error("{message}")]
    #[diagnostic(code(docrun::decode))]
    Decode { message: String },

    /// A source block with no fixture before it.
    #[error("{message}")]
    #[diagnostic(code(docrun::missing))]
    Missing { message: String },

    /// Unknown language, unknown filltype, schema failure, or save failure.
    #[error("{message}")]
    #[diagnostic(code(docrun::dispatch))]
    Dispatch { message: String },

    /// A scripted test failed in one of its phases.
    #[error("{0}")]
    #[diagnostic(code(docrun::sandbox))]
    Sandbox(SandboxError),

    /// An external command failed or could not be started.
    #[error("{message}")]
    #[diagnostic(code(docrun::command))]
    Command { message: String },

    /// Reading or writing a file failed.
    #[error("{message}")]
    #[diagnostic(code(docrun::io))]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl DocrunError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        DocrunError::Io {
            message: format!("{}: {}", path.display(), source),
            source,
        }
    }

    /// Short category name, matching the diagnostic code suffix.
    pub fn category(&self) -> &'static str {
        match self {
            DocrunError::Decode { .. } => "decode",
            DocrunError::Missing { .. } => "missing",
            DocrunError::Dispatch { .. } => "dispatch",
            DocrunError::Sandbox(_) => "sandbox",
            DocrunError::Command { .. } => "command",
            DocrunError::Io { .. } => "io",
        }
    }
}

impl From<SandboxError> for DocrunError {
    fn from(err: SandboxError) -> Self {
        DocrunError::Sandbox(err)
    }
}

/// Builds a message-only [`DocrunError`] variant with `format!` arguments.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $($arg:tt)*) => {
        $crate::diagnostics::DocrunError::$variant {
            message: format!($($arg)*),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_bare() {
        let err = err_msg!(Missing, "source code block {} is not preceded by a docrun fixture", 2);
        assert_eq!(
            err.to_string(),
            "source code block 2 is not preceded by a docrun fixture"
        );
        assert_eq!(err.category(), "missing");
    }

    #[test]
    fn test_diagnostic_codes() {
        let err = err_msg!(Decode, "bad yaml");
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("docrun::decode"));
    }

    #[test]
    fn test_io_keeps_source() {
        let err = DocrunError::io(
            Path::new("missing.md"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.to_string(), "missing.md: gone");
        assert!(std::error::Error::source(&err).is_some());
    }
}
