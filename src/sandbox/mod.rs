//! # Sandbox Script Runner
//!
//! Runs a scripted test case against two standing objects, a mutable dataset
//! handle bound as `ds` and a context handle bound as `ctx`, with every
//! capability module replaced by a deterministic stand-in.
//!
//! A case runs in strictly ordered phases: Setup, Definition, Call, Actual and
//! Compare. Interpretation hands back a new environment from every phase, so
//! the standing objects are bound again before each one.

use thiserror::Error;

use crate::script::ScriptError;

pub mod capability;
pub mod capture;
pub mod clock;
pub mod compare;
pub mod runner;
pub mod standing;

pub use capability::{CapabilityProvider, MockCapabilities};
pub use capture::CaptureSink;
pub use compare::{canonical_text, compare};
pub use runner::SandboxRunner;
pub use standing::{ContextHandle, DatasetHandle};

/// A failed scripted test case, qualified by the phase that failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SandboxError {
    #[error("during Setup: {0}")]
    Setup(ScriptError),
    #[error("running code block: {0}")]
    Definition(ScriptError),
    #[error("during Call: {0}")]
    Call(ScriptError),
    #[error("during Actual: {0}")]
    Actual(ScriptError),
    #[error("test case failure\n  actual: {actual}\n  expect: {expect}")]
    Mismatch { actual: String, expect: String },
}
