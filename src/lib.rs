//! # docrun
//!
//! Extracts code examples from markdown documents, runs each one the way the
//! fixture comment before it describes, and reports which examples work.
//!
//! ```text
//! markdown ─▶ document::nodes ─▶ classify ─▶ PairingState::accept ─▶ Dispatcher
//!                                                                     ├─ pass / filltype
//!                                                                     ├─ SandboxRunner
//!                                                                     └─ CommandRunner
//! ```
//!
//! [`runner::DocRunner`] drives one document; [`report`] runs many.

pub use crate::diagnostics::DocrunError;

pub mod cli;
pub mod command;
pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod document;
pub mod filltype;
pub mod fixture;
pub mod pairing;
pub mod report;
pub mod results;
pub mod runner;
pub mod sandbox;
pub mod script;
