//! # Script Interpreter
//!
//! A small Starlark-dialect interpreter in which documentation examples run.
//!
//! ## Module Structure
//!
//! - **Lexer**: `logos` tokens plus indentation tracking
//! - **Parser**: recursive descent into [`ast`]
//! - **Interp**: tree-walking evaluation over a persistent [`Env`]
//! - **Builtins / Methods**: the predeclared universe and built-in type methods
//!
//! Host code extends a script's world in two ways: by binding values into the
//! environment before a run, and by answering `load()` through a [`ModuleLoader`].

pub mod ast;
pub mod builtins;
pub mod error;
pub mod interp;
pub mod lexer;
mod methods;
pub mod parser;
pub mod value;

pub use error::{Pos, ScriptError};
pub use interp::{eval_literal, Env, Interpreter, Module, ModuleLoader, NoModules, OutputSink};
pub use value::{Args, DictKey, Value};
