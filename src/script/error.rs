use std::fmt;

use thiserror::Error;

/// A line/column position in script source, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Maps byte offsets to line/column positions.
pub(crate) struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts }
    }

    pub fn pos(&self, offset: usize) -> Pos {
        let line = match self.starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        Pos {
            line: line as u32 + 1,
            col: (offset - self.starts[line]) as u32 + 1,
        }
    }
}

/// An error raised while lexing, parsing or evaluating a script.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct ScriptError {
    pub message: String,
    pub pos: Option<Pos>,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            pos: None,
        }
    }

    pub fn at(message: impl Into<String>, pos: Pos) -> Self {
        Self {
            message: message.into(),
            pos: Some(pos),
        }
    }

    /// Attaches a position unless the error already carries one.
    pub fn or_at(mut self, pos: Pos) -> Self {
        if self.pos.is_none() {
            self.pos = Some(pos);
        }
        self
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pos {
            Some(pos) => write!(f, "{}: {}", pos, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Shorthand for a failed script operation with a formatted message.
#[macro_export]
macro_rules! script_err {
    ($($arg:tt)*) => {
        Err($crate::script::ScriptError::new(format!($($arg)*)))
    };
}
