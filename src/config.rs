//! Run configuration shared by the document runner and the sandbox.

use crate::script::interp::DEFAULT_MAX_DEPTH;

/// How an actual value is checked against the expected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Comparison {
    /// Compare canonical text renderings; `4` and `"4"` are equal.
    #[default]
    Text,
    /// Compare decoded data values; integral floats equal their integers.
    Structural,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub comparison: Comparison,
    /// Maximum nesting of script function calls.
    pub max_depth: usize,
    /// Program used to run `shell` command cases.
    pub shell: String,
    pub use_colors: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            comparison: Comparison::Text,
            max_depth: DEFAULT_MAX_DEPTH,
            shell: "sh".to_string(),
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }
}

impl RunConfig {
    pub fn with_comparison(mut self, comparison: Comparison) -> Self {
        self.comparison = comparison;
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }
}
