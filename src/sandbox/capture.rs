//! Output sinks for the phases of a scripted case.

use tracing::debug;

use crate::script::OutputSink;

/// Captures printed lines so Actual can read them through `stdout.get()`.
#[derive(Debug, Default)]
pub struct CaptureSink {
    lines: Vec<String>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything printed, one line per `print()` call.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn trimmed(&self) -> String {
        self.text().trim().to_string()
    }
}

impl OutputSink for CaptureSink {
    fn emit(&mut self, line: &str) {
        debug!(line, "captured");
        self.lines.push(line.to_string());
    }
}

/// Forwards printed lines to the log, tagged with the phase that printed them.
pub struct LogSink {
    phase: &'static str,
}

impl LogSink {
    pub fn new(phase: &'static str) -> Self {
        Self { phase }
    }
}

impl OutputSink for LogSink {
    fn emit(&mut self, line: &str) {
        debug!(phase = self.phase, "{}", line);
    }
}
