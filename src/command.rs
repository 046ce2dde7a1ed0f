//! External-command runner for `shell` code blocks.

use std::process::Command;

use tracing::{debug, info};

use crate::config::RunConfig;
use crate::diagnostics::DocrunError;
use crate::err_msg;
use crate::fixture::CommandCase;

pub struct CommandRunner {
    shell: String,
}

impl CommandRunner {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            shell: config.shell.clone(),
        }
    }

    /// Runs `code` with the configured shell; a non-zero exit is a failure.
    pub fn run(&self, case: &CommandCase, code: &str) -> Result<(), DocrunError> {
        info!(snapshot = %case.snapshot_id, shell = %self.shell, "running command");
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(code)
            .output()
            .map_err(|e| err_msg!(Command, "cannot run {}: {}", self.shell, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(stdout = %stdout.trim_end(), "command output");
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut message = format!("command {} exited with {}", case.snapshot_id, output.status);
        if !stderr.trim().is_empty() {
            message.push_str(": ");
            message.push_str(stderr.trim());
        }
        Err(DocrunError::Command { message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case() -> CommandCase {
        CommandCase {
            snapshot_id: "snap".to_string(),
        }
    }

    #[test]
    fn test_successful_command() {
        let runner = CommandRunner::new(&RunConfig::default());
        assert!(runner.run(&case(), "true").is_ok());
    }

    #[test]
    fn test_failing_command_reports_stderr() {
        let runner = CommandRunner::new(&RunConfig::default());
        let err = runner.run(&case(), "echo broken >&2; exit 3").unwrap_err();
        assert!(matches!(err, DocrunError::Command { .. }));
        let message = err.to_string();
        assert!(message.starts_with("command snap exited with"));
        assert!(message.ends_with(": broken"));
    }

    #[test]
    fn test_missing_shell() {
        let config = RunConfig {
            shell: "/nonexistent/shell".to_string(),
            ..RunConfig::default()
        };
        let err = CommandRunner::new(&config).run(&case(), "true").unwrap_err();
        assert!(err.to_string().starts_with("cannot run /nonexistent/shell"));
    }
}
