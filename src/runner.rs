//! Per-document runner: folds a document's nodes through the pairing state
//! machine and dispatches every complete case.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::config::RunConfig;
use crate::diagnostics::DocrunError;
use crate::dispatch::Dispatcher;
use crate::document::{classify, nodes};
use crate::err_msg;
use crate::pairing::{PairingState, Step};
use crate::results::{CaseError, DocumentRun};

/// Runs the cases of one document. Build a fresh runner for every document.
pub struct DocRunner {
    dispatcher: Dispatcher,
}

impl DocRunner {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            dispatcher: Dispatcher::new(config),
        }
    }

    pub fn with_dispatcher(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Reads and runs the document at `path`. Save directives resolve
    /// relative to the document's directory.
    pub fn run_document(config: &RunConfig, path: &Path) -> Result<DocumentRun, DocrunError> {
        let text = fs::read_to_string(path).map_err(|e| DocrunError::io(path, e))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        info!(path = %path.display(), "running document");
        let runner = Self::with_dispatcher(Dispatcher::new(config).with_base_dir(base_dir));
        Ok(runner.run_markdown(&text))
    }

    pub fn run_markdown(&self, markdown: &str) -> DocumentRun {
        let mut run = DocumentRun::default();
        let last = nodes(markdown)
            .map(classify)
            .fold(PairingState::default(), |state, node| {
                let (next, step) = state.accept(node);
                self.record(step, &mut run);
                next
            });
        if last.is_pending() {
            debug!("document ended with a fixture that has no source block");
        }
        run
    }

    fn record(&self, step: Step, run: &mut DocumentRun) {
        match step {
            Step::Nothing => {}
            Step::Malformed(error) => run.errors.push(CaseError {
                case: run.results.count_total,
                error,
            }),
            Step::Missing(_) => {
                let case = run.results.open_case();
                run.errors.push(CaseError {
                    case,
                    error: err_msg!(
                        Missing,
                        "source code block {} is not preceded by a docrun fixture",
                        case
                    ),
                });
                run.results.add_missing();
            }
            Step::Ready(fixture, source) => {
                let case = run.results.open_case();
                let outcome = self.dispatcher.dispatch(&fixture, &source, case);
                if outcome.success {
                    run.results.add_success(outcome.trivial);
                }
                for error in [outcome.error, outcome.save_error].into_iter().flatten() {
                    run.errors.push(CaseError { case, error });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(markdown: &str) -> DocumentRun {
        DocRunner::new(&RunConfig::default()).run_markdown(markdown)
    }

    #[test]
    fn test_missing_fixture_counts() {
        let doc = run("```python\nx = 1\n```\n");
        assert_eq!(doc.results.count_total, 1);
        assert_eq!(doc.results.count_missing, 1);
        assert_eq!(
            doc.error_report(),
            "Error: case 1: source code block 1 is not preceded by a docrun fixture\n\n"
        );
    }

    #[test]
    fn test_malformed_fixture_uses_current_case_number() {
        let doc = run("<!--\ndocrun:\n  pass: true\n-->\n```\nok\n```\n\n<!--\ndocrun:\n  bogus: 1\n-->\n");
        assert_eq!(doc.results.count_total, 1);
        assert_eq!(doc.results.count_success, 1);
        assert_eq!(doc.errors.len(), 1);
        assert_eq!(doc.errors[0].case, 1);
        assert!(matches!(doc.errors[0].error, DocrunError::Decode { .. }));
    }

    #[test]
    fn test_trailing_fixture_is_not_a_case() {
        let doc = run("<!--\ndocrun:\n  pass: true\n-->\n");
        assert!(doc.results.is_empty());
        assert!(!doc.has_errors());
    }
}
