//! Per-document result counters and the error list.

use std::fmt;

use crate::diagnostics::DocrunError;

/// Case counters for one document. Every counter only ever grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunResults {
    pub count_total: usize,
    pub count_success: usize,
    pub count_trivial: usize,
    pub count_missing: usize,
}

impl RunResults {
    /// Opens a new case and returns its number.
    pub fn open_case(&mut self) -> usize {
        self.count_total += 1;
        self.count_total
    }

    pub fn add_success(&mut self, trivial: bool) {
        self.count_success += 1;
        if trivial {
            self.count_trivial += 1;
        }
    }

    pub fn add_missing(&mut self) {
        self.count_missing += 1;
    }

    pub fn failures(&self) -> usize {
        self.count_total - self.count_success
    }

    pub fn is_empty(&self) -> bool {
        self.count_total == 0
    }

    /// The `PASS:` and `FAIL:` summary lines.
    ///
    /// ```
    /// use docrun::results::RunResults;
    ///
    /// let results = RunResults { count_total: 4, count_success: 3, count_trivial: 1, count_missing: 1 };
    /// assert_eq!(results.summary_lines(), ["PASS: 3 tests (1 trivial)", "FAIL: 1 (1 missing)"]);
    /// ```
    pub fn summary_lines(&self) -> [String; 2] {
        let pass = if self.count_trivial == 0 {
            format!("PASS: {} tests", self.count_success)
        } else {
            format!(
                "PASS: {} tests ({} trivial)",
                self.count_success, self.count_trivial
            )
        };
        let fail = if self.count_missing == 0 {
            format!("FAIL: {}", self.failures())
        } else {
            format!("FAIL: {} ({} missing)", self.failures(), self.count_missing)
        };
        [pass, fail]
    }
}

/// An error recorded against the case that was open when it happened.
#[derive(Debug)]
pub struct CaseError {
    pub case: usize,
    pub error: DocrunError,
}

impl fmt::Display for CaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "case {}: {}", self.case, self.error)
    }
}

/// Everything a document run produced.
#[derive(Debug, Default)]
pub struct DocumentRun {
    pub results: RunResults,
    pub errors: Vec<CaseError>,
}

impl DocumentRun {
    /// The error list as printed before the summary.
    pub fn error_report(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("Error: {}\n\n", e))
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::err_msg;

    #[test]
    fn test_summary_without_optional_clauses() {
        let mut results = RunResults::default();
        results.open_case();
        results.add_success(false);
        results.open_case();
        assert_eq!(results.summary_lines(), ["PASS: 1 tests", "FAIL: 1"]);
    }

    #[test]
    fn test_summary_with_trivial_and_missing() {
        let mut results = RunResults::default();
        for _ in 0..3 {
            results.open_case();
        }
        results.add_success(true);
        results.add_missing();
        assert_eq!(
            results.summary_lines(),
            ["PASS: 1 tests (1 trivial)", "FAIL: 2 (1 missing)"]
        );
    }

    #[test]
    fn test_error_report_format() {
        let run = DocumentRun {
            results: RunResults::default(),
            errors: vec![
                CaseError {
                    case: 1,
                    error: err_msg!(Dispatch, "unknown code language ruby"),
                },
                CaseError {
                    case: 3,
                    error: err_msg!(Decode, "bad"),
                },
            ],
        };
        assert_eq!(
            run.error_report(),
            "Error: case 1: unknown code language ruby\n\nError: case 3: bad\n\n"
        );
    }
}
