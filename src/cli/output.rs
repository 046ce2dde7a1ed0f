//! User-facing output of the `run` subcommand: the error list, mismatch
//! diffs, and the coloured PASS/FAIL summary.

use std::io;

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::diagnostics::DocrunError;
use crate::results::DocumentRun;
use crate::sandbox::SandboxError;

pub fn stdout(use_colors: bool) -> StandardStream {
    let choice = if use_colors {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

/// Prints the errors of a run, then its summary. With `show_diffs`, each
/// mismatch is followed by a word diff of expected against actual.
pub fn print_run<W: WriteColor>(out: &mut W, run: &DocumentRun, show_diffs: bool) -> io::Result<()> {
    for case_error in &run.errors {
        write!(out, "Error: {}\n\n", case_error)?;
        if !show_diffs {
            continue;
        }
        if let DocrunError::Sandbox(SandboxError::Mismatch { actual, expect }) = &case_error.error {
            let changeset = Changeset::new(expect, actual, " ");
            print_diff(out, &changeset.diffs)?;
            writeln!(out)?;
        }
    }

    let [pass, fail] = run.results.summary_lines();
    out.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
    write!(out, "{}", pass)?;
    out.reset()?;
    writeln!(out)?;

    let colour = if run.results.failures() == 0 {
        Color::Green
    } else {
        Color::Red
    };
    out.set_color(ColorSpec::new().set_fg(Some(colour)).set_bold(true))?;
    write!(out, "{}", fail)?;
    out.reset()?;
    writeln!(out)
}

fn print_diff<W: WriteColor>(out: &mut W, diffs: &[Difference]) -> io::Result<()> {
    write!(out, "  diff:")?;
    for diff in diffs {
        match diff {
            Difference::Same(x) => {
                out.reset()?;
                write!(out, " {}", x)?;
            }
            Difference::Add(x) => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
                write!(out, " +{}", x)?;
            }
            Difference::Rem(x) => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
                write!(out, " -{}", x)?;
            }
        }
    }
    out.reset()?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::err_msg;
    use crate::results::{CaseError, RunResults};
    use termcolor::NoColor;

    fn render(run: &DocumentRun, show_diffs: bool) -> String {
        let mut out = NoColor::new(Vec::new());
        print_run(&mut out, run, show_diffs).unwrap();
        String::from_utf8(out.into_inner()).unwrap()
    }

    #[test]
    fn test_errors_then_summary() {
        let run = DocumentRun {
            results: RunResults {
                count_total: 2,
                count_success: 1,
                count_trivial: 0,
                count_missing: 0,
            },
            errors: vec![CaseError {
                case: 2,
                error: err_msg!(Dispatch, "unknown code language ruby"),
            }],
        };
        assert_eq!(
            render(&run, false),
            "Error: case 2: unknown code language ruby\n\nPASS: 1 tests\nFAIL: 1\n"
        );
    }

    #[test]
    fn test_mismatch_diff() {
        let run = DocumentRun {
            results: RunResults {
                count_total: 1,
                ..RunResults::default()
            },
            errors: vec![CaseError {
                case: 1,
                error: DocrunError::Sandbox(SandboxError::Mismatch {
                    actual: "[1 2 3 4]".to_string(),
                    expect: "[1 2 3]".to_string(),
                }),
            }],
        };
        let text = render(&run, true);
        assert!(text.contains("  diff:"));
        assert!(text.contains(" -3]"));
        assert!(text.contains(" +3 4]"));
        assert!(!render(&run, false).contains("diff:"));
    }
}
