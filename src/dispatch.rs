//! Case dispatch: picks the one way a fixture says to run its source block.
//!
//! | mode        | language | runs                         | trivial |
//! |-------------|----------|------------------------------|---------|
//! | `pass`      | skipped  | nothing                      | yes     |
//! | `filltype`  | required | schema decode of the block   | yes     |
//! | `test`      | `python` | the sandbox script runner    | no      |
//! | `command`   | `shell`  | the external-command runner  | no      |
//! | none        | required | nothing                      | yes     |
//!
//! A save directive is honoured after every case, whatever its outcome.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::command::CommandRunner;
use crate::config::RunConfig;
use crate::diagnostics::DocrunError;
use crate::document::SourceBlock;
use crate::err_msg;
use crate::filltype;
use crate::fixture::{Fixture, FixtureMode, SaveDirective};
use crate::sandbox::SandboxRunner;

pub const SCRIPT_LANGUAGE: &str = "python";
pub const COMMAND_LANGUAGE: &str = "shell";

/// Result of dispatching one case.
#[derive(Debug)]
pub struct Outcome {
    pub success: bool,
    /// Succeeded without a real assertion.
    pub trivial: bool,
    pub error: Option<DocrunError>,
    /// Writing the save directive failed; does not affect `success`.
    pub save_error: Option<DocrunError>,
}

impl Outcome {
    fn passed(trivial: bool) -> Self {
        Self {
            success: true,
            trivial,
            error: None,
            save_error: None,
        }
    }

    fn failed(error: DocrunError) -> Self {
        Self {
            success: false,
            trivial: false,
            error: Some(error),
            save_error: None,
        }
    }

    fn from_result(result: Result<(), DocrunError>, trivial: bool) -> Self {
        match result {
            Ok(()) => Self::passed(trivial),
            Err(err) => Self::failed(err),
        }
    }
}

pub struct Dispatcher {
    sandbox: SandboxRunner,
    commands: CommandRunner,
    /// Directory that relative save filenames resolve against.
    base_dir: PathBuf,
}

impl Dispatcher {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            sandbox: SandboxRunner::new(config),
            commands: CommandRunner::new(config),
            base_dir: PathBuf::new(),
        }
    }

    pub fn with_sandbox(mut self, sandbox: SandboxRunner) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Runs the case numbered `case` and reports its outcome.
    pub fn dispatch(&self, fixture: &Fixture, source: &SourceBlock, case: usize) -> Outcome {
        let mut outcome = self.run_mode(fixture, source, case);
        if let Some(save) = &fixture.save {
            if let Err(err) = self.save_source(save, &source.code) {
                warn!(case, error = %err, "could not save source");
                outcome.save_error = Some(err);
            }
        }
        outcome
    }

    fn run_mode(&self, fixture: &Fixture, source: &SourceBlock, case: usize) -> Outcome {
        if fixture.mode == FixtureMode::Pass {
            debug!(case, "trivial pass");
            return Outcome::passed(true);
        }
        let lang = match resolve_language(source, fixture, case) {
            Ok(lang) => lang,
            Err(err) => return Outcome::failed(err),
        };
        debug!(case, lang, "dispatching");

        match &fixture.mode {
            FixtureMode::Pass | FixtureMode::PassThrough => Outcome::passed(true),
            FixtureMode::FillType(kind) => {
                Outcome::from_result(filltype::validate(kind, &source.code), true)
            }
            FixtureMode::Test(test) => {
                let result = match lang {
                    SCRIPT_LANGUAGE => self
                        .sandbox
                        .run(test, &source.code)
                        .map_err(DocrunError::from),
                    other => Err(err_msg!(Dispatch, "unknown code language {}", other)),
                };
                Outcome::from_result(result, false)
            }
            FixtureMode::Command(command) => {
                let result = match lang {
                    COMMAND_LANGUAGE => self.commands.run(command, &source.code),
                    other => Err(err_msg!(Dispatch, "unknown code language {}", other)),
                };
                Outcome::from_result(result, false)
            }
        }
    }

    fn save_source(&self, save: &SaveDirective, code: &str) -> Result<(), DocrunError> {
        let path = self.base_dir.join(&save.filename);
        debug!(path = %path.display(), append = save.append, "saving source");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(save.append)
            .truncate(!save.append)
            .open(&path)
            .map_err(|e| DocrunError::io(&path, e))?;
        file.write_all(code.as_bytes())
            .map_err(|e| DocrunError::io(&path, e))
    }
}

/// The block's own language tag wins over the fixture's `lang`.
pub fn resolve_language<'a>(
    source: &'a SourceBlock,
    fixture: &'a Fixture,
    case: usize,
) -> Result<&'a str, DocrunError> {
    source
        .lang
        .as_deref()
        .or(fixture.lang.as_deref())
        .ok_or_else(|| err_msg!(Dispatch, "source code block {} has no language", case))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{CommandCase, TestCase};

    fn fixture(mode: FixtureMode) -> Fixture {
        Fixture {
            mode,
            lang: None,
            save: None,
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(&RunConfig::default())
    }

    #[test]
    fn test_pass_skips_language() {
        let outcome = dispatcher().dispatch(
            &fixture(FixtureMode::Pass),
            &SourceBlock::new("anything", None),
            1,
        );
        assert!(outcome.success && outcome.trivial);
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_language_resolution() {
        let mut f = fixture(FixtureMode::PassThrough);
        f.lang = Some("shell".to_string());
        let tagged = SourceBlock::new("", Some("python"));
        let untagged = SourceBlock::new("", None);
        assert_eq!(resolve_language(&tagged, &f, 1).unwrap(), "python");
        assert_eq!(resolve_language(&untagged, &f, 1).unwrap(), "shell");

        let bare = fixture(FixtureMode::PassThrough);
        let err = resolve_language(&untagged, &bare, 4).unwrap_err();
        assert_eq!(err.to_string(), "source code block 4 has no language");
    }

    #[test]
    fn test_missing_language_fails_non_pass_modes() {
        let outcome = dispatcher().dispatch(
            &fixture(FixtureMode::PassThrough),
            &SourceBlock::new("x", None),
            2,
        );
        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(DocrunError::Dispatch { .. })));
    }

    #[test]
    fn test_filltype_is_trivial() {
        let outcome = dispatcher().dispatch(
            &fixture(FixtureMode::FillType("json".to_string())),
            &SourceBlock::new("{\"a\": 1}", Some("json")),
            1,
        );
        assert!(outcome.success && outcome.trivial);
    }

    #[test]
    fn test_unknown_languages() {
        let test = fixture(FixtureMode::Test(TestCase {
            web_proxy: None,
            setup: String::new(),
            call: "f()".to_string(),
            actual: String::new(),
            expect: serde_json::Value::Null,
        }));
        let outcome = dispatcher().dispatch(&test, &SourceBlock::new("", Some("ruby")), 1);
        assert_eq!(
            outcome.error.map(|e| e.to_string()).as_deref(),
            Some("unknown code language ruby")
        );

        let command = fixture(FixtureMode::Command(CommandCase {
            snapshot_id: "s".to_string(),
        }));
        let outcome = dispatcher().dispatch(&command, &SourceBlock::new("ls", Some("python")), 1);
        assert_eq!(
            outcome.error.map(|e| e.to_string()).as_deref(),
            Some("unknown code language python")
        );
    }

    #[test]
    fn test_scripted_success_is_not_trivial() {
        let test = fixture(FixtureMode::Test(TestCase {
            web_proxy: None,
            setup: String::new(),
            call: "f()".to_string(),
            actual: "result".to_string(),
            expect: serde_json::json!(2),
        }));
        let outcome = dispatcher().dispatch(
            &test,
            &SourceBlock::new("def f():\n  return 2\n", Some("python")),
            1,
        );
        assert!(outcome.success);
        assert!(!outcome.trivial);
    }

    #[test]
    fn test_save_overwrites_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher().with_base_dir(dir.path());
        let mut f = fixture(FixtureMode::Pass);
        f.save = Some(SaveDirective {
            filename: "out.txt".to_string(),
            append: false,
        });
        d.dispatch(&f, &SourceBlock::new("one\n", None), 1);
        d.dispatch(&f, &SourceBlock::new("two\n", None), 2);
        f.save = Some(SaveDirective {
            filename: "out.txt".to_string(),
            append: true,
        });
        d.dispatch(&f, &SourceBlock::new("three\n", None), 3);
        let saved = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(saved, "two\nthree\n");
    }

    #[test]
    fn test_save_failure_keeps_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher().with_base_dir(dir.path().join("missing"));
        let mut f = fixture(FixtureMode::Pass);
        f.save = Some(SaveDirective {
            filename: "out.txt".to_string(),
            append: false,
        });
        let outcome = d.dispatch(&f, &SourceBlock::new("x", None), 1);
        assert!(outcome.success);
        assert!(matches!(outcome.save_error, Some(DocrunError::Io { .. })));
    }
}
