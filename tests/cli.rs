// Behaviour of the docrun binary.

mod common;

use assert_cmd::Command;
use common::{code, fixture, mixed_document, write, TRANSFORM_TEST};
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

fn docrun() -> Command {
    Command::cargo_bin("docrun").unwrap()
}

#[test]
fn run_prints_errors_then_summary() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("README.md");
    write(&path, &mixed_document());

    docrun()
        .arg("run")
        .arg(&path)
        .assert()
        .success()
        .stdout(
            "Error: case 3: source code block 3 is not preceded by a docrun fixture\n\n\
             PASS: 2 tests (1 trivial)\n\
             FAIL: 1 (1 missing)\n",
        );
}

#[test]
fn run_missing_file_exits_one() {
    docrun()
        .arg("run")
        .arg("no/such/file.md")
        .assert()
        .code(1)
        .stdout("File not found: \"no/such/file.md\"\n");
}

#[test]
fn verbose_run_logs_to_stderr_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("README.md");
    let mut markdown = fixture(TRANSFORM_TEST);
    markdown.push_str(&code(
        "python",
        "def transform(ds, ctx):\n  ds.set_body([\"1\", \"2\"])",
    ));
    write(&path, &markdown);

    docrun()
        .env_remove("RUST_LOG")
        .arg("-v")
        .arg("run")
        .arg(&path)
        .assert()
        .success()
        .stdout(contains("FAIL: 1").and(contains("diff:")))
        .stderr(contains("running Call").and(contains("FAIL").not()));
}

#[test]
fn report_prints_json_rows() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("manifest.txt"), "repo\n");
    write(&dir.path().join("repo/README.md"), &mixed_document());

    docrun()
        .current_dir(dir.path())
        .arg("report")
        .assert()
        .success()
        .stdout(
            contains("\"Path\": \"repo/README.md\"")
                .and(contains("\"SuccessOther\": 1"))
                .and(contains("\"FailureMissing\": 1")),
        );
}

#[test]
fn report_without_manifest_renders_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    docrun()
        .current_dir(dir.path())
        .arg("report")
        .assert()
        .code(1)
        .stderr(contains("docrun::io").and(contains("manifest.txt")));
}
