//! Shared helpers for building markdown documents in integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

/// A `docrun` fixture comment wrapping the given YAML body.
pub fn fixture(yaml: &str) -> String {
    let body: String = yaml.lines().map(|line| format!("  {}\n", line)).collect();
    format!("<!--\ndocrun:\n{}-->\n", body)
}

/// A fenced code block.
pub fn code(lang: &str, source: &str) -> String {
    format!("```{}\n{}\n```\n\n", lang, source.trim_end())
}

pub const TRANSFORM_PASSES: &str = "def transform(ds, ctx):\n  ds.set_body([\"1\", \"2\", \"3\"])";
pub const TRANSFORM_TEST: &str =
    "test:\n  call: transform(ds, ctx)\n  actual: ds.get_body()\n  expect: [\"1\", \"2\", \"3\"]";

/// A document with one passing scripted case, one trivial pass and one block
/// without a fixture.
pub fn mixed_document() -> String {
    let mut doc = String::from("# Transforms\n\nSome prose.\n\n");
    doc.push_str(&fixture(TRANSFORM_TEST));
    doc.push_str(&code("python", TRANSFORM_PASSES));
    doc.push_str(&fixture("pass: true"));
    doc.push_str(&code("python", "this is not even code"));
    doc.push_str(&code("shell", "echo orphan"));
    doc
}

pub fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}
