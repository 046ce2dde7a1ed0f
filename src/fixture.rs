//! Fixture metadata: the declarative test description that precedes a code block.
//!
//! A fixture is written as YAML inside an HTML comment:
//!
//! ```text
//! <!--
//! docrun:
//!   test:
//!     call: transform(ds, ctx)
//!     actual: ds.get_body()
//!     expect: ["1", "2", "3"]
//! -->
//! ```
//!
//! Decoding first reads a raw shape mirroring the YAML, then validates it into
//! a [`Fixture`] whose [`FixtureMode`] names exactly one way of running the
//! following block.

use serde::{Deserialize, Serialize};

use crate::diagnostics::DocrunError;
use crate::err_msg;

// ============================================================================
// DATA MODEL
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    pub mode: FixtureMode,
    pub lang: Option<String>,
    pub save: Option<SaveDirective>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FixtureMode {
    /// Succeed trivially without looking at the block.
    Pass,
    /// Check that the block decodes under a named schema.
    FillType(String),
    /// Run the block in the sandbox and compare results.
    Test(TestCase),
    /// Run the block as an external command.
    Command(CommandCase),
    /// No assertion; the block is only annotated.
    PassThrough,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestCase {
    #[serde(default, rename = "webProxy", alias = "webproxy")]
    pub web_proxy: Option<ProxyMock>,
    #[serde(default)]
    pub setup: String,
    #[serde(default)]
    pub call: String,
    #[serde(default)]
    pub actual: String,
    #[serde(default)]
    pub expect: serde_json::Value,
}

/// Canned response for the mocked network capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyMock {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub response: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandCase {
    #[serde(rename = "snapshotid", alias = "snapshotId")]
    pub snapshot_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveDirective {
    pub filename: String,
    #[serde(default)]
    pub append: bool,
}

// ============================================================================
// DECODING
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    docrun: Option<RawFixture>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFixture {
    #[serde(default)]
    pass: bool,
    test: Option<TestCase>,
    command: Option<CommandCase>,
    filltype: Option<String>,
    lang: Option<String>,
    save: Option<SaveDirective>,
}

/// Decodes the text of a metadata comment (starting at `docrun:`) into a fixture.
pub fn decode(text: &str) -> Result<Fixture, DocrunError> {
    let raw: RawDocument =
        serde_yaml::from_str(text).map_err(|e| err_msg!(Decode, "decoding fixture: {}", e))?;
    let raw = raw.docrun.unwrap_or_default();
    let filltype = raw.filltype.filter(|f| !f.is_empty());

    let mut declared = Vec::new();
    if raw.pass {
        declared.push("pass");
    }
    if filltype.is_some() {
        declared.push("filltype");
    }
    if raw.test.is_some() {
        declared.push("test");
    }
    if raw.command.is_some() {
        declared.push("command");
    }
    if declared.len() > 1 {
        return Err(err_msg!(
            Decode,
            "fixture declares more than one mode: {}",
            declared.join(", ")
        ));
    }

    let mode = if raw.pass {
        FixtureMode::Pass
    } else if let Some(kind) = filltype {
        FixtureMode::FillType(kind)
    } else if let Some(test) = raw.test {
        if test.call.trim().is_empty() {
            return Err(err_msg!(Decode, "test fixture has no call"));
        }
        FixtureMode::Test(test)
    } else if let Some(command) = raw.command {
        FixtureMode::Command(command)
    } else {
        FixtureMode::PassThrough
    };

    Ok(Fixture {
        mode,
        lang: raw.lang.filter(|l| !l.is_empty()),
        save: raw.save,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_test_case() {
        let fixture = decode(
            "docrun:\n  test:\n    call: transform(ds, ctx)\n    actual: ds.get_body()\n    expect: [\"1\", \"2\", \"3\"]\n",
        )
        .unwrap();
        let FixtureMode::Test(test) = fixture.mode else {
            panic!("expected test mode");
        };
        assert_eq!(test.call, "transform(ds, ctx)");
        assert_eq!(test.actual, "ds.get_body()");
        assert_eq!(test.expect, serde_json::json!(["1", "2", "3"]));
        assert!(test.web_proxy.is_none());
    }

    #[test]
    fn test_decode_pass_and_bare() {
        assert_eq!(decode("docrun:\n  pass: true").unwrap().mode, FixtureMode::Pass);
        assert_eq!(decode("docrun:").unwrap().mode, FixtureMode::PassThrough);
    }

    #[test]
    fn test_decode_web_proxy_both_spellings() {
        for key in ["webProxy", "webproxy"] {
            let text = format!(
                "docrun:\n  test:\n    {}:\n      url: https://example.com\n      response: {{\"a\": 1}}\n    call: f()\n",
                key
            );
            let FixtureMode::Test(test) = decode(&text).unwrap().mode else {
                panic!("expected test mode");
            };
            let proxy = test.web_proxy.unwrap();
            assert_eq!(proxy.url, "https://example.com");
            assert_eq!(proxy.response, serde_json::json!({"a": 1}));
        }
    }

    #[test]
    fn test_decode_command_save_and_lang() {
        let fixture = decode(
            "docrun:\n  command:\n    snapshotId: abc\n  lang: shell\n  save:\n    filename: out.sh\n    append: true\n",
        )
        .unwrap();
        assert_eq!(
            fixture.mode,
            FixtureMode::Command(CommandCase {
                snapshot_id: "abc".to_string()
            })
        );
        assert_eq!(fixture.lang.as_deref(), Some("shell"));
        assert_eq!(
            fixture.save,
            Some(SaveDirective {
                filename: "out.sh".to_string(),
                append: true
            })
        );
    }

    #[test]
    fn test_more_than_one_mode_rejected() {
        let err = decode("docrun:\n  pass: true\n  filltype: json\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "fixture declares more than one mode: pass, filltype"
        );
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = decode("docrun:\n  tset:\n    call: f()\n").unwrap_err();
        assert!(matches!(err, DocrunError::Decode { .. }));
    }

    #[test]
    fn test_empty_call_rejected() {
        let err = decode("docrun:\n  test:\n    actual: x\n").unwrap_err();
        assert_eq!(err.to_string(), "test fixture has no call");
    }
}
