//! Filltype validation: checks that a code block decodes under a named schema
//! without running it.
//!
//! Two kinds are known: `json`, a generic record that must be a JSON object,
//! and `dataset.Dataset`, a dataset descriptor written in YAML.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::diagnostics::DocrunError;
use crate::err_msg;

pub const JSON_RECORD: &str = "json";
pub const DATASET: &str = "dataset.Dataset";

/// Validates `code` under the schema named `kind`.
pub fn validate(kind: &str, code: &str) -> Result<(), DocrunError> {
    match kind {
        JSON_RECORD => serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(code)
            .map(drop)
            .map_err(|e| err_msg!(Dispatch, "decoding {}: {}", kind, e)),
        DATASET => serde_yaml::from_str::<Dataset>(code)
            .map(drop)
            .map_err(|e| err_msg!(Dispatch, "decoding {}: {}", kind, e)),
        other => Err(err_msg!(Dispatch, "unknown filltype {}", other)),
    }
}

// ============================================================================
// DATASET DESCRIPTOR
// ============================================================================

/// A dataset descriptor. Only the shape is checked; components that are not
/// modelled field by field are kept as raw YAML.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Dataset {
    pub qri: Option<String>,
    pub peername: Option<String>,
    pub name: Option<String>,
    pub path: Option<String>,
    #[serde(rename = "profileID")]
    pub profile_id: Option<String>,
    #[serde(rename = "numVersions")]
    pub num_versions: Option<u64>,
    #[serde(rename = "bodyPath")]
    pub body_path: Option<String>,
    #[serde(rename = "previousPath")]
    pub previous_path: Option<String>,
    pub body: Option<serde_yaml::Value>,
    pub meta: Option<Meta>,
    pub structure: Option<Structure>,
    pub commit: Option<Commit>,
    pub transform: Option<serde_yaml::Value>,
    pub readme: Option<serde_yaml::Value>,
    pub viz: Option<serde_yaml::Value>,
    pub stats: Option<serde_yaml::Value>,
}

/// Descriptive metadata; keys beyond the standard ones are kept in `extra`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Meta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<Vec<String>>,
    #[serde(rename = "homeURL")]
    pub home_url: Option<String>,
    pub license: Option<serde_yaml::Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Structure {
    pub qri: Option<String>,
    pub path: Option<String>,
    pub format: Option<String>,
    #[serde(rename = "formatConfig")]
    pub format_config: Option<serde_yaml::Mapping>,
    pub schema: Option<serde_yaml::Value>,
    pub depth: Option<u64>,
    pub entries: Option<u64>,
    pub length: Option<u64>,
    #[serde(rename = "errCount")]
    pub err_count: Option<u64>,
    pub encoding: Option<String>,
    pub compression: Option<String>,
    pub checksum: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Commit {
    pub qri: Option<String>,
    pub path: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub timestamp: Option<String>,
    pub author: Option<serde_yaml::Value>,
    pub signature: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_record() {
        assert!(validate("json", r#"{"a": 1, "b": [true]}"#).is_ok());
        let err = validate("json", "[1, 2]").unwrap_err();
        assert!(matches!(err, DocrunError::Dispatch { .. }));
        assert!(err.to_string().starts_with("decoding json: "));
        assert!(validate("json", "{not json").is_err());
    }

    #[test]
    fn test_dataset_descriptor() {
        let code = "peername: me\nname: population\nmeta:\n  title: World Population\n  theme: demographics\nstructure:\n  format: csv\n  schema:\n    type: array\n";
        assert!(validate("dataset.Dataset", code).is_ok());
    }

    #[test]
    fn test_dataset_rejects_unknown_fields() {
        let err = validate("dataset.Dataset", "name: x\nbodyfile: data.csv\n").unwrap_err();
        assert!(err.to_string().contains("bodyfile"));
        assert!(validate("dataset.Dataset", "structure:\n  fromat: csv\n").is_err());
    }

    #[test]
    fn test_unknown_filltype() {
        let err = validate("toml", "a = 1").unwrap_err();
        assert_eq!(err.to_string(), "unknown filltype toml");
    }
}
