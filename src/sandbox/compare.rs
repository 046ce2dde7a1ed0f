//! Comparison of an actual value against the expected one.
//!
//! Text comparison renders both sides canonically and compares the strings,
//! so `4` and `"4"` are equal. Structural comparison compares the decoded
//! data, treating every number as a float.

use serde_json::Value as Json;

use super::SandboxError;
use crate::config::Comparison;

/// Canonical text of a data value.
///
/// ```
/// use docrun::sandbox::canonical_text;
/// use serde_json::json;
///
/// assert_eq!(canonical_text(&json!(["1", 2, 3.5])), "[1 2 3.5]");
/// assert_eq!(canonical_text(&json!({"b": true, "a": null})), "map[a:null b:true]");
/// ```
pub fn canonical_text(value: &Json) -> String {
    match value {
        Json::Null => "null".to_string(),
        Json::Bool(b) => b.to_string(),
        Json::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(x)) if x.fract() == 0.0 && x.abs() < 1e15 => format!("{}", x as i64),
            (_, _, Some(x)) => x.to_string(),
            _ => n.to_string(),
        },
        Json::String(s) => s.clone(),
        Json::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonical_text).collect();
            format!("[{}]", parts.join(" "))
        }
        Json::Object(object) => {
            let mut entries: Vec<(&String, &Json)> = object.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let parts: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| format!("{}:{}", k, canonical_text(v)))
                .collect();
            format!("map[{}]", parts.join(" "))
        }
    }
}

pub fn compare(actual: &Json, expect: &Json, comparison: Comparison) -> Result<(), SandboxError> {
    let equal = match comparison {
        Comparison::Text => canonical_text(actual) == canonical_text(expect),
        Comparison::Structural => structurally_equal(actual, expect),
    };
    if equal {
        Ok(())
    } else {
        Err(SandboxError::Mismatch {
            actual: canonical_text(actual),
            expect: canonical_text(expect),
        })
    }
}

fn structurally_equal(a: &Json, b: &Json) -> bool {
    match (a, b) {
        (Json::Number(x), Json::Number(y)) => x.as_f64() == y.as_f64(),
        (Json::Array(xs), Json::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| structurally_equal(x, y))
        }
        (Json::Object(xs), Json::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| structurally_equal(x, y)))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_text_scalars() {
        assert_eq!(canonical_text(&json!("abc")), "abc");
        assert_eq!(canonical_text(&json!(4)), "4");
        assert_eq!(canonical_text(&json!(4.0)), "4");
        assert_eq!(canonical_text(&json!(1.25)), "1.25");
        assert_eq!(canonical_text(&json!(false)), "false");
        assert_eq!(canonical_text(&Json::Null), "null");
    }

    #[test]
    fn test_canonical_text_nested() {
        let value = json!({"rows": [[1, "a"], [2, "b"]], "name": "t"});
        assert_eq!(canonical_text(&value), "map[name:t rows:[[1 a] [2 b]]]");
    }

    #[test]
    fn test_text_comparison_ignores_quoting() {
        assert!(compare(&json!(["1", "2"]), &json!([1, 2]), Comparison::Text).is_ok());
        assert!(compare(&json!("4"), &json!(4), Comparison::Text).is_ok());
    }

    #[test]
    fn test_structural_comparison() {
        assert!(compare(&json!([1.0, 2]), &json!([1, 2]), Comparison::Structural).is_ok());
        assert!(compare(&json!("4"), &json!(4), Comparison::Structural).is_err());
        assert!(compare(
            &json!({"a": 1, "b": [true]}),
            &json!({"b": [true], "a": 1.0}),
            Comparison::Structural
        )
        .is_ok());
    }

    #[test]
    fn test_mismatch_message() {
        let err = compare(&json!([1, 2]), &json!([1, 2, 3]), Comparison::Text).unwrap_err();
        assert_eq!(
            err.to_string(),
            "test case failure\n  actual: [1 2]\n  expect: [1 2 3]"
        );
    }
}
