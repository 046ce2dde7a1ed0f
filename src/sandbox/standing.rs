//! The standing objects every scripted case sees: `ds` and `ctx`.
//!
//! Both are handles over shared state. `to_value` builds a fresh script struct
//! over that state, which is how the runner re-binds them before each phase.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::script::{Args, DictKey, ScriptError, Value};
use crate::script_err;

// ============================================================================
// DATASET
// ============================================================================

#[derive(Default)]
struct DatasetState {
    body: Option<Value>,
    meta: IndexMap<DictKey, Value>,
    structure: Option<Value>,
}

/// The dataset a transform example reads and writes.
#[derive(Clone, Default)]
pub struct DatasetHandle {
    state: Rc<RefCell<DatasetState>>,
}

impl DatasetHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(&self) -> Option<Value> {
        self.state.borrow().body.clone()
    }

    /// Script struct exposing the dataset methods.
    pub fn to_value(&self) -> Value {
        let mut fields = IndexMap::new();

        let state = self.state.clone();
        fields.insert(
            "get_body".to_string(),
            Value::builtin("get_body", move |_, args| {
                args.check("get_body", 0, 0)?;
                Ok(state.borrow().body.clone().unwrap_or(Value::None))
            }),
        );

        let state = self.state.clone();
        fields.insert(
            "set_body".to_string(),
            Value::builtin("set_body", move |_, args| {
                let body = decode_body(args)?;
                state.borrow_mut().body = Some(body);
                Ok(Value::None)
            }),
        );

        let state = self.state.clone();
        fields.insert(
            "get_meta".to_string(),
            Value::builtin("get_meta", move |_, args| {
                args.check("get_meta", 0, 0)?;
                Ok(Value::dict(state.borrow().meta.clone()))
            }),
        );

        let state = self.state.clone();
        fields.insert(
            "set_meta".to_string(),
            Value::builtin("set_meta", move |_, args| {
                args.check("set_meta", 2, 2)?;
                let key = args.str_at("set_meta", 0)?;
                state
                    .borrow_mut()
                    .meta
                    .insert(DictKey::Str(key), args.positional[1].clone());
                Ok(Value::None)
            }),
        );

        let state = self.state.clone();
        fields.insert(
            "get_structure".to_string(),
            Value::builtin("get_structure", move |_, args| {
                args.check("get_structure", 0, 0)?;
                Ok(state.borrow().structure.clone().unwrap_or(Value::None))
            }),
        );

        let state = self.state.clone();
        fields.insert(
            "set_structure".to_string(),
            Value::builtin("set_structure", move |_, args| {
                args.check("set_structure", 1, 1)?;
                match &args.positional[0] {
                    structure @ Value::Dict(_) => {
                        state.borrow_mut().structure = Some(structure.clone());
                        Ok(Value::None)
                    }
                    other => script_err!(
                        "set_structure: expected a dict, got {}",
                        other.type_name()
                    ),
                }
            }),
        );

        Value::structure("dataset", fields)
    }
}

/// Body data must be iterable; `parse_as="json"` decodes a JSON string first.
fn decode_body(mut args: Args) -> Result<Value, ScriptError> {
    let parse_as = match args.take_named("parse_as") {
        Some(Value::Str(format)) => format,
        Some(Value::None) | None => String::new(),
        Some(other) => {
            return script_err!("set_body: parse_as must be a string, got {}", other.type_name())
        }
    };
    args.check("set_body", 1, 1)?;
    let data = args.positional.remove(0);
    let data = match (parse_as.as_str(), &data) {
        ("", _) => data,
        ("json", Value::Str(text)) => {
            let json: serde_json::Value = serde_json::from_str(text)
                .map_err(|e| ScriptError::new(format!("set_body: parsing json: {}", e)))?;
            Value::from_json(&json)
        }
        (format, _) => return script_err!("set_body: unsupported parse_as format {:?}", format),
    };
    if !data.is_iterable() {
        return script_err!("expected body data to be iterable");
    }
    Ok(data)
}

// ============================================================================
// CONTEXT
// ============================================================================

#[derive(Default)]
struct ContextState {
    results: IndexMap<String, Value>,
    config: IndexMap<String, String>,
    secrets: IndexMap<String, String>,
}

/// Transform context: named results such as `download`, plus config and secrets.
#[derive(Clone, Default)]
pub struct ContextHandle {
    state: Rc<RefCell<ContextState>>,
}

impl ContextHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: IndexMap<String, String>, secrets: IndexMap<String, String>) -> Self {
        let handle = Self::default();
        {
            let mut state = handle.state.borrow_mut();
            state.config = config;
            state.secrets = secrets;
        }
        handle
    }

    pub fn set_result(&self, name: &str, value: Value) {
        self.state
            .borrow_mut()
            .results
            .insert(name.to_string(), value);
    }

    pub fn result(&self, name: &str) -> Option<Value> {
        self.state.borrow().results.get(name).cloned()
    }

    /// Script struct exposing `get_config`, `get_secret` and every stored result.
    pub fn to_value(&self) -> Value {
        let mut fields = IndexMap::new();

        let state = self.state.clone();
        fields.insert(
            "get_config".to_string(),
            Value::builtin("get_config", move |_, args| {
                args.check("get_config", 1, 1)?;
                let name = args.str_at("get_config", 0)?;
                Ok(state
                    .borrow()
                    .config
                    .get(&name)
                    .map(|v| Value::Str(v.clone()))
                    .unwrap_or(Value::None))
            }),
        );

        let state = self.state.clone();
        fields.insert(
            "get_secret".to_string(),
            Value::builtin("get_secret", move |_, args| {
                args.check("get_secret", 1, 1)?;
                let name = args.str_at("get_secret", 0)?;
                Ok(state
                    .borrow()
                    .secrets
                    .get(&name)
                    .map(|v| Value::Str(v.clone()))
                    .unwrap_or(Value::None))
            }),
        );

        for (name, value) in self.state.borrow().results.iter() {
            fields.insert(name.clone(), value.clone());
        }

        Value::structure("context", fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{Env, Interpreter, NoModules};

    fn run(source: &str, ds: &DatasetHandle, ctx: &ContextHandle) -> Result<Env, ScriptError> {
        let env = Env::new()
            .update("ds".to_string(), ds.to_value())
            .update("ctx".to_string(), ctx.to_value());
        let mut out = Vec::new();
        Interpreter::new(&NoModules, &mut out).exec_file(source, env)
    }

    #[test]
    fn test_body_round_trip() {
        let ds = DatasetHandle::new();
        let env = run(
            "ds.set_body([1, 2])\nb = ds.get_body()",
            &ds,
            &ContextHandle::new(),
        )
        .unwrap();
        assert_eq!(env.get("b").map(Value::repr).as_deref(), Some("[1, 2]"));
        assert_eq!(ds.body().map(|b| b.repr()).as_deref(), Some("[1, 2]"));
    }

    #[test]
    fn test_body_must_be_iterable() {
        let err = run("ds.set_body(\"text\")", &DatasetHandle::new(), &ContextHandle::new())
            .unwrap_err();
        assert!(err.message.contains("expected body data to be iterable"));
    }

    #[test]
    fn test_body_parse_as_json() {
        let ds = DatasetHandle::new();
        run(
            "ds.set_body('[\"a\", 2]', parse_as=\"json\")",
            &ds,
            &ContextHandle::new(),
        )
        .unwrap();
        assert_eq!(ds.body().map(|b| b.repr()).as_deref(), Some("[\"a\", 2]"));
    }

    #[test]
    fn test_meta_and_structure() {
        let env = run(
            "ds.set_meta('title', 'x')\nm = ds.get_meta()\nds.set_structure({'format': 'csv'})\ns = ds.get_structure()",
            &DatasetHandle::new(),
            &ContextHandle::new(),
        )
        .unwrap();
        assert_eq!(env.get("m").map(Value::repr).as_deref(), Some("{\"title\": \"x\"}"));
        assert_eq!(env.get("s").map(Value::repr).as_deref(), Some("{\"format\": \"csv\"}"));
    }

    #[test]
    fn test_context_results_and_config() {
        let mut config = IndexMap::new();
        config.insert("region".to_string(), "eu".to_string());
        let ctx = ContextHandle::with_config(config, IndexMap::new());
        ctx.set_result("download", Value::list(vec![Value::from("test")]));
        let env = run(
            "d = ctx.download\nr = ctx.get_config('region')\ns = ctx.get_secret('key')",
            &DatasetHandle::new(),
            &ctx,
        )
        .unwrap();
        assert_eq!(env.get("d").map(Value::repr).as_deref(), Some("[\"test\"]"));
        assert_eq!(env.get("r").map(Value::repr).as_deref(), Some("\"eu\""));
        assert_eq!(env.get("s").map(Value::repr).as_deref(), Some("None"));
    }

    #[test]
    fn test_context_has_no_dataset_methods() {
        let err = run("ctx.set_body([1])", &DatasetHandle::new(), &ContextHandle::new())
            .unwrap_err();
        assert!(err
            .message
            .contains("\"context\" struct has no .set_body attribute"));
    }
}
