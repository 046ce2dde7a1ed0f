//! Capability modules available to scripted cases through `load()`.
//!
//! Examples never touch the network or a real repository. Each capability is
//! resolved by a [`CapabilityProvider`]; the default provider hands out
//! deterministic stand-ins.

use indexmap::IndexMap;
use tracing::debug;

use super::clock::time_module;
use crate::fixture::ProxyMock;
use crate::script::{Args, Module, ModuleLoader, ScriptError, Value};
use crate::script_err;

/// Resolves a capability module by name for one test case.
pub trait CapabilityProvider {
    fn resolve(&self, module: &str, proxy: Option<&ProxyMock>) -> Result<Module, ScriptError>;
}

/// Deterministic stand-ins for `http.star`, `qri.star` and `time.star`.
#[derive(Debug, Clone, Default)]
pub struct MockCapabilities;

/// References returned by the mocked `list_datasets`.
pub const MOCK_DATASETS: [&str; 2] = [
    "test/ds_1@QmExample/ipfs/QmExample",
    "test/ds_2@QmSample/ipfs/QmSample",
];

const HTTP_METHODS: [&str; 5] = ["get", "post", "put", "delete", "patch"];

impl CapabilityProvider for MockCapabilities {
    fn resolve(&self, module: &str, proxy: Option<&ProxyMock>) -> Result<Module, ScriptError> {
        match module {
            "http.star" => Ok(http_module(proxy.cloned())),
            "qri.star" => Ok(qri_module()),
            "time.star" => Ok(time_module()),
            other => script_err!("module not defined: \"{}\"", other),
        }
    }
}

fn http_module(proxy: Option<ProxyMock>) -> Module {
    let mut methods = IndexMap::new();
    for method in HTTP_METHODS {
        let proxy = proxy.clone();
        methods.insert(
            method.to_string(),
            Value::builtin(method, move |_, args| http_call(method, proxy.as_ref(), args)),
        );
    }
    let mut module = Module::new();
    module.insert("http".to_string(), Value::structure("struct", methods));
    module
}

fn http_call(method: &str, proxy: Option<&ProxyMock>, mut args: Args) -> Result<Value, ScriptError> {
    let Some(proxy) = proxy else {
        return script_err!("cannot use network capability without a configured mock");
    };
    // Request options are accepted and ignored; the mock answers every request.
    for key in ["params", "headers", "body", "form_body", "json_body", "auth"] {
        args.take_named(key);
    }
    args.check(method, 0, 1)?;
    let url = match args.get(0) {
        Some(Value::Str(url)) => url.clone(),
        _ => proxy.url.clone(),
    };
    debug!(method, url = %url, "answering request from mock");
    Ok(response_value(&url, &proxy.response))
}

fn response_value(url: &str, response: &serde_json::Value) -> Value {
    let body = match response {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    let mut fields = IndexMap::new();
    fields.insert("url".to_string(), Value::from(url));
    fields.insert("status_code".to_string(), Value::Int(200));
    fields.insert("headers".to_string(), Value::dict(IndexMap::new()));
    fields.insert("encoding".to_string(), Value::from(""));

    let text = body;
    fields.insert(
        "body".to_string(),
        Value::builtin("body", move |_, args| {
            args.check("body", 0, 0)?;
            Ok(Value::Str(text.clone()))
        }),
    );
    let data = response.clone();
    fields.insert(
        "json".to_string(),
        Value::builtin("json", move |_, args| {
            args.check("json", 0, 0)?;
            Ok(match &data {
                serde_json::Value::String(text) => match serde_json::from_str(text) {
                    Ok(parsed) => Value::from_json(&parsed),
                    Err(_) => Value::Str(text.clone()),
                },
                other => Value::from_json(other),
            })
        }),
    );
    Value::structure("response", fields)
}

fn qri_module() -> Module {
    let list_datasets = Value::builtin("list_datasets", |_, args| {
        args.check("list_datasets", 0, 0)?;
        Ok(Value::list(
            MOCK_DATASETS.iter().map(|r| Value::from(*r)).collect(),
        ))
    });
    let mut fields = IndexMap::new();
    fields.insert("list_datasets".to_string(), list_datasets);

    let mut module = Module::new();
    module.insert("qri".to_string(), Value::structure("struct", fields));
    module
}

/// Module loader for a single case: a provider plus the case's proxy mock.
pub struct CaseLoader<'a> {
    provider: &'a dyn CapabilityProvider,
    proxy: Option<&'a ProxyMock>,
}

impl<'a> CaseLoader<'a> {
    pub fn new(provider: &'a dyn CapabilityProvider, proxy: Option<&'a ProxyMock>) -> Self {
        Self { provider, proxy }
    }
}

impl ModuleLoader for CaseLoader<'_> {
    fn load(&self, module: &str) -> Result<Module, ScriptError> {
        debug!(module, "loading capability");
        self.provider.resolve(module, self.proxy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{Env, Interpreter};

    fn run(source: &str, proxy: Option<&ProxyMock>) -> Result<Env, ScriptError> {
        let loader = CaseLoader::new(&MockCapabilities, proxy);
        let mut out = Vec::new();
        Interpreter::new(&loader, &mut out).exec_file(source, Env::new())
    }

    fn proxy(response: serde_json::Value) -> ProxyMock {
        ProxyMock {
            url: "https://api.example.com/data".to_string(),
            response,
        }
    }

    #[test]
    fn test_http_without_mock_fails_on_use() {
        let env = run("load(\"http.star\", \"http\")", None).unwrap();
        assert!(env.get("http").is_some());
        let err = run("load(\"http.star\", \"http\")\nhttp.get(\"https://x\")", None).unwrap_err();
        assert!(err
            .message
            .contains("cannot use network capability without a configured mock"));
    }

    #[test]
    fn test_http_mock_response() {
        let mock = proxy(serde_json::json!({"rows": [1, 2]}));
        let env = run(
            "load(\"http.star\", \"http\")\nres = http.get(\"https://api.example.com/data\")\nrows = res.json()[\"rows\"]\ntext = res.body()\ncode = res.status_code",
            Some(&mock),
        )
        .unwrap();
        assert_eq!(env.get("rows").map(Value::repr).as_deref(), Some("[1, 2]"));
        assert_eq!(
            env.get("text").and_then(Value::as_str),
            Some("{\"rows\":[1,2]}")
        );
        assert_eq!(env.get("code").and_then(Value::as_int), Some(200));
    }

    #[test]
    fn test_http_string_response_is_raw() {
        let mock = proxy(serde_json::json!("a,b\n1,2"));
        let env = run(
            "load(\"http.star\", \"http\")\ntext = http.post(\"u\", json_body={}).body()",
            Some(&mock),
        )
        .unwrap();
        assert_eq!(env.get("text").and_then(Value::as_str), Some("a,b\n1,2"));
    }

    #[test]
    fn test_qri_lists_fixed_datasets() {
        let env = run("load(\"qri.star\", \"qri\")\nrefs = qri.list_datasets()", None).unwrap();
        assert_eq!(
            env.get("refs").map(Value::repr).as_deref(),
            Some("[\"test/ds_1@QmExample/ipfs/QmExample\", \"test/ds_2@QmSample/ipfs/QmSample\"]")
        );
    }

    #[test]
    fn test_time_is_deterministic() {
        let env = run(
            "load(\"time.star\", \"time\")\nnow = time.now()\nyear = now.year\nstamp = now.format()\nday = time.parse_time(\"2019-03-04\", format=\"2006-01-02\").format(\"Jan 2, 2006\")\nepoch = time.from_timestamp(86400).day\nbuilt = time.time(year=2020, month=2, day=29).unix",
            None,
        )
        .unwrap();
        assert_eq!(env.get("year").and_then(Value::as_int), Some(2009));
        assert_eq!(
            env.get("stamp").and_then(Value::as_str),
            Some("2009-11-10T23:00:00Z")
        );
        assert_eq!(env.get("day").and_then(Value::as_str), Some("Mar 4, 2019"));
        assert_eq!(env.get("epoch").and_then(Value::as_int), Some(2));
        assert_eq!(env.get("built").and_then(Value::as_int), Some(1582934400));

        let err = run("load(\"time.star\", \"time\")\ntime.time(month=13)", None).unwrap_err();
        assert!(err.message.contains("time: invalid date or time"));
    }

    #[test]
    fn test_unknown_module() {
        let err = run("load(\"fs.star\", \"fs\")", None).unwrap_err();
        assert!(err.message.contains("module not defined: \"fs.star\""));
        let err = run("load(\"html.star\", \"html\")", None).unwrap_err();
        assert!(err.message.contains("module not defined: \"html.star\""));
    }
}
