//! Phased execution of one scripted test case.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use super::capability::{CapabilityProvider, CaseLoader, MockCapabilities};
use super::capture::{CaptureSink, LogSink};
use super::compare::compare;
use super::standing::{ContextHandle, DatasetHandle};
use super::SandboxError;
use crate::config::{Comparison, RunConfig};
use crate::fixture::TestCase;
use crate::script::{eval_literal, Env, Interpreter, OutputSink, ScriptError, Value};

/// Actual expression that reads the output captured during Call.
pub const STDOUT_SENTINEL: &str = "stdout.get()";

/// Call prefix whose result also fills the context's download slot.
const DOWNLOAD_PREFIX: &str = "download";

static DOWNLOAD_SETUP: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)^\s*ctx\.download\s*=\s*(?P<value>\[.*\])\s*$").ok());

/// Runs test cases in the sandbox. One runner serves every case of a document;
/// each case gets fresh standing objects and a fresh capture sink.
pub struct SandboxRunner {
    capabilities: Box<dyn CapabilityProvider>,
    comparison: Comparison,
    max_depth: usize,
}

impl Default for SandboxRunner {
    fn default() -> Self {
        Self::new(&RunConfig::default())
    }
}

impl SandboxRunner {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            capabilities: Box::new(MockCapabilities),
            comparison: config.comparison,
            max_depth: config.max_depth,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Box<dyn CapabilityProvider>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn run(&self, test: &TestCase, source: &str) -> Result<(), SandboxError> {
        debug!("==============================");
        debug!(
            web_proxy = test.web_proxy.is_some(),
            setup = %test.setup,
            call = %test.call,
            actual = %test.actual,
            expect = %test.expect,
            "test case"
        );
        debug!(code = %source, "source");

        let loader = CaseLoader::new(self.capabilities.as_ref(), test.web_proxy.as_ref());
        let dataset = DatasetHandle::new();
        let context = ContextHandle::new();
        let mut env = Env::new();

        if !test.setup.trim().is_empty() {
            info!("running Setup...");
            if let Some(literal) = download_literal(&test.setup) {
                let value = eval_literal(literal).map_err(SandboxError::Setup)?;
                context.set_result(DOWNLOAD_PREFIX, value);
            } else {
                let bound = bind(env, &dataset, &context);
                env = self
                    .exec(&loader, &mut LogSink::new("setup"), &test.setup, bound)
                    .map_err(SandboxError::Setup)?;
            }
        }

        info!("running code block...");
        let bound = bind(env, &dataset, &context);
        env = self
            .exec(&loader, &mut LogSink::new("definition"), source, bound)
            .map_err(SandboxError::Definition)?;

        info!("running Call...");
        let call = test.call.trim();
        let mut capture = CaptureSink::new();
        let bound = bind(env, &dataset, &context);
        env = self
            .exec(&loader, &mut capture, &format!("result = {}", call), bound)
            .map_err(SandboxError::Call)?;
        if call.starts_with(DOWNLOAD_PREFIX) {
            if let Some(result) = env.get("result") {
                context.set_result(DOWNLOAD_PREFIX, result.clone());
            }
        }

        info!("running Actual...");
        let actual = match test.actual.trim() {
            "" => {
                info!("no Actual given, skipping comparison");
                return Ok(());
            }
            STDOUT_SENTINEL => serde_json::Value::String(capture.trimmed()),
            expr => {
                let bound = bind(env, &dataset, &context);
                let env = self
                    .exec(&loader, &mut LogSink::new("actual"), &format!("result = {}", expr), bound)
                    .map_err(SandboxError::Actual)?;
                env.get("result")
                    .cloned()
                    .unwrap_or(Value::None)
                    .to_json()
                    .map_err(SandboxError::Actual)?
            }
        };

        compare(&actual, &test.expect, self.comparison)?;
        info!("success!");
        Ok(())
    }

    fn exec(
        &self,
        loader: &CaseLoader<'_>,
        output: &mut dyn OutputSink,
        source: &str,
        env: Env,
    ) -> Result<Env, ScriptError> {
        Interpreter::new(loader, output)
            .with_max_depth(self.max_depth)
            .exec_file(source, env)
    }
}

/// Re-binds the standing objects over whatever the previous phase returned.
fn bind(env: Env, dataset: &DatasetHandle, context: &ContextHandle) -> Env {
    env.update("ds".to_string(), dataset.to_value())
        .update("ctx".to_string(), context.to_value())
}

/// The list literal of a `ctx.download = [...]` setup, if that is all it does.
fn download_literal(setup: &str) -> Option<&str> {
    let captures = DOWNLOAD_SETUP.as_ref()?.captures(setup)?;
    captures.name("value").map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn case(call: &str, actual: &str, expect: serde_json::Value) -> TestCase {
        TestCase {
            web_proxy: None,
            setup: String::new(),
            call: call.to_string(),
            actual: actual.to_string(),
            expect,
        }
    }

    #[test]
    fn test_download_literal_pattern() {
        assert_eq!(
            download_literal("ctx.download = [\"a\", 1]\n"),
            Some("[\"a\", 1]")
        );
        assert_eq!(download_literal("ctx.download = f()"), None);
        assert_eq!(download_literal("x = 1\nctx.download = [1]"), None);
    }

    #[test]
    fn test_phases_run_in_order() {
        let source = "def transform(ds, ctx):\n  ds.set_body([1, 2, 3])\n";
        let test = case("transform(ds, ctx)", "ds.get_body()", json!(["1", "2", "3"]));
        SandboxRunner::default().run(&test, source).unwrap();
    }

    #[test]
    fn test_definition_error_is_qualified() {
        let test = case("f()", "", json!(null));
        let err = SandboxRunner::default().run(&test, "def f(:\n").unwrap_err();
        assert!(matches!(err, SandboxError::Definition(_)));
        assert!(err.to_string().starts_with("running code block: "));
    }

    #[test]
    fn test_setup_env_is_kept() {
        let mut test = case("f()", "result", json!(3));
        test.setup = "base = 2".to_string();
        SandboxRunner::default()
            .run(&test, "def f():\n  return base + 1\n")
            .unwrap();
    }

    #[test]
    fn test_actual_must_be_data() {
        let test = case("f()", "f", json!(null));
        let err = SandboxRunner::default()
            .run(&test, "def f():\n  return 1\n")
            .unwrap_err();
        assert_eq!(err.to_string(), "during Actual: cannot convert function to data");
    }

    #[test]
    fn test_recursion_limit_is_a_call_error() {
        let config = RunConfig {
            max_depth: 20,
            ..RunConfig::default()
        };
        let test = case("f(0)", "", json!(null));
        let err = SandboxRunner::new(&config)
            .run(&test, "def f(n):\n  return f(n + 1)\n")
            .unwrap_err();
        assert!(err.to_string().contains("maximum recursion depth exceeded"));
    }
}
