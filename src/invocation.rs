//! Module invocation from an arguments file.
//!
//! The automation engine runs a binary module with the path of a file holding
//! the task parameters. The file is a JSON (or YAML) mapping, either bare or
//! wrapped in `ANSIBLE_MODULE_ARGS`. Keys starting with `_ansible_` are
//! runtime options, not module parameters.

use crate::error::{Error, Result};
use crate::modules::{ModuleContext, ModuleParams};
use std::path::Path;

const WRAPPER_KEY: &str = "ANSIBLE_MODULE_ARGS";
const RUNTIME_PREFIX: &str = "_ansible_";

/// Parameters and runtime options of one module run
#[derive(Debug, Clone, Default)]
pub struct ModuleInvocation {
    pub params: ModuleParams,
    pub check_mode: bool,
    pub diff_mode: bool,
}

impl ModuleInvocation {
    /// Read an arguments file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| Error::args_file(path, e.to_string()))?;
        Self::parse(&content).map_err(|message| Error::args_file(path, message))
    }

    /// Parse arguments file contents
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let value: serde_json::Value = match serde_json::from_str(content) {
            Ok(value) => value,
            Err(json_err) => serde_yaml::from_str(content)
                .map_err(|yaml_err| format!("not JSON ({}) or YAML ({})", json_err, yaml_err))?,
        };

        let mut object = match value {
            serde_json::Value::Object(object) => object,
            other => return Err(format!("expected a mapping, got {}", other)),
        };

        if let Some(serde_json::Value::Object(inner)) = object.remove(WRAPPER_KEY) {
            object = inner;
        }

        let mut invocation = Self::default();
        for (key, value) in object {
            let runtime_option = key.strip_prefix(RUNTIME_PREFIX).map(str::to_string);
            match runtime_option.as_deref() {
                Some("check_mode") => invocation.check_mode = value.as_bool().unwrap_or(false),
                Some("diff") => invocation.diff_mode = value.as_bool().unwrap_or(false),
                Some(other) => tracing::trace!("Ignoring runtime option _ansible_{}", other),
                None => {
                    invocation.params.insert(key, value);
                }
            }
        }

        Ok(invocation)
    }

    /// Execution context, with command-line flags able to switch modes on
    pub fn context(&self, check_mode: bool, diff_mode: bool) -> ModuleContext {
        ModuleContext::new()
            .with_check_mode(self.check_mode || check_mode)
            .with_diff_mode(self.diff_mode || diff_mode)
    }
}
