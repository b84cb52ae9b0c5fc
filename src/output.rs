//! Output and reporting for module runs
//!
//! The automation engine reads a single JSON object from stdout. The human
//! format mirrors the engine's own task lines for running a module by hand.

use crate::error::Result;
use crate::modules::ModuleOutput;
use colored::Colorize;
use serde_json::{json, Map, Value};

/// Build the JSON result object for a module run
pub fn json_result(result: &Result<ModuleOutput>) -> Value {
    match result {
        Ok(output) => {
            let mut object = Map::new();
            for (key, value) in &output.data {
                object.insert(key.clone(), value.clone());
            }
            object.insert("changed".to_string(), json!(output.changed));
            object.insert("failed".to_string(), json!(output.is_failed()));
            object.insert("msg".to_string(), json!(output.msg));
            if let Some(ref diff) = output.diff {
                object.insert(
                    "diff".to_string(),
                    json!({"before": diff.before, "after": diff.after}),
                );
            }
            Value::Object(object)
        }
        Err(e) => json!({
            "changed": false,
            "failed": true,
            "msg": e.to_string(),
        }),
    }
}

/// Format a one-line human summary of a module run
pub fn human_result(module: &str, result: &Result<ModuleOutput>) -> String {
    match result {
        Ok(output) if output.is_failed() => failed(module, &output.msg),
        Ok(output) if output.changed => {
            format!("{}: [{}] => {}", "changed".yellow(), module.bright_white().bold(), output.msg)
        }
        Ok(output) => format!("{}: [{}] => {}", "ok".green(), module.bright_white().bold(), output.msg),
        Err(e) => failed(module, &e.to_string()),
    }
}

fn failed(module: &str, msg: &str) -> String {
    format!(
        "{}: [{}] => {}",
        "failed".red().bold(),
        module.bright_white().bold(),
        msg
    )
}

/// Format the diff of a module run, if any
pub fn human_diff(output: &ModuleOutput) -> Option<String> {
    output.diff.as_ref().map(|diff| {
        let before = diff.before.lines().map(|l| format!("-{}", l).red().to_string());
        let after = diff.after.lines().map(|l| format!("+{}", l).green().to_string());
        before.chain(after).collect::<Vec<_>>().join("\n")
    })
}
