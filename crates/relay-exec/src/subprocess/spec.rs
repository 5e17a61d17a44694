use std::path::{Component, Path, PathBuf};

use relay_model::Env;
use serde::Deserialize;

use crate::ExecError;

/// Payload of a `subprocess` job description.
///
/// Unknown payload fields are ignored so the server may attach its own bookkeeping.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubprocessSpec {
    /// Program to execute, resolved through `PATH` when not absolute.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Added on top of the worker's own environment.
    #[serde(default)]
    pub env: Env,
    /// Objects fetched into the scratch directory before the program starts.
    #[serde(default)]
    pub inputs: Vec<Input>,
    /// Files uploaded after a zero exit.
    #[serde(default)]
    pub outputs: Vec<Output>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Input {
    pub key: String,
    /// Relative to the scratch directory.
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Output {
    /// Relative to the scratch directory.
    pub path: PathBuf,
    pub key: String,
}

impl SubprocessSpec {
    /// Rules:
    /// - `command` is not blank;
    /// - transfer keys are not blank;
    /// - transfer paths are relative and never leave the scratch directory.
    pub fn validate(&self) -> Result<(), ExecError> {
        if self.command.trim().is_empty() {
            return Err(ExecError::InvalidSpec("command is empty".into()));
        }
        for input in &self.inputs {
            check_transfer("inputs", &input.key, &input.path)?;
        }
        for output in &self.outputs {
            check_transfer("outputs", &output.key, &output.path)?;
        }
        Ok(())
    }
}

fn check_transfer(list: &str, key: &str, path: &Path) -> Result<(), ExecError> {
    if key.trim().is_empty() {
        return Err(ExecError::InvalidSpec(format!("{list}: empty key")));
    }
    let contained = path.components().next().is_some()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !contained {
        return Err(ExecError::InvalidSpec(format!(
            "{list}: path {} must be relative to the scratch directory",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(value: serde_json::Value) -> SubprocessSpec {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn decodes_full_payload() {
        let s = spec(json!({
            "command": "make",
            "args": ["-j4", "all"],
            "env": [{"key": "CC", "value": "clang"}],
            "inputs": [{"key": "src/abc.tar", "path": "abc.tar"}],
            "outputs": [{"path": "out/app", "key": "builds/app"}],
            "priority": 3
        }));
        assert_eq!(s.args, ["-j4", "all"]);
        assert_eq!(s.env.get("CC"), Some("clang"));
        assert_eq!(s.inputs[0].path, PathBuf::from("abc.tar"));
        assert_eq!(s.outputs[0].key, "builds/app");
        assert!(s.validate().is_ok());
    }

    #[test]
    fn blank_command_is_rejected() {
        let s = spec(json!({"command": "  "}));
        assert!(matches!(s.validate(), Err(ExecError::InvalidSpec(_))));
    }

    #[test]
    fn paths_must_stay_inside_the_scratch_directory() {
        for path in ["/etc/passwd", "../outside", "a/../../b", ""] {
            let s = spec(json!({
                "command": "true",
                "outputs": [{"path": path, "key": "k"}]
            }));
            assert!(s.validate().is_err(), "{path} accepted");
        }

        let ok = spec(json!({
            "command": "true",
            "inputs": [{"key": "k", "path": "./nested/dir/file"}]
        }));
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn blank_key_is_rejected() {
        let s = spec(json!({
            "command": "true",
            "inputs": [{"key": "", "path": "file"}]
        }));
        assert!(s.validate().is_err());
    }
}
