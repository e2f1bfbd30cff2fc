//! Command builder for interpreter invocations
//!
//! The interpreter is invoked as `<command...> <script> <artifact>`. Arguments
//! are handed to the OS as a vector, never through a shell, and the submitted
//! code is only ever reachable through the staged script file.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::types::ExecutionPlan;

/// Builder for interpreter command lines
#[derive(Debug, Clone)]
pub struct InterpreterCommand {
    /// Program followed by its fixed arguments
    interpreter: Vec<String>,
    env: Vec<(String, String)>,
    /// First positional argument
    script: Option<PathBuf>,
    /// Second positional argument
    artifact: Option<PathBuf>,
}

impl InterpreterCommand {
    /// Create a new builder for an interpreter and its fixed arguments
    pub fn new(interpreter: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            interpreter: interpreter.into_iter().map(Into::into).collect(),
            env: Vec::new(),
            script: None,
            artifact: None,
        }
    }

    /// Create a builder from a resolved plan
    pub fn from_plan(plan: &ExecutionPlan) -> Self {
        Self::new(plan.interpreter.iter().cloned()).envs(plan.env.iter().cloned())
    }

    /// Set an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set multiple environment variables
    pub fn envs(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(vars);
        self
    }

    /// Set the staged script path
    pub fn script(mut self, path: impl Into<PathBuf>) -> Self {
        self.script = Some(path.into());
        self
    }

    /// Set the path the artifact must be written to
    pub fn artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact = Some(path.into());
        self
    }

    /// Environment variables for the interpreter
    pub fn environment(&self) -> &[(String, String)] {
        &self.env
    }

    /// Program to spawn, if any
    pub fn program(&self) -> Option<&str> {
        self.interpreter.first().map(String::as_str)
    }

    /// Build the arguments passed after the program
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = self
            .interpreter
            .iter()
            .skip(1)
            .map(OsString::from)
            .collect();
        if let Some(ref script) = self.script {
            args.push(script.as_os_str().to_owned());
        }
        if let Some(ref artifact) = self.artifact {
            args.push(artifact.as_os_str().to_owned());
        }
        args
    }

    /// Human-readable command line with the two paths quoted, for logs
    pub fn display(&self) -> String {
        let mut line = self.interpreter.join(" ");
        for path in [&self.script, &self.artifact].into_iter().flatten() {
            line.push_str(&format!(" \"{}\"", path.to_string_lossy()));
        }
        line
    }
}
