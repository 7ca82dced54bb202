//! The concrete checks a test point can perform.
//!
//! Every action reports an [`Outcome`]; an `Err` is reserved for problems
//! with the action definition itself (a bad regex, an unbuildable client)
//! and is turned into a failed attempt by the executor like anything else.

mod file;
mod http;
mod shell;

pub use http::HttpCheck;

use crate::error::Result;
use crate::executor::Outcome;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ActionSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionSpec {
    Http(HttpCheck),
    FileExists {
        path: PathBuf,
    },
    FileContains {
        path: PathBuf,
        pattern: String,
    },
    Shell {
        command: String,
        #[serde(default = "default_shell_timeout")]
        timeout_seconds: u32,
    },
}

fn default_shell_timeout() -> u32 {
    60
}

impl ActionSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            ActionSpec::Http(_) => "http",
            ActionSpec::FileExists { .. } => "file_exists",
            ActionSpec::FileContains { .. } => "file_contains",
            ActionSpec::Shell { .. } => "shell",
        }
    }
}

// ---------------------------------------------------------------------------
// ActionContext
// ---------------------------------------------------------------------------

/// State shared by the actions of one run: the project root, the service
/// base URL, one HTTP client and the variables saved from earlier responses.
pub struct ActionContext {
    root: PathBuf,
    base_url: String,
    client: reqwest::blocking::Client,
    vars: HashMap<String, String>,
}

impl ActionContext {
    pub fn new(root: &Path, base_url: &str, http_timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(http_timeout)
            .build()?;
        Ok(Self {
            root: root.to_path_buf(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            vars: HashMap::new(),
        })
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn perform(&mut self, spec: &ActionSpec) -> Result<Outcome> {
        match spec {
            ActionSpec::Http(check) => Ok(http::perform(self, check)),
            ActionSpec::FileExists { path } => Ok(file::exists(&self.root, path)),
            ActionSpec::FileContains { path, pattern } => {
                file::contains(&self.root, path, pattern)
            }
            ActionSpec::Shell {
                command,
                timeout_seconds,
            } => {
                let timeout = if *timeout_seconds == 0 {
                    None
                } else {
                    Some(Duration::from_secs(u64::from(*timeout_seconds)))
                };
                Ok(shell::run(command, &self.root, timeout))
            }
        }
    }

    /// Replace `${name}` placeholders with saved variables.
    fn substitute(&self, text: &str) -> std::result::Result<String, String> {
        let mut missing = None;
        let out = placeholder_re().replace_all(text, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            match self.vars.get(name) {
                Some(v) => v.clone(),
                None => {
                    missing.get_or_insert_with(|| name.to_string());
                    String::new()
                }
            }
        });
        match missing {
            Some(name) => Err(name),
            None => Ok(out.into_owned()),
        }
    }
}

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").unwrap())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
