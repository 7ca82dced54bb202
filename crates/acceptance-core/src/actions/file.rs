use crate::error::{AcceptanceError, Result};
use crate::executor::Outcome;
use crate::paths;
use regex::Regex;
use std::path::Path;

pub(super) fn exists(root: &Path, path: &Path) -> Outcome {
    let full = paths::resolve(root, path);
    if full.exists() {
        Outcome::pass(format!("{} exists", path.display()))
    } else {
        Outcome::fail(format!("{} not found", path.display()))
    }
}

pub(super) fn contains(root: &Path, path: &Path, pattern: &str) -> Result<Outcome> {
    let re = Regex::new(pattern).map_err(|source| AcceptanceError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;
    let full = paths::resolve(root, path);
    let content = match std::fs::read_to_string(&full) {
        Ok(c) => c,
        Err(e) => return Ok(Outcome::fail(format!("cannot read {}: {e}", path.display()))),
    };
    match content.lines().position(|l| re.is_match(l)) {
        Some(idx) => Ok(Outcome::pass(format!(
            "{}:{} matches /{pattern}/",
            path.display(),
            idx + 1
        ))),
        None if re.is_match(&content) => Ok(Outcome::pass(format!(
            "{} matches /{pattern}/",
            path.display()
        ))),
        None => Ok(Outcome::fail(format!(
            "{} has no match for /{pattern}/",
            path.display()
        ))),
    }
}
