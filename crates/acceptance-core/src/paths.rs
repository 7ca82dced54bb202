use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const ACCEPTANCE_DIR: &str = ".acceptance";
pub const LOGS_DIR: &str = ".acceptance/logs";
pub const REPORTS_DIR: &str = ".acceptance/reports";
pub const SUITE_REPORTS_DIR: &str = ".acceptance/reports/suites";

pub const CONFIG_FILE: &str = ".acceptance/config.yaml";
pub const PLAN_FILE: &str = ".acceptance/plan.yaml";

pub const DEFAULT_LOG_FILE: &str = ".acceptance/logs/acceptance.log";
pub const DEFAULT_RELAY_FILE: &str = ".acceptance/logs/relay.jsonl";

pub const SUMMARY_JSON: &str = "summary.json";
pub const SUMMARY_MD: &str = "summary.md";
pub const PREFLIGHT_JSON: &str = "preflight.json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn acceptance_dir(root: &Path) -> PathBuf {
    root.join(ACCEPTANCE_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn plan_path(root: &Path) -> PathBuf {
    root.join(PLAN_FILE)
}

pub fn reports_dir(root: &Path) -> PathBuf {
    root.join(REPORTS_DIR)
}

pub fn summary_json_path(root: &Path) -> PathBuf {
    reports_dir(root).join(SUMMARY_JSON)
}

pub fn summary_md_path(root: &Path) -> PathBuf {
    reports_dir(root).join(SUMMARY_MD)
}

pub fn preflight_json_path(root: &Path) -> PathBuf {
    reports_dir(root).join(PREFLIGHT_JSON)
}

pub fn suite_summary_path(root: &Path, suite: &str) -> PathBuf {
    root.join(SUITE_REPORTS_DIR)
        .join(format!("{}.json", file_slug(suite)))
}

/// Resolve a configured path against the project root. Absolute paths pass
/// through unchanged.
pub fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Lowercase a display name into something safe to use as a file stem.
/// Runs of anything other than ASCII alphanumerics collapse into one `-`.
pub fn file_slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if out.is_empty() {
        "unnamed".to_string()
    } else {
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/.acceptance/config.yaml")
        );
        assert_eq!(
            summary_json_path(root),
            PathBuf::from("/tmp/proj/.acceptance/reports/summary.json")
        );
        assert_eq!(
            suite_summary_path(root, "Auth Flow"),
            PathBuf::from("/tmp/proj/.acceptance/reports/suites/auth-flow.json")
        );
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            resolve(root, Path::new("/var/log/x.log")),
            PathBuf::from("/var/log/x.log")
        );
        assert_eq!(
            resolve(root, Path::new("logs/x.log")),
            PathBuf::from("/tmp/proj/logs/x.log")
        );
    }

    #[test]
    fn file_slug_collapses_separators() {
        assert_eq!(file_slug("User CRUD -- v2"), "user-crud-v2");
        assert_eq!(file_slug("  auth  "), "auth");
        assert_eq!(file_slug("***"), "unnamed");
    }
}
