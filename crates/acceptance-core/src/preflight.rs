use crate::error::Result;
use crate::log::{Fields, Level, Logger};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const PREFLIGHT_PHASE: &str = "preflight";

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointIssue {
    pub url: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightReport {
    pub pass: bool,
    pub missing_files: Vec<String>,
    pub endpoint_issues: Vec<EndpointIssue>,
    pub checked_at: String,
}

impl PreflightReport {
    pub fn issue_count(&self) -> usize {
        self.missing_files.len() + self.endpoint_issues.len()
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Check every required file and endpoint, collecting all failures rather
/// than stopping at the first.
pub fn check(
    root: &Path,
    required_files: &[PathBuf],
    required_endpoints: &[String],
    timeout: Duration,
) -> Result<PreflightReport> {
    let missing_files = required_files
        .iter()
        .filter(|p| !paths::resolve(root, p).exists())
        .map(|p| p.display().to_string())
        .collect();

    let mut endpoint_issues = Vec::new();
    if !required_endpoints.is_empty() {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        for url in required_endpoints {
            if let Some(detail) = probe(&client, url) {
                endpoint_issues.push(EndpointIssue {
                    url: url.clone(),
                    detail,
                });
            }
        }
    }

    let mut report = PreflightReport {
        pass: false,
        missing_files,
        endpoint_issues,
        checked_at: chrono::Utc::now().to_rfc3339(),
    };
    report.pass = report.issue_count() == 0;
    Ok(report)
}

/// GET `url`; `None` means the endpoint itself answered with a status in
/// [200, 400). Redirects are not followed.
fn probe(client: &reqwest::blocking::Client, url: &str) -> Option<String> {
    match client.get(url).send() {
        Ok(resp) => {
            let status = resp.status();
            if (200..400).contains(&status.as_u16()) {
                None
            } else {
                Some(format!("unexpected status {}", status.as_u16()))
            }
        }
        Err(e) if e.is_timeout() => Some("timed out".to_string()),
        Err(e) => Some(format!("request failed: {e}")),
    }
}

/// Run the gate, write `preflight.json` and log one record per issue plus a
/// verdict record.
pub fn run(
    root: &Path,
    logger: &Logger,
    required_files: &[PathBuf],
    required_endpoints: &[String],
    timeout: Duration,
) -> Result<PreflightReport> {
    let report = check(root, required_files, required_endpoints, timeout)?;
    let fields = || Fields::default().phase(PREFLIGHT_PHASE);

    for file in &report.missing_files {
        logger.emit(Level::Error, format!("missing required file {file}"), fields())?;
    }
    for issue in &report.endpoint_issues {
        logger.emit(
            Level::Error,
            format!("endpoint {} unavailable: {}", issue.url, issue.detail),
            fields(),
        )?;
    }
    if report.pass {
        logger.emit(
            Level::Success,
            format!(
                "preflight passed ({} files, {} endpoints)",
                required_files.len(),
                required_endpoints.len()
            ),
            fields(),
        )?;
    } else {
        logger.emit(
            Level::Error,
            format!("preflight failed with {} issue(s)", report.issue_count()),
            fields(),
        )?;
    }

    write_report(root, &report)?;
    Ok(report)
}

pub fn write_report(root: &Path, report: &PreflightReport) -> Result<()> {
    let data = serde_json::to_string_pretty(report)?;
    crate::io::atomic_write(&paths::preflight_json_path(root), data.as_bytes())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
