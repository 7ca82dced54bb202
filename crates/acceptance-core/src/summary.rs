use crate::coverage::{CoverageEntry, CoverageReport};
use crate::error::{AcceptanceError, Result};
use crate::executor::TestResult;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const OVERALL: &str = "overall";

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
        }
    }

    pub fn is_pass(self) -> bool {
        self == Verdict::Pass
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RunSummary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub name: String,
    pub generated_at: String,
    pub pass_rate: f64,
    pub threshold: f64,
    pub verdict: Verdict,
    pub test_points: Vec<TestResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_coverage: Option<Vec<CoverageEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_coverage: Option<Vec<CoverageEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_items_included: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_items_passed: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_coverage_ids: Vec<String>,
}

impl RunSummary {
    pub fn passed(&self) -> usize {
        self.test_points.iter().filter(|r| r.pass).count()
    }

    pub fn failed(&self) -> usize {
        self.test_points.len() - self.passed()
    }

    pub fn has_coverage(&self) -> bool {
        self.all_items_included.is_some()
    }

    /// Attach a coverage report and recompute the verdict with it.
    pub fn with_coverage(mut self, coverage: CoverageReport) -> Self {
        self.all_items_included = Some(coverage.all_items_included);
        self.all_items_passed = Some(coverage.all_items_passed);
        self.unknown_coverage_ids = coverage.unknown_ids;
        self.api_coverage = Some(coverage.api);
        self.acceptance_coverage = Some(coverage.acceptance);
        self.verdict = verdict(
            &self.test_points,
            self.threshold,
            self.all_items_included,
            self.all_items_passed,
        );
        self
    }
}

/// passed / total rounded to 4 decimals; 0.0 when there are no results.
/// For display only; the verdict compares the exact ratio.
pub fn pass_rate(results: &[TestResult]) -> f64 {
    (exact_rate(results) * 10_000.0).round() / 10_000.0
}

fn exact_rate(results: &[TestResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let passed = results.iter().filter(|r| r.pass).count();
    if passed == results.len() {
        return 1.0;
    }
    passed as f64 / results.len() as f64
}

fn verdict(
    results: &[TestResult],
    threshold: f64,
    all_items_included: Option<bool>,
    all_items_passed: Option<bool>,
) -> Verdict {
    let coverage_ok = all_items_included.unwrap_or(true) && all_items_passed.unwrap_or(true);
    if exact_rate(results) >= threshold && coverage_ok {
        Verdict::Pass
    } else {
        Verdict::Fail
    }
}

pub fn build(name: &str, results: &[TestResult], threshold: f64) -> RunSummary {
    let rate = pass_rate(results);
    RunSummary {
        name: name.to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        pass_rate: rate,
        threshold,
        verdict: verdict(results, threshold, None, None),
        test_points: results.to_vec(),
        api_coverage: None,
        acceptance_coverage: None,
        all_items_included: None,
        all_items_passed: None,
        unknown_coverage_ids: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

/// The top-level summary plus one summary per suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub overall: RunSummary,
    pub suites: Vec<RunSummary>,
}

impl RunReport {
    pub fn verdict(&self) -> Verdict {
        self.overall.verdict
    }
}

/// Write `summary.json`, `summary.md` and one JSON file per suite.
pub fn write_artifacts(root: &Path, report: &RunReport) -> Result<()> {
    write_json(&paths::summary_json_path(root), &report.overall)?;
    for suite in &report.suites {
        write_json(&paths::suite_summary_path(root, &suite.name), suite)?;
    }
    let md = crate::report::render_markdown(report)?;
    crate::io::atomic_write(&paths::summary_md_path(root), md.as_bytes())
}

fn write_json(path: &Path, summary: &RunSummary) -> Result<()> {
    let data = serde_json::to_string_pretty(summary)?;
    crate::io::atomic_write(path, data.as_bytes())
}

pub fn load_summary(path: &Path) -> Result<RunSummary> {
    if !path.exists() {
        return Err(AcceptanceError::SummaryNotFound(path.to_path_buf()));
    }
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
