//! Drives one acceptance run end to end.
//!
//! Preflight, then every selected suite with its groups wrapped in
//! boundary markers, then coverage and the summary artifacts. Test points
//! run sequentially and share one [`ActionContext`], so values saved by an
//! earlier HTTP check are visible to later ones.

use crate::actions::ActionContext;
use crate::boundary::{Boundaries, Scope};
use crate::config::Config;
use crate::coverage::{self, CoverageReport};
use crate::error::{AcceptanceError, Result};
use crate::executor::{Executor, TestPoint, TestResult};
use crate::log::{Fields, Level, Logger};
use crate::paths;
use crate::plan::{SuiteSpec, TestPlan};
use crate::preflight::{self, PreflightReport};
use crate::summary::{self, RunReport, OVERALL};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Run only the suite with this name.
    pub suite: Option<String>,
    pub skip_preflight: bool,
    /// Replaces the plan's `base_url`.
    pub base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    PreflightFailed(PreflightReport),
    Completed(RunReport),
}

pub struct Runner<'a> {
    root: &'a Path,
    config: &'a Config,
    logger: &'a Logger,
}

impl<'a> Runner<'a> {
    pub fn new(root: &'a Path, config: &'a Config, logger: &'a Logger) -> Self {
        Self {
            root,
            config,
            logger,
        }
    }

    pub fn run(&self, plan: &TestPlan, options: &RunOptions) -> Result<RunOutcome> {
        let suites = select_suites(plan, options.suite.as_deref())?;
        let base_url = options.base_url.as_deref().unwrap_or(&plan.base_url);

        self.logger.emit(
            Level::Change,
            format!("run started ({} suites, base url {base_url})", suites.len()),
            Fields::default(),
        )?;

        if !options.skip_preflight {
            let pf = &self.config.preflight;
            let report = preflight::run(
                self.root,
                self.logger,
                &pf.required_files,
                &pf.required_endpoints,
                Duration::from_secs(pf.timeout_secs),
            )?;
            if !report.pass {
                self.logger.emit(
                    Level::Change,
                    "run aborted: preflight failed",
                    Fields::default(),
                )?;
                return Ok(RunOutcome::PreflightFailed(report));
            }
        }

        let mut ctx = ActionContext::new(
            self.root,
            base_url,
            Duration::from_secs(self.config.executor.http_timeout_secs),
        )?;
        let executor = Executor::new(
            self.logger,
            Duration::from_millis(self.config.executor.retry_backoff_ms),
        );
        let mut boundaries = Boundaries::new(self.logger);

        let mut all = Vec::new();
        let mut suite_summaries = Vec::with_capacity(suites.len());
        for suite in suites {
            let results = self.run_suite(suite, &executor, &mut boundaries, &mut ctx)?;
            suite_summaries.push(summary::build(
                &suite.name,
                &results,
                self.config.gate.pass_rate_threshold,
            ));
            all.extend(results);
        }
        boundaries.finish()?;

        let mut overall = summary::build(OVERALL, &all, self.config.gate.pass_rate_threshold);
        if !plan.documents.is_empty() {
            overall = overall.with_coverage(coverage_for(self.root, self.config, plan, &all)?);
        }
        let report = RunReport {
            overall,
            suites: suite_summaries,
        };
        summary::write_artifacts(self.root, &report)?;

        self.logger.emit(
            Level::Change,
            format!(
                "run finished verdict={} pass_rate={}",
                report.verdict(),
                report.overall.pass_rate
            ),
            Fields::default(),
        )?;
        Ok(RunOutcome::Completed(report))
    }

    fn run_suite(
        &self,
        suite: &SuiteSpec,
        executor: &Executor<'_>,
        boundaries: &mut Boundaries<'_>,
        ctx: &mut ActionContext,
    ) -> Result<Vec<TestResult>> {
        let mut results = Vec::new();
        boundaries.open(&suite.name, Scope::Suite, &suite.name)?;
        for group in &suite.groups {
            boundaries.open(&suite.name, Scope::Group, &group.name)?;
            for tp in &group.test_points {
                let point = TestPoint::new(
                    &tp.id,
                    &suite.name,
                    tp.max_attempts.unwrap_or(self.config.executor.max_attempts),
                );
                let result = executor.run(&point, || ctx.perform(&tp.action))?;
                results.push(result);
            }
            boundaries.close(&suite.name, Scope::Group, &group.name)?;
        }
        boundaries.close(&suite.name, Scope::Suite, &suite.name)?;
        Ok(results)
    }
}

fn select_suites<'p>(plan: &'p TestPlan, name: Option<&str>) -> Result<Vec<&'p SuiteSpec>> {
    match name {
        None => Ok(plan.suites.iter().collect()),
        Some(name) => plan
            .suite(name)
            .map(|s| vec![s])
            .ok_or_else(|| AcceptanceError::InvalidPlan(format!("no suite named '{name}'"))),
    }
}

/// Coverage of the plan's documents by `results`. A document the plan does
/// not name contributes no ids; one it names but that cannot be read is an
/// error.
pub fn coverage_for(
    root: &Path,
    config: &Config,
    plan: &TestPlan,
    results: &[TestResult],
) -> Result<CoverageReport> {
    let acceptance_ids = match &plan.documents.requirements {
        Some(path) => {
            let text = read_document(root, path)?;
            coverage::extract_ids(&text, &config.coverage.acceptance_regex()?)
        }
        None => BTreeSet::new(),
    };
    let api_ids = match &plan.documents.api_list {
        Some(path) => {
            let text = read_document(root, path)?;
            coverage::extract_ids(&text, &config.coverage.api_regex()?)
        }
        None => BTreeSet::new(),
    };
    Ok(coverage::aggregate(
        &acceptance_ids,
        &api_ids,
        &plan.coverage_map(),
        results,
        config.coverage.link_api_prefix,
    ))
}

fn read_document(root: &Path, path: &Path) -> Result<String> {
    let full = paths::resolve(root, path);
    std::fs::read_to_string(&full).map_err(|e| {
        AcceptanceError::InvalidPlan(format!("cannot read document {}: {e}", full.display()))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
