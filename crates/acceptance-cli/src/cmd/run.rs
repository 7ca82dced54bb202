use crate::cmd::preflight::print_report;
use crate::output::{print_json, print_warnings};
use acceptance_core::{
    config::Config,
    log::Logger,
    paths,
    plan::TestPlan,
    report,
    runner::{RunOptions, RunOutcome, Runner},
};
use anyhow::Context;
use clap::Args;
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct RunArgs {
    /// Plan file (default: .acceptance/plan.yaml)
    #[arg(long)]
    pub plan: Option<PathBuf>,

    /// Run only this suite
    #[arg(long)]
    pub suite: Option<String>,

    /// Override the plan's base_url
    #[arg(long)]
    pub base_url: Option<String>,

    /// Do not run the preflight gate first
    #[arg(long)]
    pub skip_preflight: bool,

    /// Change id stamped on every log record
    #[arg(long)]
    pub change_id: Option<String>,

    /// Phase stamped on every log record
    #[arg(long)]
    pub phase: Option<String>,
}

// ---------------------------------------------------------------------------
// RunExit
// ---------------------------------------------------------------------------

/// Why a completed command still exits non-zero.
#[derive(Debug)]
pub enum RunExit {
    PreflightFailed { issues: usize },
    VerdictFailed { pass_rate: f64, threshold: f64 },
}

impl std::fmt::Display for RunExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunExit::PreflightFailed { issues } => {
                write!(f, "preflight failed with {issues} issue(s); run aborted")
            }
            RunExit::VerdictFailed {
                pass_rate,
                threshold,
            } => write!(
                f,
                "verdict FAIL (pass rate {pass_rate}, threshold {threshold})"
            ),
        }
    }
}

impl std::error::Error for RunExit {}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub fn run(root: &Path, args: RunArgs, json: bool) -> anyhow::Result<()> {
    let mut config = Config::load_or_default(root);
    if args.change_id.is_some() {
        config.change_id = args.change_id;
    }
    if args.phase.is_some() {
        config.phase = args.phase;
    }

    let plan_path = args
        .plan
        .map(|p| paths::resolve(root, &p))
        .unwrap_or_else(|| paths::plan_path(root));
    let plan = TestPlan::load(&plan_path)
        .with_context(|| format!("failed to load plan {}", plan_path.display()))?;
    let warnings = plan.validate();
    if !warnings.is_empty() && !json {
        print_warnings(&warnings);
    }
    if plan.has_errors() {
        anyhow::bail!("plan {} has errors", plan_path.display());
    }

    let logger = Logger::from_config(&config, root);
    tracing::debug!(run_id = ?logger.run_id(), mode = %logger.mode(), "starting run");

    let options = RunOptions {
        suite: args.suite,
        skip_preflight: args.skip_preflight,
        base_url: args.base_url,
    };
    let outcome = Runner::new(root, &config, &logger)
        .run(&plan, &options)
        .context("run failed")?;

    match outcome {
        RunOutcome::PreflightFailed(report) => {
            if json {
                print_json(&serde_json::json!({
                    "run_id": logger.run_id(),
                    "preflight": report,
                }))?;
            } else {
                print_report(&report);
            }
            Err(RunExit::PreflightFailed {
                issues: report.issue_count(),
            }
            .into())
        }
        RunOutcome::Completed(report) => {
            if json {
                print_json(&serde_json::json!({
                    "run_id": logger.run_id(),
                    "report": report,
                }))?;
            } else {
                print!("{}", report::render_text(&report.overall)?);
                println!(
                    "\nReports written to {}",
                    paths::reports_dir(root).display()
                );
            }
            if report.verdict().is_pass() {
                Ok(())
            } else {
                Err(RunExit::VerdictFailed {
                    pass_rate: report.overall.pass_rate,
                    threshold: report.overall.threshold,
                }
                .into())
            }
        }
    }
}
