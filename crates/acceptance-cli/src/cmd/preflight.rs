use crate::output::print_json;
use acceptance_core::{
    config::Config,
    log::Logger,
    preflight::{self, PreflightReport},
};
use anyhow::Context;
use std::path::Path;
use std::time::Duration;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default(root);
    let logger = Logger::from_config(&config, root);
    let pf = &config.preflight;

    let report = preflight::run(
        root,
        &logger,
        &pf.required_files,
        &pf.required_endpoints,
        Duration::from_secs(pf.timeout_secs),
    )
    .context("preflight could not complete")?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }

    if !report.pass {
        anyhow::bail!("preflight failed with {} issue(s)", report.issue_count());
    }
    Ok(())
}

pub fn print_report(report: &PreflightReport) {
    for file in &report.missing_files {
        println!("  missing file:  {file}");
    }
    for issue in &report.endpoint_issues {
        println!("  endpoint down: {} ({})", issue.url, issue.detail);
    }
    if report.pass {
        println!("Preflight passed.");
    } else {
        println!("Preflight failed: {} issue(s).", report.issue_count());
    }
}
