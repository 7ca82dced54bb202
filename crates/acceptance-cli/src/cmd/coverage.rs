use crate::output::{print_json, print_table};
use acceptance_core::{
    config::Config, coverage::CoverageEntry, paths, plan::TestPlan, runner, summary,
};
use anyhow::Context;
use std::path::Path;

pub fn run(root: &Path, plan: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default(root);
    let plan_path = plan
        .map(|p| paths::resolve(root, p))
        .unwrap_or_else(|| paths::plan_path(root));
    let plan = TestPlan::load(&plan_path)
        .with_context(|| format!("failed to load plan {}", plan_path.display()))?;
    let summary_path = paths::summary_json_path(root);
    let last = summary::load_summary(&summary_path)
        .context("no previous run to compute coverage from")?;

    let report = runner::coverage_for(root, &config, &plan, &last.test_points)?;

    if json {
        print_json(&report)?;
    } else {
        for (title, entries) in [("Acceptance items", &report.acceptance), ("APIs", &report.api)] {
            println!("{title}:");
            print_entries(entries);
            println!();
        }
        if !report.unknown_ids.is_empty() {
            println!(
                "Mapped ids missing from the documents: {}",
                report.unknown_ids.join(", ")
            );
        }
        println!(
            "all items included: {}  all items passed: {}",
            report.all_items_included, report.all_items_passed
        );
    }

    if !report.gate_passed() {
        anyhow::bail!("coverage gate failed");
    }
    Ok(())
}

fn print_entries(entries: &[CoverageEntry]) {
    if entries.is_empty() {
        println!("  (none)");
        return;
    }
    let rows = entries
        .iter()
        .map(|e| {
            vec![
                e.id.clone(),
                e.included.to_string(),
                e.passed.to_string(),
                e.evidence.clone(),
            ]
        })
        .collect();
    print_table(&["ID", "INCLUDED", "PASSED", "EVIDENCE"], rows);
}
