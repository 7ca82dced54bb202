//! Human-readable renderings of a run report.

use crate::coverage::CoverageEntry;
use crate::error::Result;
use crate::summary::{RunReport, RunSummary};
use std::fmt::Write;

/// Markdown report: verdict header, overall results table, per-suite pass
/// rates and the coverage tables when coverage was computed.
pub fn render_markdown(report: &RunReport) -> Result<String> {
    let overall = &report.overall;
    let mut out = String::with_capacity(1024);

    writeln!(out, "# Acceptance Report\n")?;
    writeln!(out, "**Verdict:** {}\n", overall.verdict)?;
    writeln!(
        out,
        "**Pass rate:** {} ({}/{} passed, threshold {})\n",
        percent(overall.pass_rate),
        overall.passed(),
        overall.test_points.len(),
        percent(overall.threshold)
    )?;
    writeln!(out, "Generated at {}\n", overall.generated_at)?;

    if !report.suites.is_empty() {
        writeln!(out, "## Suites\n")?;
        writeln!(out, "| Suite | Pass rate | Passed | Verdict |")?;
        writeln!(out, "|-------|----------:|-------:|---------|")?;
        for suite in &report.suites {
            writeln!(
                out,
                "| {} | {} | {}/{} | {} |",
                cell(&suite.name),
                percent(suite.pass_rate),
                suite.passed(),
                suite.test_points.len(),
                suite.verdict
            )?;
        }
        writeln!(out)?;
    }

    writeln!(out, "## Test points\n")?;
    if overall.test_points.is_empty() {
        writeln!(out, "*No test points ran.*\n")?;
    } else {
        writeln!(out, "| Test point | Result | Attempts | Message |")?;
        writeln!(out, "|------------|--------|---------:|---------|")?;
        for r in &overall.test_points {
            writeln!(
                out,
                "| {} | {} | {} | {} |",
                cell(&r.test_point),
                if r.pass { "PASS" } else { "FAIL" },
                r.attempts,
                cell(&r.message)
            )?;
        }
        writeln!(out)?;
    }

    if let Some(entries) = &overall.acceptance_coverage {
        coverage_table(&mut out, "Acceptance coverage", entries)?;
    }
    if let Some(entries) = &overall.api_coverage {
        coverage_table(&mut out, "API coverage", entries)?;
    }
    if !overall.unknown_coverage_ids.is_empty() {
        writeln!(
            out,
            "Mapped ids missing from the documents: {}\n",
            overall.unknown_coverage_ids.join(", ")
        )?;
    }

    Ok(out)
}

fn coverage_table(out: &mut String, title: &str, entries: &[CoverageEntry]) -> Result<()> {
    writeln!(out, "## {title}\n")?;
    if entries.is_empty() {
        writeln!(out, "*No ids found.*\n")?;
        return Ok(());
    }
    writeln!(out, "| Id | Included | Passed | Evidence |")?;
    writeln!(out, "|----|----------|--------|----------|")?;
    for e in entries {
        writeln!(
            out,
            "| {} | {} | {} | {} |",
            e.id,
            yes_no(e.included),
            yes_no(e.passed),
            cell(&e.evidence)
        )?;
    }
    writeln!(out)?;
    Ok(())
}

/// Plain-text table of one summary for terminal output.
pub fn render_text(summary: &RunSummary) -> Result<String> {
    let mut out = String::new();
    let id_width = summary
        .test_points
        .iter()
        .map(|r| r.test_point.len())
        .max()
        .unwrap_or(0)
        .max("TEST POINT".len());

    writeln!(
        out,
        "{:<id_width$}  {:<6}  {:>8}  MESSAGE",
        "TEST POINT", "RESULT", "ATTEMPTS"
    )?;
    for r in &summary.test_points {
        writeln!(
            out,
            "{:<id_width$}  {:<6}  {:>8}  {}",
            r.test_point,
            if r.pass { "PASS" } else { "FAIL" },
            r.attempts,
            r.message.replace('\n', " ")
        )?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "{}: {} ({}/{} passed, threshold {})",
        summary.verdict,
        percent(summary.pass_rate),
        summary.passed(),
        summary.test_points.len(),
        percent(summary.threshold)
    )?;
    if let (Some(included), Some(passed)) = (summary.all_items_included, summary.all_items_passed)
    {
        writeln!(
            out,
            "coverage: all items included={} all items passed={}",
            yes_no(included),
            yes_no(passed)
        )?;
    }
    Ok(out)
}

fn percent(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

/// Escape pipes and flatten newlines so a value stays inside its cell.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}
