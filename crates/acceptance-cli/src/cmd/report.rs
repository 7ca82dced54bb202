use crate::output::print_json;
use acceptance_core::{
    paths, report,
    summary::{self, RunReport},
};
use anyhow::Context;
use std::path::Path;

pub fn run(
    root: &Path,
    summary_path: Option<&Path>,
    markdown: bool,
    json: bool,
) -> anyhow::Result<()> {
    let path = summary_path
        .map(|p| paths::resolve(root, p))
        .unwrap_or_else(|| paths::summary_json_path(root));
    let overall = summary::load_summary(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    if json {
        print_json(&overall)
    } else if markdown {
        let report = RunReport {
            overall,
            suites: Vec::new(),
        };
        print!("{}", report::render_markdown(&report)?);
        Ok(())
    } else {
        print!("{}", report::render_text(&overall)?);
        Ok(())
    }
}
