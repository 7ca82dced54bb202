use crate::output::{print_json, print_table};
use acceptance_core::{
    config::Config,
    log::{read_relay, RecordFilter, TestStatus},
};
use clap::Args;
use std::path::Path;

#[derive(Args)]
pub struct LogArgs {
    /// Only records of this suite
    #[arg(long)]
    pub suite: Option<String>,

    /// Only records of this test point (or boundary id such as SUITE-AUTH)
    #[arg(long)]
    pub test_point: Option<String>,

    /// Only records of this run id
    #[arg(long)]
    pub run: Option<String>,

    /// Only records with this status: START, RETRY, PASS, FAIL, SKIP, END
    #[arg(long)]
    pub status: Option<String>,

    /// Show at most the last N matching records
    #[arg(long)]
    pub limit: Option<usize>,
}

pub fn run(root: &Path, args: LogArgs, json: bool) -> anyhow::Result<()> {
    let status = match args.status.as_deref() {
        Some(s) => Some(
            TestStatus::parse(s).ok_or_else(|| anyhow::anyhow!("unknown status '{s}'"))?,
        ),
        None => None,
    };
    let filter = RecordFilter {
        suite: args.suite,
        test_point: args.test_point,
        run_id: args.run,
        status,
    };

    let config = Config::load_or_default(root);
    if !config.transport.mode.writes_json() {
        tracing::warn!(
            mode = %config.transport.mode,
            "transport mode does not write the relay; only earlier records can be shown"
        );
    }
    let records = read_relay(&config.relay_path(root))?;
    let mut matched = filter.apply(&records);
    if let Some(limit) = args.limit {
        let skip = matched.len().saturating_sub(limit);
        matched = matched.split_off(skip);
    }

    if json {
        return print_json(&matched);
    }
    if matched.is_empty() {
        println!("No matching records.");
        return Ok(());
    }

    let dash = || "-".to_string();
    let rows = matched
        .iter()
        .map(|r| {
            let f = &r.fields;
            vec![
                r.timestamp.clone(),
                r.level.as_str().to_string(),
                f.suite.clone().unwrap_or_else(dash),
                f.test_point.clone().unwrap_or_else(dash),
                f.test_status
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_else(dash),
                match (f.attempt, f.max_attempts) {
                    (Some(a), Some(m)) => format!("{a}/{m}"),
                    _ => dash(),
                },
                r.message.clone(),
            ]
        })
        .collect();
    print_table(
        &["TIME", "LEVEL", "SUITE", "TEST POINT", "STATUS", "ATTEMPT", "MESSAGE"],
        rows,
    );
    Ok(())
}
