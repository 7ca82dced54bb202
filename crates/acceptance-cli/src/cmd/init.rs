use acceptance_core::{config::Config, io, paths, plan::STARTER_PLAN};
use anyhow::Context;
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing acceptance testing in: {}", root.display());

    for dir in [paths::ACCEPTANCE_DIR, paths::LOGS_DIR, paths::REPORTS_DIR] {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    let config_path = paths::config_path(root);
    if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
    } else {
        Config::default()
            .save(root)
            .context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
    }

    let plan_path = paths::plan_path(root);
    let created = io::write_if_missing(&plan_path, STARTER_PLAN.as_bytes())
        .context("failed to write plan.yaml")?;
    println!(
        "  {} {}",
        if created { "created:" } else { "exists: " },
        paths::PLAN_FILE
    );

    println!("\nNext: edit {} and run `acceptance run`", paths::PLAN_FILE);
    Ok(())
}
