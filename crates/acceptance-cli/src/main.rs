mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "acceptance",
    about = "Run acceptance test plans against generated projects and record structured results",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .acceptance/ or .git/)
    #[arg(long, global = true, env = "ACCEPTANCE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .acceptance/ with a default config and a starter plan
    Init,

    /// Show or validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Check required files and endpoints without running any suite
    Preflight,

    /// Run the test plan
    Run(cmd::run::RunArgs),

    /// Print the results of the most recent run
    Report {
        /// Summary file to read (default: .acceptance/reports/summary.json)
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Print the markdown report instead of the text table
        #[arg(long)]
        markdown: bool,
    },

    /// Query the JSON relay log
    Log(cmd::log::LogArgs),

    /// Recompute requirement/API coverage from the most recent run
    Coverage {
        /// Plan file (default: .acceptance/plan.yaml)
        #[arg(long)]
        plan: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Preflight => cmd::preflight::run(&root, cli.json),
        Commands::Run(args) => cmd::run::run(&root, args, cli.json),
        Commands::Report { summary, markdown } => {
            cmd::report::run(&root, summary.as_deref(), markdown, cli.json)
        }
        Commands::Log(args) => cmd::log::run(&root, args, cli.json),
        Commands::Coverage { plan } => cmd::coverage::run(&root, plan.as_deref(), cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
