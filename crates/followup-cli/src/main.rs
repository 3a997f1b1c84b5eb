mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use cmd::run::{CrmArgs, LlmArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "followup",
    about = "Turn CRM order comments into scheduled follow-up tasks",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from followup.yaml or .followup/)
    #[arg(long, global = true, env = "FOLLOWUP_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default followup.yaml and the .followup/ state directory
    Init,

    /// One scheduled run: aging, cadence, delivery, then the comment pass
    Run {
        /// Local wall-clock time to run as, "YYYY-MM-DD HH:MM" (default: now)
        #[arg(long)]
        now: Option<String>,

        /// Read from the CRM but log writes instead of sending them
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        crm: CrmArgs,

        #[command(flatten)]
        llm: LlmArgs,
    },

    /// Run the comment pass for a single order
    Order {
        /// CRM order id
        id: u64,

        #[arg(long)]
        now: Option<String>,

        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        crm: CrmArgs,

        #[command(flatten)]
        llm: LlmArgs,
    },

    /// Show tracked aging, cadence and ledger entries
    State,

    /// Inspect and validate followup.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.command {
        Commands::Run { .. } | Commands::Order { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Run {
            now,
            dry_run,
            crm,
            llm,
        } => cmd::run::run(&root, now.as_deref(), dry_run, &crm, &llm, cli.json),
        Commands::Order {
            id,
            now,
            dry_run,
            crm,
            llm,
        } => cmd::order::run(&root, id, now.as_deref(), dry_run, &crm, &llm, cli.json),
        Commands::State => cmd::state::run(&root, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
