mod commands;
mod input;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use statetrack_core::InstanceState;
use statetrack_tracking::{read_config, TrackingConfig};
use tracing_subscriber::EnvFilter;

/// Exit code for a check or assertion that did not hold.
pub(crate) const EXIT_CHECK_FAILED: i32 = 1;
/// Exit code for unreadable input or bad arguments.
pub(crate) const EXIT_USAGE: i32 = 2;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Replay and inspect recorded state machine traces.
#[derive(Parser)]
#[command(
    name = "statetrack",
    version,
    about = "Replay and inspect recorded state machine traces"
)]
struct Cli {
    /// Tracking configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log tracking activity to stderr (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a trace into a state tracker and print the reconstructed state
    Replay {
        /// Trace file (JSON array or JSON Lines)
        trace: PathBuf,
        /// State machine definition (.json or .toml)
        #[arg(long)]
        definition: PathBuf,
        /// States to remember (defaults to the configured value)
        #[arg(long)]
        max_history: Option<usize>,
        /// Persist the tracker to the configured instance store
        #[arg(long)]
        save: bool,
    },

    /// Check that states were entered in the given order
    Check {
        /// Trace file (JSON array or JSON Lines)
        trace: PathBuf,
        /// State machine definition (.json or .toml)
        #[arg(long)]
        definition: PathBuf,
        /// Comma-separated state names, e.g. ClosedLocked,ClosedUnlocked
        #[arg(long, value_delimiter = ',', required = true)]
        in_order: Vec<String>,
    },

    /// Check that an activity reached a state anywhere in the trace
    Exists {
        /// Trace file (JSON array or JSON Lines)
        trace: PathBuf,
        /// Activity name
        #[arg(long)]
        activity: String,
        /// Instance state the activity must reach
        #[arg(long, default_value = "closed")]
        state: InstanceState,
    },

    /// Print the records matching a filter
    Query {
        /// Trace file (JSON array or JSON Lines)
        trace: PathBuf,
        /// Activity name
        #[arg(long)]
        activity: Option<String>,
        /// Instance state
        #[arg(long)]
        state: Option<InstanceState>,
        /// Lowest sequence number to include
        #[arg(long, default_value = "0")]
        from: u64,
    },

    /// Verify that schema scripts create the instance store's tables and procedures
    Schema {
        /// Directory containing *.sql scripts
        script_dir: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.output, cli.quiet);
    init_tracing(cli.verbose, config.tracking.trace_to_diagnostics);

    match cli.command {
        Commands::Replay {
            trace,
            definition,
            max_history,
            save,
        } => {
            commands::replay::cmd_replay(commands::replay::ReplayOptions {
                trace: &trace,
                definition: &definition,
                max_history,
                save,
                config: &config,
                output: cli.output,
                quiet: cli.quiet,
            });
        }
        Commands::Check {
            trace,
            definition,
            in_order,
        } => {
            commands::check::cmd_check(&trace, &definition, &in_order, cli.output, cli.quiet);
        }
        Commands::Exists {
            trace,
            activity,
            state,
        } => {
            commands::check::cmd_exists(&trace, &activity, state, cli.output, cli.quiet);
        }
        Commands::Query {
            trace,
            activity,
            state,
            from,
        } => {
            commands::query::cmd_query(
                &trace,
                activity.as_deref(),
                state,
                from,
                cli.output,
                cli.quiet,
            );
        }
        Commands::Schema { script_dir } => {
            commands::schema::cmd_schema(&script_dir, cli.output, cli.quiet);
        }
    }
}

fn init_tracing(verbose: bool, diagnostics: bool) {
    let mut default = if verbose { "statetrack=debug" } else { "warn" }.to_string();
    if diagnostics {
        default.push_str(",statetrack::diagnostics=info");
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>, output: OutputFormat, quiet: bool) -> TrackingConfig {
    match path {
        None => TrackingConfig::default(),
        Some(path) => read_config(path).unwrap_or_else(|e| fail(&e.to_string(), output, quiet)),
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => eprintln!("{}", serde_json::json!({ "error": msg })),
    }
}

/// Report a usage or input error and exit.
pub(crate) fn fail(msg: &str, output: OutputFormat, quiet: bool) -> ! {
    report_error(msg, output, quiet);
    process::exit(EXIT_USAGE);
}

pub(crate) fn print_json(value: &serde_json::Value) {
    let pretty = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
    println!("{}", pretty);
}
