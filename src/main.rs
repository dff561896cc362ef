use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradepulse::cli::CommandContext;
use tradepulse::cli::commands::{self, analyze::AnalyzeOptions};
use tradepulse::cli::ui::Output;
use tradepulse::constants::session::DEFAULT_HISTORY_LIMIT;

#[derive(Parser)]
#[command(name = "tradepulse")]
#[command(
    version,
    about = "Live progress tracking and history for multi-agent trading analyses"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, global = true, help = "Config file (skips global/project lookup)")]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the project config and database schema
    Init {
        #[arg(long, short, help = "Overwrite existing project config")]
        force: bool,
    },

    /// Run an analysis and stream its events as JSON lines
    Analyze {
        #[arg(long, short, help = "Ticker symbol, e.g. NVDA")]
        ticker: String,
        #[arg(long, short, help = "Trade date (YYYY-MM-DD)")]
        date: String,
        #[arg(long, short, help = "Comma-separated analysts: market,social,news,fundamentals")]
        analysts: Option<String>,
        #[arg(long, short, default_value = "0", help = "Owning user id")]
        user: i64,
        #[arg(long, help = "Replay snapshots from a JSONL file instead of running the pipeline")]
        snapshots: Option<PathBuf>,
        #[arg(long, help = "Print stage transitions to stderr")]
        progress: bool,
    },

    /// List stored analyses
    History {
        #[arg(long, short, help = "Only this user's analyses")]
        user: Option<i64>,
        #[arg(long, short, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Show one stored analysis
    Show {
        #[arg(help = "Analysis record id")]
        id: i64,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Import legacy JSON result files
    Migrate {
        #[arg(long, help = "Directory of legacy result files")]
        dir: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show effective configuration
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json"
        )]
        format: String,
    },

    /// Show configuration file paths
    Path,
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mTradePulse encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    // stdout carries the event stream, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init { force } => {
            commands::init::run(config_path, force)?;
        }
        Commands::Analyze {
            ticker,
            date,
            analysts,
            user,
            snapshots,
            progress,
        } => {
            let ctx = CommandContext::load(config_path)?;
            let options = AnalyzeOptions {
                ticker,
                date,
                analysts,
                user,
                snapshots,
                show_progress: progress,
            };

            let rt = Runtime::new()?;
            let outcome = rt.block_on(commands::analyze::run(&ctx, options))?;

            if !cli.quiet {
                Output::stderr().outcome(&outcome);
            }
            if !outcome.is_completed() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::History {
            user,
            limit,
            format,
        } => {
            let ctx = CommandContext::load(config_path)?;
            commands::history::list(&ctx, user, limit, &format)?;
        }
        Commands::Show { id, format } => {
            let ctx = CommandContext::load(config_path)?;
            commands::history::show(&ctx, id, &format)?;
        }
        Commands::Migrate { dir } => {
            let ctx = CommandContext::load(config_path)?;
            commands::migrate::run(&ctx, dir)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                commands::config::show(config_path, &format)?;
            }
            ConfigAction::Path => {
                commands::config::path(config_path)?;
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}
