use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use brewday::config::{BrewdayConfig, LogConfig, StoreKind};

mod cmd;

#[derive(Parser)]
#[command(name = "brewday")]
#[command(version, about = "Brew day orchestrator")]
pub struct Cli {
    /// Log at debug level regardless of configuration
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding brewday.toml and the database
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Storage backend: memory, sqlite. Overrides brewday.toml
    #[arg(long, global = true)]
    pub store: Option<StoreKind>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store, list and inspect recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Read or change the process status of a recipe
    Status {
        #[command(subcommand)]
        command: StatusCommands,
    },
    /// Start and stop named timers
    Timer {
        #[command(subcommand)]
        command: TimerCommands,
    },
    /// Record and show the event timeline of a recipe
    Timeline {
        #[command(subcommand)]
        command: TimelineCommands,
    },
    /// Close and export the brew report
    Summary {
        #[command(subcommand)]
        command: SummaryCommands,
    },
    /// Dry-hop additions and their reminders
    DryHop {
        #[command(subcommand)]
        command: DryHopCommands,
    },
    /// SG measurement and fridge reminders
    Fermentation {
        #[command(subcommand)]
        command: FermentationCommands,
    },
    /// Send a test notification through the configured Gotify server
    Notify {
        message: String,
        #[arg(short, long, default_value = "Brewday")]
        title: String,
        /// Render the message as markdown
        #[arg(long)]
        markdown: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum RecipeCommands {
    /// Store a recipe from a JSON file and print its id
    Add { file: PathBuf },
    List,
    Show { id: String },
    /// Delete a recipe with its timeline, summary and reminders
    Delete { id: String },
}

#[derive(Subcommand, Clone)]
pub enum StatusCommands {
    Get {
        id: String,
    },
    Set {
        id: String,
        status: String,
        /// Stage-specific parameters, e.g. the rast number
        params: Vec<String>,
    },
}

#[derive(Subcommand, Clone)]
pub enum TimerCommands {
    /// Start a timer and print its end; repeated starts print the first end
    Start {
        id: String,
        prefix: String,
        #[arg(short, long)]
        minutes: f64,
        #[arg(short, long)]
        suffix: Option<String>,
    },
    /// Stop a timer; only the first stop is recorded
    Stop {
        id: String,
        prefix: String,
        #[arg(short, long)]
        suffix: Option<String>,
        /// Stop instant as unix seconds (defaults to now)
        #[arg(long)]
        at: Option<i64>,
    },
    /// Print the measured duration of a stopped timer
    Duration {
        id: String,
        prefix: String,
        #[arg(short, long)]
        suffix: Option<String>,
    },
}

#[derive(Subcommand, Clone)]
pub enum TimelineCommands {
    Add { id: String, message: String },
    Show { id: String },
}

#[derive(Subcommand, Clone)]
pub enum SummaryCommands {
    /// Render the report and freeze it
    Close { id: String },
    /// Print the closed report
    Show { id: String },
    /// Write the closed report to `<output>/<id>.<ext>`
    Export {
        id: String,
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[derive(Subcommand, Clone)]
pub enum DryHopCommands {
    /// List the dry-hop additions of a recipe
    List { id: String },
    /// Schedule a reminder for one addition
    Remind {
        id: String,
        entry: String,
        /// Reminder instant, RFC 3339
        #[arg(long)]
        at: String,
    },
    /// Record an addition as done
    Confirm { id: String, entry: String },
    /// Rebuild every persisted reminder of a recipe and wait until they have fired
    Watch { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ReminderUnit {
    Days,
    Hours,
    Seconds,
}

#[derive(Subcommand, Clone)]
pub enum FermentationCommands {
    /// Schedule one SG measurement reminder per unit, from `first` to `last` units from now
    SgRemind {
        id: String,
        #[arg(long, default_value_t = 3)]
        first: u32,
        #[arg(long, default_value_t = 10)]
        last: u32,
        #[arg(long, value_enum, default_value = "days")]
        unit: ReminderUnit,
    },
    /// Schedule the reminder to move the bottles into the fridge
    FridgeRemind {
        id: String,
        /// Reminder instant, RFC 3339
        #[arg(long)]
        at: String,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default brewday.toml to the data directory
    Init,
}

/// Installs the global subscriber. Logs go to stderr, and additionally to a
/// daily rolling file when configured. The returned guard flushes the file
/// writer on drop.
fn init_tracing(
    log: &LogConfig,
    verbose: bool,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let fallback = if verbose { "debug" } else { log.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match &log.file {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "brewday.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    let result = if log.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()
    };
    result.context("Failed to initialize logging")?;
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = BrewdayConfig::resolve(cli.data_dir.as_deref())?;
    if let Some(store) = cli.store {
        config.store = store;
    }
    let _guard = init_tracing(&config.log, cli.verbose)?;

    match cli.command {
        Commands::Recipe { command } => cmd::cmd_recipe(&config, command).await?,
        Commands::Status { command } => cmd::cmd_status(&config, command).await?,
        Commands::Timer { command } => cmd::cmd_timer(&config, command).await?,
        Commands::Timeline { command } => cmd::cmd_timeline(&config, command).await?,
        Commands::Summary { command } => cmd::cmd_summary(&config, command).await?,
        Commands::DryHop { command } => cmd::cmd_dry_hop(&config, command).await?,
        Commands::Fermentation { command } => cmd::cmd_fermentation(&config, command).await?,
        Commands::Notify {
            message,
            title,
            markdown,
        } => cmd::cmd_notify(&config, &message, &title, markdown).await?,
        Commands::Config { command } => cmd::cmd_config(&config, command)?,
    }

    Ok(())
}
