// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nodeweave::app_config::{self, Config};
use nodeweave::app_controller::Controller;
use nodeweave::session::SessionStore;
use nodeweave::translation::{FileCache, TranslationCache};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a plain-text document
    Translate(TranslateArgs),

    /// Inspect and manage persisted sessions
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Inspect and maintain the translation cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Generate shell completions for nodeweave
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum SessionAction {
    /// List persisted sessions, newest first
    List,
    /// Show one session with its node progress
    Show { id: String },
    /// Delete a session file
    Delete { id: String },
    /// Delete finished sessions older than the given number of days
    Cleanup {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Print entry count and size
    Stats,
    /// Delete entries older than the given number of days
    Prune {
        #[arg(long, default_value_t = 30)]
        days: u64,
    },
    /// Delete every entry
    Clear,
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Input document
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file (default: <stem>.<target>.<ext> next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Session id to resume or create
    #[arg(long, conflicts_with = "fresh")]
    session: Option<String>,

    /// Start a new session instead of resuming a previous run
    #[arg(long)]
    fresh: bool,

    /// Step set to use instead of the configured one
    #[arg(long)]
    step_set: Option<String>,

    /// Ignore cached stage results (new results are still cached)
    #[arg(long)]
    force_refresh: bool,

    /// Source language code (e.g., 'en', 'es', 'auto')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,
}

/// nodeweave - resumable multi-stage document translation
#[derive(Parser, Debug)]
#[command(name = "nodeweave")]
#[command(version)]
#[command(about = "Resumable multi-stage document translation")]
#[command(long_about = "nodeweave splits a document into nodes and runs every node through a
configurable translate / reflect / improve pipeline, caching each stage and
recording progress so an interrupted run can be resumed.

EXAMPLES:
    nodeweave translate notes.txt                  # Translate using default config
    nodeweave translate -t de notes.txt            # Translate to German
    nodeweave translate --step-set fast notes.txt  # Single-stage translation
    nodeweave sessions list                        # Show previous runs
    nodeweave cache prune --days 30                # Drop old cache entries
    nodeweave completions bash > nodeweave.bash    # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one using a local OpenAI-compatible model server is created.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Tag and ANSI colour for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("ERROR", "1;31"),
            Level::Warn => ("WARN ", "1;33"),
            Level::Info => ("INFO ", "1;32"),
            Level::Debug => ("DEBUG", "1;36"),
            Level::Trace => ("TRACE", "1;35"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (tag, colour) = Self::style_for_level(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {} {}\x1B[0m",
                colour,
                now,
                tag,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Trace is the logger's ceiling; the effective level is set below
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "nodeweave", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = load_config(&cli.config_path)?;
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    log::set_max_level(config.log_level.to_level_filter());

    match cli.command {
        Commands::Translate(args) => run_translate(config, args).await,
        Commands::Sessions { action } => run_sessions(&config, action).await,
        Commands::Cache { action } => run_cache(&config, action).await,
        Commands::Completions { .. } => Ok(()),
    }
}

// Load the config file, creating it with defaults when missing
fn load_config(path: &Path) -> Result<Config> {
    let (config, created) = Config::load_or_create(path)?;
    if created {
        warn!("Config file not found at {:?}, created a default one.", path);
    }
    Ok(config)
}

async fn run_translate(mut config: Config, args: TranslateArgs) -> Result<()> {
    if let Some(source) = args.source_language {
        config.source_language = source;
    }
    if let Some(target) = args.target_language {
        config.target_language = target;
    }
    if let Some(step_set) = args.step_set {
        config.active_step_set = step_set;
    }
    if args.force_refresh {
        config.engine.force_refresh = true;
    }

    if !args.input.is_file() {
        return Err(anyhow!("Input file does not exist: {:?}", args.input));
    }

    let controller = Controller::with_config(config)?;

    let cancel = controller.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight nodes. Rerun to resume.");
            cancel.cancel();
        }
    });

    let session_id = if args.fresh {
        Some(uuid::Uuid::new_v4().simple().to_string())
    } else {
        args.session
    };

    let result = controller
        .translate_file(&args.input, args.output.as_deref(), session_id.as_deref())
        .await?;

    if result.cancelled {
        warn!(
            "Cancelled: resume with --session {} ({} of {} nodes done)",
            result.session_id, result.completed_nodes, result.total_nodes
        );
    } else if result.failed_nodes > 0 {
        warn!(
            "Finished with {} failed node(s); rerun with --session {} to retry them",
            result.failed_nodes, result.session_id
        );
    } else {
        info!("Success: {}", result.output_file.display());
    }
    Ok(())
}

async fn run_sessions(config: &Config, action: SessionAction) -> Result<()> {
    let store = SessionStore::open(&config.engine.session_dir)
        .with_context(|| format!("Failed to open session directory {:?}", config.engine.session_dir))?;

    match action {
        SessionAction::List => {
            let sessions = store.list_sessions().await?;
            if sessions.is_empty() {
                println!("No sessions found.");
            }
            for session in sessions {
                println!(
                    "{}  {}",
                    session.last_update_time.format("%Y-%m-%d %H:%M"),
                    session
                );
            }
        }
        SessionAction::Show { id } => {
            let session = store.load_session(&id).await?;
            println!("{}", session);
            for progress in session.node_progress.values() {
                match &progress.error {
                    Some(error) => println!("  node {:>5}: {} ({})", progress.node_id, progress.status, error),
                    None => println!("  node {:>5}: {}", progress.node_id, progress.status),
                }
            }
            for error in &session.errors {
                println!("  {} {}", error.timestamp.format("%H:%M:%S"), error.message);
            }
        }
        SessionAction::Delete { id } => {
            if store.delete_session(&id).await? {
                println!("Deleted session {}", id);
            } else {
                println!("No session {}", id);
            }
        }
        SessionAction::Cleanup { days } => {
            let removed = store.cleanup_old_sessions(days).await?;
            println!("Removed {} session(s)", removed);
        }
    }
    Ok(())
}

async fn run_cache(config: &Config, action: CacheAction) -> Result<()> {
    let cache = FileCache::open(&config.engine.cache_dir)
        .with_context(|| format!("Failed to open cache directory {:?}", config.engine.cache_dir))?;

    match action {
        CacheAction::Stats => {
            let stats = cache.stats()?;
            println!(
                "{}: {} entries, {} bytes",
                cache.dir().display(),
                stats.entries,
                stats.total_bytes
            );
        }
        CacheAction::Prune { days } => {
            let max_age = Duration::from_secs(days * 24 * 60 * 60);
            let removed = cache.prune_older_than(max_age)?;
            println!("Removed {} entries older than {} days", removed, days);
        }
        CacheAction::Clear => {
            cache.clear().await?;
            println!("Cache cleared");
        }
    }
    Ok(())
}
