use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

mod commands;

use app_warden::engine::PolicyEngine;
use app_warden::store::{FileStore, KeyValueStore};

/// The warden's own application identifier; the evaluator excludes it from
/// every block decision so the controlling app can never lock itself out.
const OWN_APP_ID: &str = env!("CARGO_PKG_NAME");

/// Application Restriction Policy Manager
///
/// Decides which applications are currently blocked - individually or through
/// schedule-bound groups - and keeps bounded logs of blocking activity.
#[derive(Parser, Debug)]
#[command(name = "app-warden")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding warden state (defaults to the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check whether an app is blocked right now
    Check {
        /// Application identifier (e.g. com.example.game)
        app: String,
    },
    /// Manage individually restricted apps
    Apps {
        #[command(subcommand)]
        command: AppsCommands,
    },
    /// Manage schedule-bound restriction groups
    Group {
        #[command(subcommand)]
        command: GroupCommands,
    },
    /// Manage the temporary unlock window
    Unlock {
        #[command(subcommand)]
        command: UnlockCommands,
    },
    /// Record events observed by external collaborators
    Record {
        #[command(subcommand)]
        command: RecordCommands,
    },
    /// Inspect and clear the activity logs
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
    /// Import, export, and scaffold policy files
    Policy {
        #[command(subcommand)]
        command: PolicyCommands,
    },
}

#[derive(Subcommand, Debug)]
enum AppsCommands {
    /// Toggle an app's individual restriction
    Toggle { app: String },
    /// List individually restricted apps
    List,
}

#[derive(Subcommand, Debug)]
enum GroupCommands {
    /// Create a new group
    Create {
        /// Unique group name
        name: String,

        /// Comma-separated member app identifiers
        #[arg(long)]
        members: Option<String>,

        /// Window start, HH:MM
        #[arg(long)]
        start: String,

        /// Window end, HH:MM (at or before start wraps midnight)
        #[arg(long)]
        end: String,
    },
    /// Replace a group's members and schedule
    Update {
        name: String,

        /// Comma-separated member app identifiers
        #[arg(long)]
        members: Option<String>,

        /// Window start, HH:MM
        #[arg(long)]
        start: String,

        /// Window end, HH:MM
        #[arg(long)]
        end: String,
    },
    /// Delete a group
    Delete { name: String },
    /// Enable a group
    Enable { name: String },
    /// Disable a group without deleting it
    Disable { name: String },
    /// List all groups
    List,
}

#[derive(Subcommand, Debug)]
enum UnlockCommands {
    /// Suspend all restrictions for a while
    Grant {
        /// Unlock duration in minutes
        #[arg(long, default_value = "5")]
        minutes: u32,
    },
    /// End the unlock immediately
    Clear,
    /// Show remaining unlock time
    Status,
}

#[derive(Subcommand, Debug)]
enum RecordCommands {
    /// Record that an app was blocked
    Block { app: String },
    /// Record a notification captured from a restricted app
    Notification {
        app: String,

        #[arg(long)]
        title: String,

        #[arg(long)]
        content: String,
    },
    /// Record a protection coverage span
    Session {
        /// Span start, epoch milliseconds
        #[arg(long)]
        start_ms: i64,

        /// Span end, epoch milliseconds
        #[arg(long)]
        end_ms: i64,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryCommands {
    /// Show recorded blocks, most recent first
    Blocks {
        #[arg(long)]
        limit: Option<usize>,

        /// Clear the log instead of listing it
        #[arg(long)]
        clear: bool,
    },
    /// Show captured notifications, most recent first
    Notifications {
        #[arg(long)]
        limit: Option<usize>,

        /// Clear the log instead of listing it
        #[arg(long)]
        clear: bool,
    },
    /// Show recorded sessions, most recent first
    Sessions {
        #[arg(long)]
        limit: Option<usize>,

        /// Show coverage totals instead of individual sessions
        #[arg(long)]
        stats: bool,

        /// Clear the log instead of listing it
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Subcommand, Debug)]
enum PolicyCommands {
    /// Write an example policy file to edit
    Init {
        /// Output path (defaults to ./app-warden-policy.yaml)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Export the active policy to a YAML file
    Export { path: PathBuf },
    /// Import a YAML policy file, replacing apps and groups
    Import { path: PathBuf },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    // Scaffolding a policy file needs no engine
    if let Commands::Policy {
        command: PolicyCommands::Init { output, force },
    } = &args.command
    {
        return commands::policy_file::init(output.clone(), *force);
    }

    let engine = open_engine(args.data_dir)?;

    match args.command {
        Commands::Check { app } => commands::restrict::check(&engine, &app),
        Commands::Apps { command } => match command {
            AppsCommands::Toggle { app } => commands::restrict::toggle(&engine, &app),
            AppsCommands::List => commands::restrict::list(&engine),
        },
        Commands::Group { command } => match command {
            GroupCommands::Create {
                name,
                members,
                start,
                end,
            } => commands::groups::create(&engine, name, members, &start, &end),
            GroupCommands::Update {
                name,
                members,
                start,
                end,
            } => commands::groups::update(&engine, &name, members, &start, &end),
            GroupCommands::Delete { name } => commands::groups::delete(&engine, &name),
            GroupCommands::Enable { name } => commands::groups::set_enabled(&engine, &name, true),
            GroupCommands::Disable { name } => {
                commands::groups::set_enabled(&engine, &name, false)
            }
            GroupCommands::List => commands::groups::list(&engine),
        },
        Commands::Unlock { command } => match command {
            UnlockCommands::Grant { minutes } => commands::restrict::unlock_grant(&engine, minutes),
            UnlockCommands::Clear => commands::restrict::unlock_clear(&engine),
            UnlockCommands::Status => commands::restrict::unlock_status(&engine),
        },
        Commands::Record { command } => match command {
            RecordCommands::Block { app } => commands::history::record_block(&engine, &app),
            RecordCommands::Notification {
                app,
                title,
                content,
            } => commands::history::record_notification(&engine, &app, &title, &content),
            RecordCommands::Session { start_ms, end_ms } => {
                commands::history::record_session(&engine, start_ms, end_ms)
            }
        },
        Commands::History { command } => match command {
            HistoryCommands::Blocks { limit, clear } => {
                if clear {
                    commands::history::clear_blocks(&engine)
                } else {
                    commands::history::blocks(&engine, limit)
                }
            }
            HistoryCommands::Notifications { limit, clear } => {
                if clear {
                    commands::history::clear_notifications(&engine)
                } else {
                    commands::history::notifications(&engine, limit)
                }
            }
            HistoryCommands::Sessions {
                limit,
                stats,
                clear,
            } => {
                if clear {
                    commands::history::clear_sessions(&engine)
                } else if stats {
                    commands::history::session_stats(&engine)
                } else {
                    commands::history::sessions(&engine, limit)
                }
            }
        },
        Commands::Policy { command } => match command {
            PolicyCommands::Init { .. } => unreachable!("handled before engine open"),
            PolicyCommands::Export { path } => commands::policy_file::export(&engine, &path),
            PolicyCommands::Import { path } => commands::policy_file::import(&engine, &path),
        },
    }
}

/// Open the engine over the file store, constructed once per process
fn open_engine(data_dir: Option<PathBuf>) -> Result<PolicyEngine> {
    let store: Arc<dyn KeyValueStore> = match data_dir {
        Some(dir) => Arc::new(FileStore::new(dir)),
        None => Arc::new(FileStore::open_default()?),
    };

    Ok(PolicyEngine::open(store, OWN_APP_ID)?)
}

/// Initialize logging
fn init_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}
