//! CLI command definitions and subcommands

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;

/// Nudger - daily-cycle companion
#[derive(Parser)]
#[command(
    name = "nudger",
    about = "Daily-cycle nudging companion for people with ADHD",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the companion: Telegram, scheduler and health socket
    Run,

    /// Chat in the terminal with the scheduler running
    Chat,

    /// Show the current phase and next check-in
    Status {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show or change check-in times
    Schedule {
        #[command(subcommand)]
        command: Option<ScheduleCommand>,
    },

    /// Show today's plan
    Plan {
        /// Also list this many archived plans
        #[arg(long, value_name = "N")]
        history: Option<usize>,
    },

    /// Ask a running companion for its health
    Health,

    /// Stop a running companion
    Stop,

    /// Show logs
    Logs {
        /// Follow log output (like tail -f)
        #[arg(short, long)]
        follow: bool,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

/// Schedule subcommands
#[derive(Debug, Subcommand)]
pub enum ScheduleCommand {
    /// Print the schedule
    Show,

    /// Move one phase's check-in time
    Set {
        /// Phase name (e.g. midday_checkin, evening)
        phase: String,

        /// Time as HH:MM
        time: String,
    },

    /// Set the default grace period in minutes
    Grace { minutes: u32 },

    /// Send a heads-up this many minutes before each check-in
    Remind {
        /// Lead time in minutes
        #[arg(conflicts_with = "off", required_unless_present = "off")]
        minutes: Option<u32>,

        /// Turn reminders off
        #[arg(long)]
        off: bool,
    },
}

/// Output format for status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nudger")
        .join("logs")
        .join("nudger.log");
    debug!(?path, "get_log_path: returning path");
    path
}
