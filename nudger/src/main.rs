//! Nudger - daily-cycle companion
//!
//! CLI entry point: runs the companion and inspects its saved state.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use eyre::{Context, Result};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use nudger::calendar::create_calendar;
use nudger::chat::{ChatSession, ChatTransport, ConsoleTransport, FrontEnd, TelegramTransport};
use nudger::cli::{Cli, Command, OutputFormat, ScheduleCommand, get_log_path};
use nudger::companion::{Companion, CompanionDeps, CompanionState};
use nudger::config::Config;
use nudger::domain::{CompanionSnapshot, Phase, UserProfile};
use nudger::engine::ConversationEngine;
use nudger::interrupts::InterruptPolicy;
use nudger::ipc::{self, HealthClient, HealthServer};
use nudger::llm::create_client;
use nudger::prompts::PromptLoader;
use nudger::scheduler::{ScheduleConfig, SchedulerStatus, parse_hhmm};
use nudger::state::StateManager;
use nudger::store::JsonStore;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(user = %config.user.id, data_dir = %config.storage.data_dir, "Nudger loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run => cmd_run(&config).await,
        Command::Chat => cmd_chat(&config).await,
        Command::Status { format } => cmd_status(&config, format),
        Command::Schedule { command } => cmd_schedule(&config, command.unwrap_or(ScheduleCommand::Show)),
        Command::Plan { history } => cmd_plan(&config, history),
        Command::Health => cmd_health(&config).await,
        Command::Stop => cmd_stop(&config).await,
        Command::Logs { follow, lines } => cmd_logs(follow, lines),
    }
}

/// Wire the companion around `transport`
async fn build_companion(
    config: &Config,
    transport: Arc<dyn ChatTransport>,
) -> Result<(Arc<Companion>, StateManager)> {
    debug!(transport = transport.name(), "build_companion: called");
    let store = StateManager::spawn(&config.storage.data_dir, &config.user.id)?;

    let llm = match create_client(&config.llm) {
        Ok(client) => Some(client),
        Err(e) => {
            warn!(error = %e, "LLM unavailable, using fallback messages");
            None
        }
    };

    let deps = CompanionDeps {
        store: store.clone(),
        prompts: PromptLoader::with_default_dirs(),
        engine: ConversationEngine::new(llm, &config.llm),
        calendar: create_calendar(&config.calendar),
        transport,
        policy: InterruptPolicy::from_config(&config.interrupts),
    };
    let companion = Companion::restore(deps, &config.user, config.schedule.clone(), Local::now().naive_local())
        .await
        .context("Failed to restore companion state")?;
    Ok((companion, store))
}

/// Run with Telegram, the scheduler and the health socket until stopped
async fn cmd_run(config: &Config) -> Result<()> {
    debug!("cmd_run: called");
    let telegram = TelegramTransport::from_config(&config.telegram).context("Telegram is not configured")?;
    let telegram = Arc::new(telegram.with_store(open_store(config)?));
    let (companion, store) = build_companion(config, telegram.clone()).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    let front = FrontEnd::new(companion);
    let scheduler = front.scheduler().clone();

    let socket_path = ipc::get_socket_path(&config.health);
    let health = HealthServer::bind(socket_path.clone(), scheduler.clone(), shutdown_tx.clone())?;

    let (inbound_tx, inbound_rx) = mpsc::channel(32);
    let poller = {
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { telegram.poll(inbound_tx, shutdown).await })
    };
    let ticker = {
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };
    let responder = tokio::spawn(async move { front.serve(inbound_rx, shutdown_rx).await });
    let health = tokio::spawn(health.run());

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, shutting down");
                let _ = shutdown.send(true);
            }
        });
    }

    println!("Nudger is running (health socket: {}). Press Ctrl+C to stop.", socket_path.display());
    let _ = tokio::join!(poller, ticker, responder, health);

    store.shutdown().await?;
    println!("Nudger stopped");
    Ok(())
}

/// Chat in the terminal with the scheduler running in the background
async fn cmd_chat(config: &Config) -> Result<()> {
    debug!("cmd_chat: called");
    let (companion, store) = build_companion(config, Arc::new(ConsoleTransport)).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let front = FrontEnd::new(companion);
    let ticker = {
        let scheduler = front.scheduler().clone();
        tokio::spawn(async move { scheduler.run(shutdown_rx).await })
    };

    let result = ChatSession::new(front).run().await;

    let _ = shutdown_tx.send(true);
    let _ = ticker.await;
    store.shutdown().await?;
    result
}

fn open_store(config: &Config) -> Result<JsonStore> {
    JsonStore::open(&config.storage.data_dir, &config.user.id).context("Failed to open data directory")
}

/// Saved schedule override, else the configured schedule
fn effective_schedule(store: &JsonStore, config: &Config) -> Result<ScheduleConfig> {
    let saved: Option<ScheduleConfig> = store.load().context("Failed to read saved schedule")?;
    Ok(saved.unwrap_or_else(|| config.schedule.clone()))
}

/// Print status from the saved snapshot
fn cmd_status(config: &Config, format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_status: called");
    let store = open_store(config)?;
    let Some(snapshot) = store.load::<CompanionSnapshot>().context("Failed to read snapshot")? else {
        println!("No saved state yet. Start with `nudger run` or `nudger chat`.");
        return Ok(());
    };

    let schedule = effective_schedule(&store, config)?;
    let profile = store
        .load::<UserProfile>()
        .context("Failed to read profile")?
        .unwrap_or_else(|| UserProfile::new(&config.user.id, &config.user.name));
    let state = CompanionState::from_snapshot(&snapshot, schedule, profile);
    let status = SchedulerStatus::from_state(&state, Local::now().naive_local());

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
        OutputFormat::Text => {
            println!("Nudger Status");
            println!("-------------");
            println!("{}", status.describe());
            println!("Last updated: {}", snapshot.updated_at.format("%Y-%m-%d %H:%M"));
        }
    }
    Ok(())
}

fn cmd_schedule(config: &Config, command: ScheduleCommand) -> Result<()> {
    debug!(?command, "cmd_schedule: called");
    let store = open_store(config)?;
    let mut schedule = effective_schedule(&store, config)?;

    match command {
        ScheduleCommand::Show => {
            print!("{}", schedule.describe());
            return Ok(());
        }
        ScheduleCommand::Set { phase, time } => {
            let phase: Phase = phase.parse()?;
            let at = parse_hhmm(&time)?;
            schedule.set_time(phase, at)?;
        }
        ScheduleCommand::Grace { minutes } => {
            schedule.set_grace(minutes)?;
        }
        ScheduleCommand::Remind { minutes, off } => {
            schedule.set_reminder(if off { None } else { minutes })?;
        }
    }

    store.save(&schedule).context("Failed to save schedule")?;
    print!("{}", schedule.describe());
    println!("A running companion picks this up on its next restart; use /schedule in chat to change it live.");
    Ok(())
}

fn cmd_plan(config: &Config, history: Option<usize>) -> Result<()> {
    debug!(?history, "cmd_plan: called");
    let store = open_store(config)?;
    match store.load::<CompanionSnapshot>().context("Failed to read snapshot")? {
        Some(snapshot) => println!("{}", snapshot.plan.summary()),
        None => println!("No plan yet today."),
    }

    if let Some(limit) = history {
        let plans = store.plan_history(limit).context("Failed to read plan history")?;
        if plans.is_empty() {
            println!("No past plans yet.");
        }
        for plan in plans {
            println!();
            println!("{}", plan.summary());
        }
    }
    Ok(())
}

async fn cmd_health(config: &Config) -> Result<()> {
    debug!("cmd_health: called");
    let client = HealthClient::with_socket_path(ipc::get_socket_path(&config.health));
    if !client.socket_exists() {
        println!("Nudger is not running");
        return Ok(());
    }

    let version = client.ping().await.context("Companion is not responding")?;
    let report = client.health().await?;
    println!("Nudger {} is {}", version, report.status);
    println!("Current phase: {}", report.current_phase.title());
    if report.interrupted {
        println!("Support mode is active");
    }
    Ok(())
}

async fn cmd_stop(config: &Config) -> Result<()> {
    debug!("cmd_stop: called");
    let client = HealthClient::with_socket_path(ipc::get_socket_path(&config.health));
    if !client.socket_exists() {
        println!("Nudger is not running");
        return Ok(());
    }

    client.shutdown().await?;

    let mut attempts = 0;
    while client.socket_exists() && attempts < 50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        attempts += 1;
    }
    println!("Nudger stopped");
    Ok(())
}

fn cmd_logs(follow: bool, lines: usize) -> Result<()> {
    debug!(follow, lines, "cmd_logs: called");
    let log_path: PathBuf = get_log_path();

    if !log_path.exists() {
        println!("No log file found at: {}", log_path.display());
        return Ok(());
    }

    if follow {
        println!("Following log file: {} (Ctrl+C to stop)", log_path.display());
        println!();
        let mut child = std::process::Command::new("tail")
            .args(["-f", "-n", &lines.to_string()])
            .arg(&log_path)
            .spawn()
            .context("Failed to run tail -f")?;
        child.wait()?;
    } else {
        let file = fs::File::open(&log_path).context("Failed to open log file")?;
        let all_lines: Vec<String> = BufReader::new(file).lines().map_while(Result::ok).collect();
        let start = all_lines.len().saturating_sub(lines);
        for line in &all_lines[start..] {
            println!("{}", line);
        }
    }
    Ok(())
}
