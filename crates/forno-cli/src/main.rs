use anyhow::Context;
use clap::{Parser, Subcommand};
use forno_core::FornoConfig;
use forno_jobs::{build_registry, default_jobs, BusinessCalendar};
use forno_scheduler::{RetryPolicy, SchedulerEngine, SchedulerHandle};
use rusqlite::Connection;
use tracing::{info, warn};

mod output;

#[derive(Parser)]
#[command(name = "forno", version, about = "Scheduled sales and inventory jobs for the pizzeria database")]
struct Cli {
    /// Config file (defaults to $FORNO_CONFIG, then ~/.forno/forno.toml).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler until Ctrl-C.
    Serve,
    /// Register the default jobs. Jobs that already exist are left alone.
    Install,
    /// Inspect and manage jobs.
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },
    /// Switch the whole scheduler on or off.
    Scheduler {
        #[command(subcommand)]
        action: SchedulerAction,
    },
    /// Execute a task right now, outside its schedule.
    Run {
        /// Task key, e.g. `daily_summary`.
        task: String,
    },
}

#[derive(Subcommand)]
enum JobsAction {
    List {
        #[arg(long)]
        json: bool,
    },
    Enable { name: String },
    Disable { name: String },
    Drop { name: String },
    /// Most recent runs, newest first.
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SchedulerAction {
    On,
    Off,
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "forno_cli=info,forno_scheduler=info,forno_jobs=info,forno_store=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // explicit --config > FORNO_CONFIG env > ~/.forno/forno.toml
    let config_path = cli.config.clone().or_else(|| std::env::var("FORNO_CONFIG").ok());
    let config = FornoConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        FornoConfig::default()
    });

    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = open_db(&config)?;
    forno_store::db::init_db(&db)?;
    forno_scheduler::db::init_db(&db)?;

    let handle = SchedulerHandle::new(open_db(&config)?)?;

    match cli.command {
        Command::Serve => serve(&config).await?,
        Command::Install => {
            let calendar = BusinessCalendar::from_config(&config.business)?;
            for spec in default_jobs(chrono::Utc::now(), &calendar) {
                match handle.ensure_job(&spec)? {
                    Some(job) => println!("installed {} (next run {})", job.name, output::ts(job.next_run)),
                    None => println!("{} already installed", spec.name),
                }
            }
        }
        Command::Jobs { action } => match action {
            JobsAction::List { json } => {
                let jobs = handle.list_jobs()?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&jobs)?);
                } else {
                    output::print_jobs(&jobs);
                }
            }
            JobsAction::Enable { name } => {
                let job = handle.enable_job(&name)?;
                println!("{} enabled, next run {}", job.name, output::ts(job.next_run));
            }
            JobsAction::Disable { name } => {
                handle.disable_job(&name)?;
                println!("{name} disabled");
            }
            JobsAction::Drop { name } => {
                handle.drop_job(&name)?;
                println!("{name} dropped");
            }
            JobsAction::History { limit, json } => {
                let runs = handle.run_history(limit)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&runs)?);
                } else {
                    output::print_runs(&runs);
                }
            }
        },
        Command::Scheduler { action } => match action {
            SchedulerAction::On => {
                handle.enable_scheduler()?;
                println!("scheduler on");
            }
            SchedulerAction::Off => {
                handle.disable_scheduler()?;
                println!("scheduler off");
            }
            SchedulerAction::Status => {
                let state = if handle.scheduler_enabled()? { "on" } else { "off" };
                println!("scheduler {state}");
            }
        },
        Command::Run { task } => {
            let registry = build_registry(&config.business)?;
            let report = handle
                .run_now(&registry, &task)
                .with_context(|| format!("task {task} failed"))?;
            println!("{task}: {} row(s); {}", report.rows_affected, report.detail);
        }
    }

    Ok(())
}

async fn serve(config: &FornoConfig) -> anyhow::Result<()> {
    let registry = build_registry(&config.business)?;
    let engine = SchedulerEngine::new(
        open_db(config)?,
        registry,
        RetryPolicy::from_config(&config.scheduler),
    )?;
    let poll = std::time::Duration::from_secs(config.scheduler.poll_interval_secs.max(1));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let engine_task = tokio::spawn(async move { engine.run(poll, shutdown_rx).await });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    engine_task.await?;
    Ok(())
}

/// One connection per subsystem, all on the same file.
fn open_db(config: &FornoConfig) -> anyhow::Result<Connection> {
    let db = Connection::open(&config.database.path)
        .with_context(|| format!("opening {}", config.database.path))?;
    db.busy_timeout(std::time::Duration::from_millis(config.database.busy_timeout_ms))?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(db)
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_nested_subcommands() {
        let cli = Cli::try_parse_from(["forno", "--config", "/tmp/f.toml", "jobs", "history", "--limit", "5"])
            .unwrap();
        assert_eq!(cli.config.as_deref(), Some("/tmp/f.toml"));
        assert!(matches!(
            cli.command,
            Command::Jobs { action: JobsAction::History { limit: 5, json: false } }
        ));

        let cli = Cli::try_parse_from(["forno", "run", "daily_summary"]).unwrap();
        assert!(matches!(cli.command, Command::Run { ref task } if task == "daily_summary"));
    }
}
