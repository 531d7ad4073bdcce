//! Wiring of desktop bridges, the Drive connector and the orchestrator.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bridge_desktop::{db, ReqwestHttpClient, SqliteAuditLog, SqliteStateStore, TokioScheduler};
use bridge_traits::time::SystemClock;
use core_revoke::{ContinueOutcome, Phase, RunDependencies, RunOrchestrator, RunReport, RunStatus};
use core_runtime::config::RevokeConfig;
use core_runtime::events::{CoreEvent, EventBus, EventSeverity, EventStream, RunEvent};
use core_runtime::notify::LogNotifier;
use provider_google_drive::GoogleDriveConnector;
use tracing::{debug, error, info, warn};

use crate::args::{Cli, Commands};

pub async fn execute(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;
    let orchestrator = build_orchestrator(&cli, config).await?;

    match cli.command {
        Commands::Run => run_foreground(&orchestrator, cli.verbose).await,
        Commands::Start => {
            let state = orchestrator.start().await?;
            println!("Run {} ready in phase {}", state.run_id, state.phase);
            println!("Use `drive-revoke continue` or `drive-revoke run` to process items.");
            Ok(())
        }
        Commands::Continue => {
            let outcome = orchestrator.continue_run().await?;
            print_outcome(&outcome);
            Ok(())
        }
        Commands::Stop => {
            let state = orchestrator.stop().await?;
            println!(
                "Run stopped during {} after {} items; `drive-revoke start` resumes it.",
                state.phase, state.counters.items_processed
            );
            Ok(())
        }
        Commands::Reset { yes } => {
            if !yes {
                bail!("Reset erases run state and the audit log; pass --yes to confirm");
            }
            orchestrator.reset().await?;
            println!("Run state and audit log cleared.");
            Ok(())
        }
        Commands::Status { json } => {
            let report = orchestrator.status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_status(&report);
            }
            Ok(())
        }
    }
}

fn build_config(cli: &Cli) -> Result<RevokeConfig> {
    let database_path = match &cli.database {
        Some(path) => path.clone(),
        None => default_database_path()?,
    };

    RevokeConfig::builder()
        .database_path(database_path)
        .time_budget(Duration::from_secs(cli.time_budget_secs))
        .schedule_interval(Duration::from_secs(cli.interval_secs))
        .page_size(cli.page_size)
        .build()
        .context("Invalid configuration")
}

fn default_database_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("Could not determine the user data directory")?;
    Ok(data_dir.join("drive-revoke").join("state.db"))
}

async fn build_orchestrator(cli: &Cli, config: RevokeConfig) -> Result<Arc<RunOrchestrator>> {
    let access_token = match (&cli.access_token, cli.command.needs_remote()) {
        (Some(token), _) if !token.trim().is_empty() => token.clone(),
        (_, true) => {
            return Err(core_runtime::Error::capability_missing(
                "AccessToken",
                "pass --access-token or set DRIVE_REVOKE_ACCESS_TOKEN",
            )
            .into())
        }
        // Local-only commands never reach the connector
        (_, false) => String::new(),
    };

    let pool = db::connect_file(&config.database_path)
        .await
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;
    let state_store = SqliteStateStore::with_pool(pool.clone()).await?;
    let audit = SqliteAuditLog::with_pool(pool).await?;

    let http = ReqwestHttpClient::new()?;
    let connector = Arc::new(
        GoogleDriveConnector::new(Arc::new(http), access_token).with_page_size(config.page_size),
    );

    let deps = RunDependencies {
        source: connector.clone(),
        sharing: connector,
        state_store: Arc::new(state_store),
        audit: Arc::new(audit),
        scheduler: Arc::new(TokioScheduler::new()),
        notifier: Arc::new(LogNotifier),
        clock: Arc::new(SystemClock),
        events: EventBus::new(config.event_buffer_size),
    };

    info!(database = %config.database_path.display(), "Opened run state");
    Ok(Arc::new(RunOrchestrator::new(config, deps)))
}

/// Starts (or picks up) the run and logs its events until it completes,
/// halts or Ctrl+C stops it.
async fn run_foreground(orchestrator: &Arc<RunOrchestrator>, verbose: bool) -> Result<()> {
    let mut events = EventStream::new(orchestrator.events().subscribe())
        .filter(move |event| verbose || event.severity() >= EventSeverity::Info);

    let status = orchestrator.status().await?.status;
    let state = match status {
        RunStatus::Files | RunStatus::Folders => orchestrator.attach().await?,
        _ => orchestrator.start().await?,
    };
    println!("Run {} in progress ({}); Ctrl+C stops it.", state.run_id, state.phase);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "Event stream closed before completion");
                        return Ok(());
                    }
                };
                log_event(&event);

                match event {
                    CoreEvent::Run(RunEvent::Completed {
                        items_processed,
                        permissions_removed,
                        errors,
                        duration_secs,
                        ..
                    }) => {
                        println!(
                            "Done: {} items processed, {} permissions removed, {} errors in {}s.",
                            items_processed, permissions_removed, errors, duration_secs
                        );
                        return Ok(());
                    }
                    CoreEvent::Run(RunEvent::Halted { message, .. }) => {
                        bail!("Run halted, progress is saved: {}", message);
                    }
                    _ => {}
                }
            }
            signal = &mut ctrl_c => {
                signal.context("Failed to listen for Ctrl+C")?;
                let state = orchestrator.stop().await?;
                println!(
                    "Stopped during {} after {} items; progress saved.",
                    state.phase, state.counters.items_processed
                );
                return Ok(());
            }
        }
    }
}

fn log_event(event: &CoreEvent) {
    let CoreEvent::Run(run) = event;
    let detail = match run {
        RunEvent::ItemProcessed {
            item_name,
            removed,
            errors,
            ..
        } => format!("{} ({} removed, {} errors)", item_name, removed, errors),
        RunEvent::Checkpoint {
            items_processed, ..
        } => format!("{} items", items_processed),
        RunEvent::PhaseStarted { phase, .. } | RunEvent::PhaseCompleted { phase, .. } => {
            phase.clone()
        }
        RunEvent::PhaseFailed { message, .. } | RunEvent::Halted { message, .. } => {
            message.clone()
        }
        _ => String::new(),
    };

    match event.severity() {
        EventSeverity::Debug => debug!(detail = %detail, "{}", event.description()),
        EventSeverity::Info => info!(detail = %detail, "{}", event.description()),
        EventSeverity::Warning => warn!(detail = %detail, "{}", event.description()),
        EventSeverity::Error => error!(detail = %detail, "{}", event.description()),
    }
}

fn print_outcome(outcome: &ContinueOutcome) {
    match outcome {
        ContinueOutcome::Busy => println!("Another invocation is already running."),
        ContinueOutcome::Idle => println!("No run started; use `drive-revoke start`."),
        ContinueOutcome::Stopped => println!("Run is stopped; use `drive-revoke start` to resume."),
        ContinueOutcome::Progressed { phase, report } => println!(
            "{}: {} items processed, {} removed, {} errors; more to do.",
            phase, report.processed, report.removed, report.errors
        ),
        ContinueOutcome::PhaseAdvanced {
            completed,
            next,
            report,
        } => println!(
            "{} complete ({} items this slice); next phase: {}.",
            completed, report.processed, next
        ),
        ContinueOutcome::Completed(summary) => println!(
            "Run complete: {} items processed, {} permissions removed, {} errors.",
            summary.items_processed, summary.permissions_removed, summary.errors
        ),
        ContinueOutcome::AlreadyComplete => println!("Run already complete."),
    }
}

fn print_status(report: &RunReport) {
    let state = &report.state;
    println!("Status:              {}", report.status);
    if state.phase != Phase::NotStarted {
        println!("Run:                 {}", state.run_id);
    }
    println!("Items processed:     {}", state.counters.items_processed);
    println!("Permissions removed: {}", state.counters.permissions_removed);
    println!("Errors:              {}", state.counters.errors);
    if let Some(started_at) = state.started_at {
        println!("Started:             {}", started_at.to_rfc3339());
    }
    if let Some(updated_at) = state.last_updated_at {
        println!("Last update:         {}", updated_at.to_rfc3339());
    }
    println!(
        "Audit log:           {} removals, {} errors",
        report.audit.removals, report.audit.errors
    );
}
