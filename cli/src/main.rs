//! Spinwheel CLI
//!
//! Boots the engine against the in-memory store and runs one demonstration
//! round end to end: an admin creates the round, three players join, the
//! scheduler fires the countdown and auto-start, eliminations tick until a
//! winner is paid out. Every event is printed as a JSON line as it arrives.
//!
//! Exit code 0 on clean shutdown, non-zero on startup failure.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use spinwheel_engine::{
    Clock, EngineConfig, Envelope, EventFanout, EventPublisher, MemoryStore, MultiPublisher,
    Role, RoundService, Scheduler, SchedulerMailbox, SystemClock,
};

/// Read the config from the path given as the first argument, or fall back
/// to demo timings short enough to watch.
fn load_config() -> Result<EngineConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path))?;
            let config: EngineConfig = serde_json::from_str(&raw)
                .with_context(|| format!("parsing config file {}", path))?;
            Ok(config)
        }
        None => Ok(EngineConfig {
            auto_start_delay_ms: 12_000,
            elimination_interval_ms: 1_500,
            sweep_interval_ms: 5_000,
            ..EngineConfig::default()
        }),
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("startup failed: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    config.validate().context("invalid configuration")?;

    // Only main constructs the shared handles; everything else borrows them.
    let store = Arc::new(MemoryStore::new());
    let fanout = Arc::new(EventFanout::default());
    let mailbox = SchedulerMailbox::new();
    let publisher: Arc<dyn EventPublisher> = Arc::new(MultiPublisher::new(vec![
        fanout.clone() as Arc<dyn EventPublisher>,
        mailbox.clone() as Arc<dyn EventPublisher>,
    ]));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let service = Arc::new(RoundService::new(
        store.clone(),
        config.clone(),
        clock.clone(),
        publisher.clone(),
    ));
    let scheduler = Arc::new(Scheduler::new(
        service.clone(),
        store,
        publisher,
        clock,
        mailbox,
        &config,
    ));

    let mut events = fanout.subscribe();

    let admin = service.register_account("admin", Role::Admin)?;
    let players = vec![
        service.register_account("alice", Role::User)?,
        service.register_account("bob", Role::User)?,
        service.register_account("carol", Role::User)?,
    ];

    let round = service.create_round(admin.id(), 100, 10)?;
    for player in &players {
        service.join(round.id(), player.id())?;
    }
    tracing::info!(
        round_id = %round.id(),
        auto_start_at = %round.auto_start_at(),
        "demo round ready, waiting for auto-start"
    );

    let runner = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    };

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    println!("{}", serde_json::to_string(&event)?);
                    if event.is_terminal() {
                        break;
                    }
                }
                // Dropped behind; authoritative state lives in the store.
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, shutting down");
                break;
            }
        }
    }

    for account in players.iter().chain(std::iter::once(&admin)) {
        let balance: Envelope<i64> = service.get_balance(account.id()).into();
        println!(
            "{} {}",
            account.name(),
            serde_json::to_string(&balance)?
        );
    }

    scheduler.shutdown();
    let _ = runner.await;
    Ok(())
}
