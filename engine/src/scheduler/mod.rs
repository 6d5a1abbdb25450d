//! Scheduler
//!
//! Drives time-based transitions: auto-start (with the countdown window),
//! per-round elimination ticks, and recovery after a process restart. One
//! logical writer per round: timer registries guarantee at most one
//! elimination driver exists for a round at any instant.
//!
//! The sweep loop re-runs the tick queries every `sweep_interval`, which
//! re-establishes timers lost to a restart; the mailbox wakes the loop early
//! when the service commits a state change, so timers attach without waiting
//! for the next sweep.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, MissedTickBehavior};
use uuid::Uuid;

use crate::core::clock::Clock;
use crate::core::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{types::EngineEvent, AbortReason, EventPublisher};
use crate::models::round::Round;
use crate::service::RoundService;
use crate::store::MemoryStore;

const COUNTDOWN_WINDOW_MS: i64 = 10_000;

/// Wakes the sweep loop when the service commits a state change.
///
/// The service publishes to this alongside the external fan-out; the mailbox
/// only nudges the scheduler, it never mutates anything itself.
#[derive(Debug, Default)]
pub struct SchedulerMailbox {
    notify: Notify,
}

impl SchedulerMailbox {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn wakeup(&self) {
        self.notify.notified().await
    }
}

impl EventPublisher for SchedulerMailbox {
    fn publish(&self, event: &EngineEvent) {
        match event {
            EngineEvent::RoundCreated { .. }
            | EngineEvent::RoundStarted { .. }
            | EngineEvent::RoundCompleted { .. }
            | EngineEvent::RoundAborted { .. } => self.notify.notify_one(),
            _ => {}
        }
    }
}

#[derive(Default)]
struct Timers {
    eliminators: Mutex<HashMap<Uuid, JoinHandle<()>>>,
    autostarts: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl Timers {
    fn gc(&self) {
        self.eliminators.lock().retain(|_, handle| !handle.is_finished());
        self.autostarts.lock().retain(|_, handle| !handle.is_finished());
    }

    fn abort_all(&self) {
        for (_, handle) in self.eliminators.lock().drain() {
            handle.abort();
        }
        for (_, handle) in self.autostarts.lock().drain() {
            handle.abort();
        }
    }
}

struct SchedulerInner {
    service: Arc<RoundService>,
    store: Arc<MemoryStore>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    mailbox: Arc<SchedulerMailbox>,
    sweep_interval: Duration,
    timers: Timers,
    shutdown_rx: watch::Receiver<bool>,
}

/// Single-writer timer driver for the round lifecycle.
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(
        service: Arc<RoundService>,
        store: Arc<MemoryStore>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        mailbox: Arc<SchedulerMailbox>,
        config: &EngineConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            inner: Arc::new(SchedulerInner {
                service,
                store,
                publisher,
                clock,
                mailbox,
                sweep_interval: config.sweep_interval(),
                timers: Timers::default(),
                shutdown_rx,
            }),
            shutdown_tx,
        }
    }

    /// Signal the run loop and every timer task to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Startup recovery: run the tick queries immediately, re-attaching
    /// elimination timers for rounds left InProgress and firing auto-start
    /// for Waiting rounds past their deadline.
    pub async fn recover(&self) {
        Self::sweep(&self.inner).await;
    }

    /// Sweep loop; returns after [`Self::shutdown`].
    pub async fn run(&self) {
        self.recover().await;

        let mut shutdown_rx = self.inner.shutdown_rx.clone();
        let mut ticker = tokio::time::interval(self.inner.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => Self::sweep(&self.inner).await,
                _ = self.inner.mailbox.wakeup() => Self::sweep(&self.inner).await,
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        self.inner.timers.abort_all();
        tracing::info!("scheduler stopped");
    }

    async fn sweep(inner: &Arc<SchedulerInner>) {
        let now = inner.clock.now();

        let waiting = inner.store.waiting_rounds();
        let waiting_ids: HashSet<Uuid> = waiting.iter().map(|r| r.id()).collect();
        for round in &waiting {
            if round.auto_start_at() <= now {
                Self::try_autostart(inner, round.id());
            } else {
                Self::ensure_autostart_timer(inner, round);
            }
        }

        // A round that left Waiting no longer needs its auto-start timer.
        inner.timers.autostarts.lock().retain(|round_id, handle| {
            if !waiting_ids.contains(round_id) {
                handle.abort();
                return false;
            }
            !handle.is_finished()
        });

        for round in inner.store.in_progress_rounds() {
            // Complete is synchronous with the final draw, so a round parked
            // at one survivor means a crash interrupted it: repair it here.
            if round.remaining() == 1 {
                match inner.service.complete(round.id()) {
                    Ok(_) => {
                        tracing::info!(round_id = %round.id(), "repaired stuck round")
                    }
                    Err(err) => {
                        tracing::warn!(round_id = %round.id(), %err, "repair failed")
                    }
                }
                continue;
            }
            Self::ensure_elimination_timer(inner, &round);
        }

        inner.timers.gc();
    }

    /// Start the round if it has enough participants, abort it otherwise.
    /// Losing a race against a manual transition is not an error.
    fn try_autostart(inner: &Arc<SchedulerInner>, round_id: Uuid) {
        let Some(round) = inner.store.round(round_id) else {
            return;
        };
        if !matches!(round.status(), crate::models::round::RoundStatus::Waiting) {
            return;
        }

        if round.participants().len() >= round.min_participants() {
            match inner.service.start(round_id) {
                Ok(_) => {}
                Err(EngineError::InvalidState(_)) => {}
                Err(err) => {
                    tracing::warn!(round_id = %round_id, %err, "auto-start failed, will retry on next sweep")
                }
            }
        } else {
            match inner
                .service
                .abort(round_id, AbortReason::InsufficientParticipants)
            {
                Ok(_) => {}
                Err(EngineError::InvalidState(_)) => {}
                Err(err) => {
                    tracing::warn!(round_id = %round_id, %err, "auto-abort failed, will retry on next sweep")
                }
            }
        }
    }

    /// Spawn the auto-start task for a Waiting round unless one is live.
    fn ensure_autostart_timer(inner: &Arc<SchedulerInner>, round: &Round) {
        let mut autostarts = inner.timers.autostarts.lock();
        if let Some(handle) = autostarts.get(&round.id()) {
            if !handle.is_finished() {
                return;
            }
        }

        let task_inner = Arc::clone(inner);
        let round_id = round.id();
        let auto_start_at = round.auto_start_at();

        let handle = tokio::spawn(async move {
            let mut shutdown_rx = task_inner.shutdown_rx.clone();

            loop {
                let millis = (auto_start_at - task_inner.clock.now()).num_milliseconds();
                if millis <= 0 {
                    break;
                }

                if millis > COUNTDOWN_WINDOW_MS {
                    let nap = Duration::from_millis((millis - COUNTDOWN_WINDOW_MS) as u64);
                    tokio::select! {
                        _ = sleep(nap) => {}
                        _ = shutdown_rx.changed() => return,
                    }
                } else {
                    let seconds_remaining = ((millis + 999) / 1_000) as u64;
                    task_inner.publisher.publish(&EngineEvent::RoundCountdown {
                        round_id,
                        seconds_remaining,
                    });
                    let nap = Duration::from_millis(millis.min(1_000) as u64);
                    tokio::select! {
                        _ = sleep(nap) => {}
                        _ = shutdown_rx.changed() => return,
                    }
                }
            }

            Self::try_autostart(&task_inner, round_id);
            task_inner.timers.autostarts.lock().remove(&round_id);
        });

        autostarts.insert(round.id(), handle);
        tracing::debug!(round_id = %round.id(), "auto-start timer attached");
    }

    /// Spawn the repeating elimination tick for an InProgress round unless
    /// one is live.
    fn ensure_elimination_timer(inner: &Arc<SchedulerInner>, round: &Round) {
        let mut eliminators = inner.timers.eliminators.lock();
        if let Some(handle) = eliminators.get(&round.id()) {
            if !handle.is_finished() {
                return;
            }
        }

        let task_inner = Arc::clone(inner);
        let round_id = round.id();
        let interval = round.elimination_interval();

        let handle = tokio::spawn(async move {
            let mut shutdown_rx = task_inner.shutdown_rx.clone();

            loop {
                tokio::select! {
                    _ = sleep(interval) => {}
                    _ = shutdown_rx.changed() => break,
                }

                match task_inner.service.eliminate_next(round_id) {
                    Ok(outcome) => {
                        if outcome.completion.is_some() {
                            break;
                        }
                    }
                    // The round left InProgress under us; the timer is done.
                    Err(EngineError::InvalidState(_)) | Err(EngineError::NotFound(_)) => break,
                    Err(err) => {
                        tracing::warn!(round_id = %round_id, %err, "elimination tick failed, retrying")
                    }
                }
            }

            task_inner.timers.eliminators.lock().remove(&round_id);
        });

        eliminators.insert(round.id(), handle);
        tracing::debug!(round_id = %round.id(), "elimination timer attached");
    }
}
