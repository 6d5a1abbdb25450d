//! Subscriber fan-out
//!
//! One firehose channel for every public event, one lazily created room per
//! round, and per-account channels for private events. Sends are best-effort:
//! a send with no receivers is dropped, and a lagging receiver observes
//! `Lagged` and must reconcile by re-reading the authoritative round.

use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::events::types::EngineEvent;
use crate::events::EventPublisher;

const DEFAULT_CAPACITY: usize = 256;

/// Routes committed events to subscribers.
pub struct EventFanout {
    firehose: broadcast::Sender<EngineEvent>,
    rooms: Mutex<HashMap<Uuid, broadcast::Sender<EngineEvent>>>,
    accounts: Mutex<HashMap<Uuid, broadcast::Sender<EngineEvent>>>,
    capacity: usize,
}

impl Default for EventFanout {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventFanout {
    pub fn new(capacity: usize) -> Self {
        let (firehose, _) = broadcast::channel(capacity);
        Self {
            firehose,
            rooms: Mutex::new(HashMap::new()),
            accounts: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Subscribe to every public event.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.firehose.subscribe()
    }

    /// Enter the room for one round.
    pub fn join_room(&self, round_id: Uuid) -> broadcast::Receiver<EngineEvent> {
        let mut rooms = self.rooms.lock();
        rooms
            .entry(round_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Subscribe to events addressed privately to one account.
    pub fn subscribe_account(&self, account_id: Uuid) -> broadcast::Receiver<EngineEvent> {
        let mut accounts = self.accounts.lock();
        accounts
            .entry(account_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Number of open rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.lock().len()
    }
}

impl EventPublisher for EventFanout {
    fn publish(&self, event: &EngineEvent) {
        if let Some(account_id) = event.audience() {
            if let Some(sender) = self.accounts.lock().get(&account_id) {
                let _ = sender.send(event.clone());
            }
            return;
        }

        let _ = self.firehose.send(event.clone());

        let mut rooms = self.rooms.lock();
        if let Some(sender) = rooms.get(&event.round_id()) {
            let _ = sender.send(event.clone());
        }
        if event.is_terminal() {
            rooms.remove(&event.round_id());
        }
    }
}
