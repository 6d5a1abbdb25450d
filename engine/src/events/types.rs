//! Event contract
//!
//! Named events delivered to real-time subscribers. The wire names and
//! payload shapes are bit-stable; delivery is best-effort and subscribers
//! reconcile by re-reading the authoritative round.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::round::{Participant, RoundSummary};

/// Why a round was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    /// Auto-start deadline passed below the participant minimum
    InsufficientParticipants,
    /// The round admin cancelled while Waiting
    AdminRequest,
}

/// A state change broadcast to subscribers, emitted after commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum EngineEvent {
    #[serde(rename = "round.created")]
    RoundCreated { round: RoundSummary },

    #[serde(rename = "round.joined")]
    RoundJoined {
        round: RoundSummary,
        participant: Participant,
    },

    #[serde(rename = "round.countdown")]
    RoundCountdown {
        round_id: Uuid,
        seconds_remaining: u64,
    },

    #[serde(rename = "round.started")]
    RoundStarted {
        round: RoundSummary,
        elimination_order: Vec<Uuid>,
    },

    #[serde(rename = "round.elimination")]
    RoundElimination {
        round_id: Uuid,
        victim_id: Uuid,
        position: usize,
        remaining: usize,
    },

    #[serde(rename = "round.completed")]
    RoundCompleted {
        round_id: Uuid,
        winner_id: Uuid,
        winner_pool: i64,
        admin_pool: i64,
        app_pool: i64,
    },

    #[serde(rename = "round.aborted")]
    RoundAborted {
        round_id: Uuid,
        reason: AbortReason,
        refunded: i64,
    },

    /// Private to the winner.
    #[serde(rename = "user.won")]
    UserWon {
        account_id: Uuid,
        round_id: Uuid,
        prize: i64,
    },
}

impl EngineEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::RoundCreated { .. } => "round.created",
            EngineEvent::RoundJoined { .. } => "round.joined",
            EngineEvent::RoundCountdown { .. } => "round.countdown",
            EngineEvent::RoundStarted { .. } => "round.started",
            EngineEvent::RoundElimination { .. } => "round.elimination",
            EngineEvent::RoundCompleted { .. } => "round.completed",
            EngineEvent::RoundAborted { .. } => "round.aborted",
            EngineEvent::UserWon { .. } => "user.won",
        }
    }

    /// The round this event belongs to.
    pub fn round_id(&self) -> Uuid {
        match self {
            EngineEvent::RoundCreated { round } => round.id,
            EngineEvent::RoundJoined { round, .. } => round.id,
            EngineEvent::RoundCountdown { round_id, .. } => *round_id,
            EngineEvent::RoundStarted { round, .. } => round.id,
            EngineEvent::RoundElimination { round_id, .. } => *round_id,
            EngineEvent::RoundCompleted { round_id, .. } => *round_id,
            EngineEvent::RoundAborted { round_id, .. } => *round_id,
            EngineEvent::UserWon { round_id, .. } => *round_id,
        }
    }

    /// Private events route to a single account instead of the round room.
    pub fn audience(&self) -> Option<Uuid> {
        match self {
            EngineEvent::UserWon { account_id, .. } => Some(*account_id),
            _ => None,
        }
    }

    /// Terminal events close the round's room after delivery.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EngineEvent::RoundCompleted { .. } | EngineEvent::RoundAborted { .. }
        )
    }
}
