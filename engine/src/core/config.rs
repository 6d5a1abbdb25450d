//! Engine configuration
//!
//! All knobs are fixed at startup; changes require a restart.

use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::EngineError;

/// Complete engine configuration.
///
/// # Fields
///
/// * `initial_balance` - Coins granted to every account at registration
/// * `min_participants` - Floor applied to every round (3..=1000)
/// * `auto_start_delay_ms` - Waiting window between creation and auto-start
/// * `elimination_interval_ms` - Delay between elimination draws
/// * `sweep_interval_ms` - Scheduler sweep period (timer recovery)
/// * `winner_pct` / `admin_pct` / `app_pct` - Pool split, must sum to 100
/// * `rng_seed` - Fixed shuffle seed; `None` derives one from wall-clock entropy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub initial_balance: i64,
    pub min_participants: usize,
    pub auto_start_delay_ms: u64,
    pub elimination_interval_ms: u64,
    pub sweep_interval_ms: u64,
    pub winner_pct: u8,
    pub admin_pct: u8,
    pub app_pct: u8,
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_balance: 1_000,
            min_participants: 3,
            auto_start_delay_ms: 60_000,
            elimination_interval_ms: 3_000,
            sweep_interval_ms: 10_000,
            winner_pct: 70,
            admin_pct: 20,
            app_pct: 10,
            rng_seed: None,
        }
    }
}

impl EngineConfig {
    /// Validate the configuration at startup.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.initial_balance < 0 {
            return Err(EngineError::Validation(
                "initial_balance must be non-negative".to_string(),
            ));
        }

        if self.min_participants < 3 || self.min_participants > 1_000 {
            return Err(EngineError::Validation(
                "min_participants must be within 3..=1000".to_string(),
            ));
        }

        if self.auto_start_delay_ms == 0 {
            return Err(EngineError::Validation(
                "auto_start_delay_ms must be > 0".to_string(),
            ));
        }

        if self.elimination_interval_ms == 0 {
            return Err(EngineError::Validation(
                "elimination_interval_ms must be > 0".to_string(),
            ));
        }

        if self.sweep_interval_ms == 0 {
            return Err(EngineError::Validation(
                "sweep_interval_ms must be > 0".to_string(),
            ));
        }

        let pct_sum =
            self.winner_pct as u32 + self.admin_pct as u32 + self.app_pct as u32;
        if pct_sum != 100 {
            return Err(EngineError::Validation(format!(
                "pool percentages must sum to 100, got {}",
                pct_sum
            )));
        }

        Ok(())
    }

    /// Auto-start delay as calendar duration.
    pub fn auto_start_delay(&self) -> ChronoDuration {
        ChronoDuration::milliseconds(self.auto_start_delay_ms as i64)
    }

    /// Elimination interval as a sleepable duration.
    pub fn elimination_interval(&self) -> Duration {
        Duration::from_millis(self.elimination_interval_ms)
    }

    /// Scheduler sweep period as a sleepable duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}
