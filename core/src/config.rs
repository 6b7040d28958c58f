use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::*;

pub const DEFAULT_TABLE_ID: &str = "STGMN101";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealPacing {
    /// Pause after this many started cells; 0 disables pacing.
    pub every: usize,
    pub delay_ms: u64,
}

impl RevealPacing {
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub const fn pause_after(&self, started: usize) -> bool {
        self.every > 0 && started > 0 && started % self.every == 0
    }
}

impl Default for RevealPacing {
    fn default() -> Self {
        Self {
            every: 3,
            delay_ms: 50,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub table_id: String,
    pub request_timeout_ms: u64,
    pub reveal_pacing: RevealPacing,
    /// Pause between announcing a restore and loading the grid.
    pub restore_settle_ms: u64,
    pub default_grid: GridSize,
    pub grid_presets: Vec<GridSize>,
    pub default_mines: CellCount,
    pub default_balance: Amount,
    pub default_stake: Amount,
    pub bet_steps: Vec<Amount>,
}

impl ClientConfig {
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub const fn restore_settle(&self) -> Duration {
        Duration::from_millis(self.restore_settle_ms)
    }
}

pub fn default_bet_steps() -> Vec<Amount> {
    vec![
        0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0,
        10000.0,
    ]
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            table_id: DEFAULT_TABLE_ID.to_string(),
            request_timeout_ms: 10_000,
            reveal_pacing: RevealPacing::default(),
            restore_settle_ms: 100,
            default_grid: GridSize::new(3, 3),
            grid_presets: vec![GridSize::new(3, 3), GridSize::new(4, 4), GridSize::new(5, 5)],
            default_mines: 1,
            default_balance: 1_000_000.0,
            default_stake: 1.0,
            bet_steps: default_bet_steps(),
        }
    }
}
