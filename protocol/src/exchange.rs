use core::fmt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::*;

/// A request payload together with the operation it is sent under and the
/// body its successful response decodes into.
pub trait Exchange: Serialize {
    const OPERATION: Operation;
    type Response: DeserializeOwned;
}

/// Opaque round identifier issued by the remote authority.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundId(String);

impl RoundId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for RoundId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RoundId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RoundStart,
    RoundEnd,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStart {
    pub event_type: EventType,
    pub table_id: String,
}

impl RoundStart {
    pub fn new(table_id: impl Into<String>) -> Self {
        Self {
            event_type: EventType::RoundStart,
            table_id: table_id.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStarted {
    pub round_id: RoundId,
}

impl Exchange for RoundStart {
    const OPERATION: Operation = Operation::RoundStart;
    type Response = RoundStarted;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBet {
    pub round_id: RoundId,
    pub table_id: String,
    /// The stake travels as its decimal string.
    pub stake_amount: String,
    pub grid_option: GridOption,
    pub mine_count: CellCount,
}

impl PlaceBet {
    pub fn new(
        round_id: RoundId,
        table_id: impl Into<String>,
        stake: f64,
        grid_option: GridOption,
        mine_count: CellCount,
    ) -> Self {
        Self {
            round_id,
            table_id: table_id.into(),
            stake_amount: stake.to_string(),
            grid_option,
            mine_count,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetPlaced {
    pub balance: f64,
}

impl Exchange for PlaceBet {
    const OPERATION: Operation = Operation::PlaceBet;
    type Response = BetPlaced;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSelect {
    pub row: Coord,
    pub col: Coord,
    pub table_id: String,
    pub round_id: RoundId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSelected {
    pub current_multiplier: f64,
    pub balance: f64,
    pub hit_mine: bool,
    #[serde(default)]
    pub revealed_matrix: Option<RawMatrix>,
    #[serde(default)]
    pub reward: Option<f64>,
}

impl Exchange for CellSelect {
    const OPERATION: Operation = Operation::CellSelect;
    type Response = CellSelected;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundEnd {
    pub event_type: EventType,
    pub round_id: RoundId,
    pub table_id: String,
}

impl RoundEnd {
    pub fn new(round_id: RoundId, table_id: impl Into<String>) -> Self {
        Self {
            event_type: EventType::RoundEnd,
            round_id,
            table_id: table_id.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundEnded {
    #[serde(default)]
    pub revealed_matrix: RawMatrix,
    #[serde(default)]
    pub balance: Option<f64>,
}

impl Exchange for RoundEnd {
    const OPERATION: Operation = Operation::RoundEnd;
    type Response = RoundEnded;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameLoad {
    pub table_id: String,
}

/// Snapshot of a round left unresolved by an earlier session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameLoaded {
    pub has_existing_game: bool,
    pub round_id: Option<RoundId>,
    /// Kept raw: finished rounds may carry a blank or stale value here.
    pub grid_option: Option<String>,
    pub current_winning: Option<f64>,
    pub bet_amount: Option<f64>,
    pub mine_count: Option<CellCount>,
    pub revealed_matrix: Option<RawMatrix>,
    pub revealed_count: Option<CellCount>,
}

impl Exchange for GameLoad {
    const OPERATION: Operation = Operation::GameLoad;
    type Response = GameLoaded;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GetBalance;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub balance: f64,
}

impl Exchange for GetBalance {
    const OPERATION: Operation = Operation::GetBalance;
    type Response = Balance;
}
