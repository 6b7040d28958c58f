use core::fmt;
use core::str::FromStr;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use error::*;
pub use exchange::*;
pub use history::*;

mod error;
mod exchange;
mod history;

/// Single coordinate axis used for grid rows, columns and positions.
pub type Coord = u8;

/// Count type used for mine counts, reveal counts and total-cell counts.
pub type CellCount = u16;

/// Correlation id attached to every outgoing request.
pub type RequestId = u64;

/// Status value the remote authority uses for a successful exchange.
pub const STATUS_OK: &str = "200 OK";

/// Status returned by `mines_game_load` when there is no round to resume.
pub const STATUS_NO_GAME: &str = "400";

/// Operation names understood by the remote authority.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "mines_round_start")]
    RoundStart,
    #[serde(rename = "mines_placebet")]
    PlaceBet,
    #[serde(rename = "mines_select")]
    CellSelect,
    #[serde(rename = "mines_round_end")]
    RoundEnd,
    #[serde(rename = "mines_game_load")]
    GameLoad,
    #[serde(rename = "getbalance")]
    GetBalance,
}

impl Operation {
    pub const fn as_str(self) -> &'static str {
        use Operation::*;
        match self {
            RoundStart => "mines_round_start",
            PlaceBet => "mines_placebet",
            CellSelect => "mines_select",
            RoundEnd => "mines_round_end",
            GameLoad => "mines_game_load",
            GetBalance => "getbalance",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outgoing message: `{operation, requestId, data}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFrame {
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl RequestFrame {
    pub fn encode<E: Exchange>(request_id: RequestId, exchange: &E) -> Result<Self> {
        let data = match serde_json::to_value(exchange)? {
            // unit-like payloads go out without a data field
            Value::Object(map) if map.is_empty() => Value::Null,
            data => data,
        };
        Ok(Self {
            operation: E::OPERATION,
            request_id: Some(request_id),
            data,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Incoming message. The operation is kept as a plain string so that pushes for
/// operations this client never sends still parse.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFrame {
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl ResponseFrame {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn is_for(&self, operation: Operation) -> bool {
        self.operation == operation.as_str()
    }

    pub fn is_ok(&self) -> bool {
        self.status.as_deref() == Some(STATUS_OK)
    }

    /// Decodes the body of a successful response, or reports the rejection.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T> {
        if !self.is_ok() {
            return Err(ProtocolError::Rejected {
                status: self.status.unwrap_or_default(),
                description: self.error_description.unwrap_or_default(),
            });
        }
        self.decode()
    }

    /// Decodes the body regardless of status.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.body))?)
    }
}

/// Per-cell outcome tag as reported by the remote authority.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CellOutcome {
    Mine,
    Diamond,
    MineHit,
    Hidden,
    Safe,
    #[serde(other)]
    Unknown,
}

impl CellOutcome {
    pub const fn is_safe(self) -> bool {
        matches!(self, Self::Diamond | Self::Safe)
    }
}

/// Revealed matrix as it travels on the wire; `null` entries are undetermined.
/// Rows may be shorter than the grid, missing entries are undetermined too.
pub type RawMatrix = Vec<Vec<Option<CellOutcome>>>;

/// Grid dimensions encoded as `"{cols}x{rows}"`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GridOption {
    pub rows: Coord,
    pub cols: Coord,
}

impl GridOption {
    pub const fn new(rows: Coord, cols: Coord) -> Self {
        Self { rows, cols }
    }
}

impl fmt::Display for GridOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

impl FromStr for GridOption {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ProtocolError::InvalidGridOption(s.to_string());
        let (cols, rows) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let cols: Coord = cols.trim().parse().map_err(|_| invalid())?;
        let rows: Coord = rows.trim().parse().map_err(|_| invalid())?;
        if rows == 0 || cols == 0 {
            return Err(invalid());
        }
        Ok(Self { rows, cols })
    }
}

impl TryFrom<String> for GridOption {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<GridOption> for String {
    fn from(value: GridOption) -> Self {
        value.to_string()
    }
}
