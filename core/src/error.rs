use mines_protocol::{Operation, ProtocolError};
use thiserror::Error;

use crate::*;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Cannot change {0} while a round is in progress")]
    RoundInProgress(&'static str),
    #[error("Mine count {mines} is outside 1..={max}")]
    MineCountOutOfRange { mines: CellCount, max: CellCount },
    #[error("Grid needs at least two cells")]
    GridTooSmall,
    #[error("Bet steps must be non-empty and strictly ascending")]
    InvalidBetSteps,
    #[error("Invalid stake {0}")]
    InvalidStake(Amount),
    #[error("Stake {0} is not one of the bet steps")]
    OffLadder(Amount),
    #[error("A round cannot start without a round id")]
    MissingRoundId,
    #[error("Cell {0:?} is outside the grid")]
    InvalidCell(Cell),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection closed")]
    Closed,
    #[error("Send failed: {0}")]
    Send(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Malformed frame: {0}")]
    Malformed(String),
    #[error("Invalid grid option {0:?}")]
    InvalidGridOption(String),
    #[error("{operation} rejected with status {status:?}: {description}")]
    Rejected {
        operation: Operation,
        status: String,
        description: String,
    },
    #[error("{0} timed out")]
    Timeout(Operation),
    #[error("{0} cancelled")]
    Cancelled(Operation),
}

impl RequestError {
    pub(crate) fn from_protocol(operation: Operation, err: ProtocolError) -> Self {
        match err {
            ProtocolError::Malformed(message) => Self::Malformed(message),
            ProtocolError::InvalidGridOption(option) => Self::InvalidGridOption(option),
            ProtocolError::Rejected {
                status,
                description,
            } => Self::Rejected {
                operation,
                status,
                description,
            },
        }
    }

    /// Status of a remote rejection.
    pub fn status(&self) -> Option<&str> {
        match self {
            Self::Rejected { status, .. } => Some(status),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VisualError {
    #[error("No cell at {0:?}")]
    MissingCell(Cell),
    #[error("{0}")]
    Failed(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("Stake {stake} exceeds balance {balance}")]
    LowBalance { stake: Amount, balance: Amount },
    #[error("No round in progress")]
    NotStarted,
    #[error("Not allowed while {0:?}")]
    WrongPhase(RoundPhase),
    #[error("Cell {0:?} was already revealed")]
    AlreadyRevealed(Cell),
    #[error("No unrevealed cells left")]
    NoCandidates,
    #[error("Random source failed: {0}")]
    Entropy(String),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecoveryError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Pending round has no grid option")]
    MissingGrid,
    #[error("Pending round has an invalid grid option {0:?}")]
    InvalidGrid(String),
    #[error("Could not resume restored round: {0}")]
    Resume(#[from] DispatchError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("Page numbers start at 1")]
    InvalidPage,
    #[error("Page size must be positive")]
    InvalidPageSize,
    #[error("Already on the last page")]
    NoNextPage,
    #[error("Already on the first page")]
    NoPreviousPage,
    #[error("No page loaded yet")]
    NotLoaded,
    #[error("History request failed: {0}")]
    Fetch(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
