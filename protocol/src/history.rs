use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::*;

/// Status value the history endpoint uses alongside [`STATUS_OK`].
pub const STATUS_RS_OK: &str = "RS_OK";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub page: u32,
    pub page_size: u32,
    pub table_id: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedCell {
    pub row: Coord,
    pub col: Coord,
}

/// One concluded round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub round_id: Option<RoundId>,
    pub bet_amount: f64,
    pub profit: f64,
    #[serde(rename = "won")]
    pub amount_won: f64,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub grid_size: Option<CellCount>,
    #[serde(default)]
    pub revealed_cells: Vec<RevealedCell>,
    #[serde(default, alias = "gameMatrix")]
    pub revealed_matrix: Option<RawMatrix>,
}

/// History response as sent; every field may be absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryResponse {
    pub status: Option<String>,
    pub error_description: Option<String>,
    pub history: Vec<HistoryEntry>,
    pub total_records: Option<u64>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub total_pages: Option<u32>,
    pub has_next_page: Option<bool>,
}

/// A history page with absent fields filled in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub entries: Vec<HistoryEntry>,
    pub total_records: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_next_page: bool,
}

impl HistoryPage {
    pub fn has_previous_page(&self) -> bool {
        self.page > 1
    }
}

impl HistoryResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self.status.as_deref(), Some(STATUS_OK) | Some(STATUS_RS_OK))
    }

    /// Normalizes the response against the query that produced it. A missing
    /// status is accepted, the endpoint only sets it on some deployments.
    pub fn into_page(self, query: &HistoryQuery) -> Result<HistoryPage> {
        if self.status.is_some() && !self.is_ok() {
            return Err(ProtocolError::Rejected {
                status: self.status.unwrap_or_default(),
                description: self
                    .error_description
                    .filter(|description| !description.is_empty())
                    .unwrap_or_else(|| "Failed to load history".to_string()),
            });
        }

        let positive = |value: Option<u32>| value.filter(|&v| v > 0);
        Ok(HistoryPage {
            entries: self.history,
            total_records: self.total_records.unwrap_or(0),
            page: positive(self.page).unwrap_or(query.page),
            page_size: positive(self.page_size).unwrap_or(query.page_size),
            total_pages: positive(self.total_pages).unwrap_or(1),
            has_next_page: self.has_next_page.unwrap_or(false),
        })
    }
}
