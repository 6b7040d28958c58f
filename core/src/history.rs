use futures_util::future::LocalBoxFuture;
use mines_protocol::{HistoryPage, HistoryQuery, HistoryResponse};
use std::cell::RefCell;

use crate::*;

/// Fetches one page of concluded rounds.
pub trait HistorySource {
    fn fetch(&self, query: HistoryQuery) -> LocalBoxFuture<'static, Result<HistoryResponse, HistoryError>>;
}

/// Pages through the player's round history, one cached page at a time.
pub struct HistoryBrowser {
    source: Box<dyn HistorySource>,
    table_id: String,
    current: RefCell<Option<HistoryPage>>,
}

impl HistoryBrowser {
    pub fn new(source: Box<dyn HistorySource>, table_id: impl Into<String>) -> Self {
        Self {
            source,
            table_id: table_id.into(),
            current: RefCell::new(None),
        }
    }

    pub fn current(&self) -> Option<HistoryPage> {
        self.current.borrow().clone()
    }

    /// Loads page `page` (1-based) with `page_size` entries per page.
    pub async fn load(&self, page: u32, page_size: u32) -> Result<HistoryPage, HistoryError> {
        if page == 0 {
            return Err(HistoryError::InvalidPage);
        }
        if page_size == 0 {
            return Err(HistoryError::InvalidPageSize);
        }

        let query = HistoryQuery {
            page,
            page_size,
            table_id: self.table_id.clone(),
        };
        log::debug!("loading history page {page} ({page_size} per page)");
        let response = self.source.fetch(query.clone()).await?;
        let loaded = response.into_page(&query)?;
        log::debug!(
            "history page {}/{}: {} entries",
            loaded.page,
            loaded.total_pages,
            loaded.entries.len()
        );
        *self.current.borrow_mut() = Some(loaded.clone());
        Ok(loaded)
    }

    pub async fn next(&self) -> Result<HistoryPage, HistoryError> {
        let (page, page_size) = {
            let current = self.current.borrow();
            let current = current.as_ref().ok_or(HistoryError::NotLoaded)?;
            if !current.has_next_page || current.page >= current.total_pages {
                return Err(HistoryError::NoNextPage);
            }
            (current.page + 1, current.page_size)
        };
        self.load(page, page_size).await
    }

    pub async fn previous(&self) -> Result<HistoryPage, HistoryError> {
        let (page, page_size) = {
            let current = self.current.borrow();
            let current = current.as_ref().ok_or(HistoryError::NotLoaded)?;
            if !current.has_previous_page() {
                return Err(HistoryError::NoPreviousPage);
            }
            (current.page - 1, current.page_size)
        };
        self.load(page, page_size).await
    }
}
