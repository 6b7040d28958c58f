use futures_util::future::{FutureExt, LocalBoxFuture};
use gloo::net::http::Request;
use mines_core::{HistoryError, HistorySource};
use mines_protocol::{HistoryQuery, HistoryResponse};

/// Round history over an authenticated HTTP POST.
pub(crate) struct HttpHistorySource {
    url: String,
    token: Option<String>,
}

impl HttpHistorySource {
    pub(crate) fn new(url: String, token: Option<String>) -> Self {
        Self { url, token }
    }
}

async fn fetch_page(
    url: String,
    token: Option<String>,
    query: HistoryQuery,
) -> Result<HistoryResponse, HistoryError> {
    let fetch_error = |err: gloo::net::Error| HistoryError::Fetch(err.to_string());

    let mut request = Request::post(&url);
    if let Some(token) = token {
        request = request.header("Authorization", &format!("Bearer {token}"));
    }
    let response = request.json(&query).map_err(fetch_error)?.send().await.map_err(fetch_error)?;
    if !response.ok() {
        return Err(HistoryError::Fetch(format!(
            "{} {}",
            response.status(),
            response.status_text()
        )));
    }
    response.json().await.map_err(fetch_error)
}

impl HistorySource for HttpHistorySource {
    fn fetch(&self, query: HistoryQuery) -> LocalBoxFuture<'static, Result<HistoryResponse, HistoryError>> {
        log::debug!("history page {} from {}", query.page, self.url);
        fetch_page(self.url.clone(), self.token.clone(), query).boxed_local()
    }
}
