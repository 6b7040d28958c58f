use futures_util::future::LocalBoxFuture;
use std::time::Duration;

/// Source of delays for request timeouts and reveal pacing.
pub trait Timer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}
