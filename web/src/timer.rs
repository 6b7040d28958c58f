use futures_util::future::{FutureExt, LocalBoxFuture};
use gloo::timers::future::TimeoutFuture;
use mines_core::Timer;
use std::time::Duration;

/// `setTimeout` backed delays.
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct BrowserTimer;

impl Timer for BrowserTimer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let millis = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        TimeoutFuture::new(millis).boxed_local()
    }
}
