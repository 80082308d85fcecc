//! Injectable wall-clock source: an `Arc`'d async closure returning
//! `SystemTime`, defaulting to `SystemTime::now` when a component isn't
//! given one. Tests substitute a closure over a shared, manually-advanced
//! clock instead of sleeping real wall-clock time.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;

pub type FnTimeGen =
    Arc<dyn (Fn() -> Pin<Box<dyn Future<Output = SystemTime> + Send + 'static>>) + Send + Sync>;

pub(crate) async fn now(gen: &Option<FnTimeGen>) -> SystemTime {
    match gen {
        Some(f) => f().await,
        None => SystemTime::now(),
    }
}
