//! Platform capabilities the routing core depends on.
//!
//! The core never talks to the network, a cache or the scheduler directly;
//! everything goes through the handles collected in [`Runtime`].

mod fetch;

pub use fetch::{Fetch, FetchError, HttpFetcher, UpstreamRequest, UpstreamResponse};

use crate::store::ConfigCache;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// "Run after response" hook for fire-and-forget work
pub trait Background: Send + Sync {
    fn spawn(&self, task: BoxFuture<'static, ()>);
}

/// Schedules background work on the ambient tokio runtime
pub struct TokioBackground;

impl Background for TokioBackground {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        tokio::spawn(task);
    }
}

/// Wall clock in milliseconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

#[derive(Clone)]
pub struct Runtime {
    pub fetcher: Arc<dyn Fetch>,
    pub cache: Option<Arc<dyn ConfigCache>>,
    pub background: Option<Arc<dyn Background>>,
    pub clock: Arc<dyn Clock>,
}

impl Runtime {
    /// Runtime with only a fetcher; no platform cache, inline writes, system clock
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            fetcher,
            cache: None,
            background: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ConfigCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_background(mut self, background: Arc<dyn Background>) -> Self {
        self.background = Some(background);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }
}
