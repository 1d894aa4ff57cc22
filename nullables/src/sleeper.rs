//! Nullable sleeper: scheduled delays that never wait on the wall clock.

use hnsw_utils::Sleeper;
use std::sync::Mutex;
use std::time::Duration;

type SleepHook = Box<dyn Fn(usize) + Send + Sync>;

/// Records every requested delay and yields to the scheduler instead of
/// waiting. An optional hook runs on each sleep with its 1-based sequence
/// number, which lets a test advance the chain or the wallet between ticks.
pub struct NullSleeper {
    sleeps: Mutex<Vec<Duration>>,
    hook: Option<SleepHook>,
}

impl NullSleeper {
    pub fn new() -> Self {
        Self {
            sleeps: Mutex::new(Vec::new()),
            hook: None,
        }
    }

    pub fn with_hook(hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        Self {
            sleeps: Mutex::new(Vec::new()),
            hook: Some(Box::new(hook)),
        }
    }

    /// Delays requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sleeps.lock().unwrap().len()
    }
}

impl Default for NullSleeper {
    fn default() -> Self {
        Self::new()
    }
}

impl Sleeper for NullSleeper {
    async fn sleep(&self, duration: Duration) {
        let seq = {
            let mut sleeps = self.sleeps.lock().unwrap();
            sleeps.push(duration);
            sleeps.len()
        };
        if let Some(hook) = &self.hook {
            hook(seq);
        }
        tokio::task::yield_now().await;
    }
}
