//! Sync events and progress reporting.

use hnsw_types::{Amount, BlockHash};

/// Events published by the resync engine via the [`EventBus`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    /// A sync supervision or rescan began.
    Started,
    /// Integer floor of `wallet / chain * 100`.
    Progress { percent: u8 },
    /// Polling stopped: converged, finished or torn down.
    Stopped,
    /// A live block was applied.
    ChainTip {
        height: u32,
        hash: BlockHash,
        fee_rate: Amount,
    },
}

/// Synchronous fan-out event bus for sync events.
///
/// Listeners are invoked inline on the emitting task; keep handlers fast to
/// avoid stalling block application.
pub struct EventBus {
    listeners: Vec<Box<dyn Fn(&SyncEvent) + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&SyncEvent) + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: &SyncEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }
}

/// An open sync session. Emits [`SyncEvent::Stopped`] when dropped, on
/// every exit path.
pub struct SyncSession<'a> {
    bus: &'a EventBus,
}

impl EventBus {
    /// Emit [`SyncEvent::Started`] and open a session.
    pub fn start_session(&self) -> SyncSession<'_> {
        self.emit(&SyncEvent::Started);
        SyncSession { bus: self }
    }
}

impl Drop for SyncSession<'_> {
    fn drop(&mut self) {
        self.bus.emit(&SyncEvent::Stopped);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncPhase {
    /// A rollback was requested and has not yet been observed.
    Resetting,
    Syncing,
    Synced,
}

/// One sample of wallet and chain heights. Derived, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncProgress {
    pub wallet_height: u32,
    pub chain_height: u32,
    pub phase: SyncPhase,
}

impl SyncProgress {
    pub fn percent(&self) -> u8 {
        match self.phase {
            SyncPhase::Resetting => 0,
            SyncPhase::Synced => 100,
            SyncPhase::Syncing => raw_percent(self.wallet_height, self.chain_height),
        }
    }
}

fn raw_percent(wallet: u32, chain: u32) -> u8 {
    if chain == 0 {
        return 100;
    }
    (u64::from(wallet) * 100 / u64::from(chain)).min(100) as u8
}

/// Turns height samples into the percent series observers see.
///
/// While resetting every sample reports 0. Resetting ends at the first
/// sample with the wallet behind the chain. After that the reported percent
/// never decreases, even when the chain grows faster than the wallet.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    resetting: bool,
    high_water: u8,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracker for a rescan whose rollback has not yet been observed.
    pub fn resetting() -> Self {
        Self {
            resetting: true,
            high_water: 0,
        }
    }

    pub fn is_resetting(&self) -> bool {
        self.resetting
    }

    pub fn sample(&mut self, wallet_height: u32, chain_height: u32) -> SyncProgress {
        if self.resetting && wallet_height < chain_height {
            self.resetting = false;
        }
        let phase = if self.resetting {
            SyncPhase::Resetting
        } else if wallet_height >= chain_height {
            SyncPhase::Synced
        } else {
            SyncPhase::Syncing
        };
        SyncProgress {
            wallet_height,
            chain_height,
            phase,
        }
    }

    /// Sample and return the percent to publish.
    pub fn observe(&mut self, wallet_height: u32, chain_height: u32) -> u8 {
        let progress = self.sample(wallet_height, chain_height);
        if progress.phase == SyncPhase::Resetting {
            return 0;
        }
        self.high_water = self.high_water.max(progress.percent());
        self.high_water
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn emit_calls_all_listeners_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        for tag in 0..2 {
            let seen = Arc::clone(&seen);
            bus.subscribe(Box::new(move |event| {
                seen.lock().unwrap().push((tag, event.clone()));
            }));
        }
        bus.emit(&SyncEvent::Progress { percent: 40 });
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (0, SyncEvent::Progress { percent: 40 }),
                (1, SyncEvent::Progress { percent: 40 })
            ]
        );
    }

    #[test]
    fn session_emits_stopped_on_every_exit() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        let sink = Arc::clone(&seen);
        bus.subscribe(Box::new(move |event| sink.lock().unwrap().push(event.clone())));

        let run = |fail: bool| -> Result<(), ()> {
            let _session = bus.start_session();
            if fail {
                return Err(());
            }
            bus.emit(&SyncEvent::Progress { percent: 100 });
            Ok(())
        };
        assert!(run(true).is_err());
        assert!(run(false).is_ok());

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                SyncEvent::Started,
                SyncEvent::Stopped,
                SyncEvent::Started,
                SyncEvent::Progress { percent: 100 },
                SyncEvent::Stopped,
            ]
        );
    }

    #[test]
    fn percent_is_floored() {
        let mut tracker = ProgressTracker::new();
        assert_eq!(tracker.observe(2, 3), 66);
        assert_eq!(tracker.observe(0, 0), 100);
    }

    #[test]
    fn resetting_reports_zero_until_wallet_is_behind() {
        let mut tracker = ProgressTracker::resetting();
        assert_eq!(tracker.observe(90, 90), 0);
        assert!(tracker.is_resetting());
        assert_eq!(tracker.observe(10, 100), 10);
        assert!(!tracker.is_resetting());
    }

    #[test]
    fn chain_growth_does_not_move_progress_backwards() {
        let mut tracker = ProgressTracker::new();
        assert_eq!(tracker.observe(50, 100), 50);
        assert_eq!(tracker.observe(51, 200), 50);
        assert_eq!(tracker.sample(51, 200).percent(), 25);
    }

    proptest! {
        #[test]
        fn observed_progress_is_monotonic(
            samples in proptest::collection::vec((0u32..10_000, 0u32..10_000), 1..50)
        ) {
            let mut tracker = ProgressTracker::resetting();
            let mut last = 0u8;
            for (wallet, chain) in samples {
                let percent = tracker.observe(wallet, chain);
                if tracker.is_resetting() {
                    prop_assert_eq!(percent, 0);
                } else {
                    prop_assert!(percent >= last);
                    prop_assert!(percent <= 100);
                    last = percent;
                }
            }
        }
    }
}
