//! Mutual exclusion between block application, rollback and rescan.

use hnsw_store::WalletStore;
use tokio::sync::{Mutex, MutexGuard};

use crate::WalletError;

/// The engine-owned token serializing every store mutation.
#[derive(Debug, Default)]
pub struct RescanLock {
    lock: Mutex<()>,
}

/// Held for the duration of one apply or rescan. Sets the store's rescan
/// flag on acquisition and clears it on drop, on every exit path.
pub struct RescanGuard<'a, S: WalletStore + ?Sized> {
    _permit: MutexGuard<'a, ()>,
    store: &'a S,
}

impl RescanLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the token.
    pub async fn acquire<'a, S: WalletStore + ?Sized>(&'a self, store: &'a S) -> RescanGuard<'a, S> {
        let permit = self.lock.lock().await;
        store.set_rescan_guard(true);
        RescanGuard {
            _permit: permit,
            store,
        }
    }

    /// Take the token or fail immediately if another operation holds it.
    pub fn try_acquire<'a, S: WalletStore + ?Sized>(
        &'a self,
        store: &'a S,
    ) -> Result<RescanGuard<'a, S>, WalletError> {
        let permit = self
            .lock
            .try_lock()
            .map_err(|_| WalletError::RescanInProgress)?;
        store.set_rescan_guard(true);
        Ok(RescanGuard {
            _permit: permit,
            store,
        })
    }

    pub fn is_held(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

impl<S: WalletStore + ?Sized> Drop for RescanGuard<'_, S> {
    fn drop(&mut self) {
        self.store.set_rescan_guard(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hnsw_nullables::NullWalletStore;

    #[tokio::test]
    async fn guard_flag_follows_the_token() {
        let store = NullWalletStore::new([1; 32]);
        let lock = RescanLock::new();
        {
            let _guard = lock.acquire(&store).await;
            assert!(store.rescan_guard_active());
            assert!(lock.is_held());
            assert!(matches!(
                lock.try_acquire(&store),
                Err(WalletError::RescanInProgress)
            ));
        }
        assert!(!store.rescan_guard_active());
        assert!(!lock.is_held());
        assert!(lock.try_acquire(&store).is_ok());
    }
}
