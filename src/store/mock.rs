//! In-memory store used for local runs and tests.

use std::sync::atomic::{AtomicBool, Ordering};

use super::{Store, StoreError};

/// Mock backend that only tracks whether it is connected.
#[derive(Debug)]
pub struct MockStore {
    connected: AtomicBool,
}

impl MockStore {
    /// Create a connected mock store.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
        }
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MockStore {
    fn ping(&self) -> Result<(), StoreError> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::ConnectionFailed)
        }
    }

    fn close(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            tracing::debug!("Mock store closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_fails_after_close() {
        let store = MockStore::new();
        assert_eq!(store.ping(), Ok(()));

        store.close();
        assert_eq!(store.ping(), Err(StoreError::ConnectionFailed));

        // Closing twice is harmless
        store.close();
        assert_eq!(store.ping(), Err(StoreError::ConnectionFailed));
    }
}
