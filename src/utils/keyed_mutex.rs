use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A mutex that locks per key (here: per upload session), so conversation
/// lookup-or-create is serialized for one session without blocking others.
#[derive(Debug, Clone, Default)]
pub struct KeyedMutex {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Acquires the lock for the given key; released when the guard drops.
    /// Entries stay in the map after use — session ids are low-cardinality
    /// relative to memory, and the storage-layer unique index is the real
    /// cross-process guard anyway.
    pub async fn lock(&self, key: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        mutex.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let locks = KeyedMutex::new();
        let _a = locks.lock("session-a").await;
        // Must not deadlock: a different key uses a different mutex.
        let _b = locks.lock("session-b").await;
    }
}
