//! Per-collection change notifications.

use tokio::sync::broadcast;

use super::Collection;

const FEED_CAPACITY: usize = 64;

/// One broadcast channel per collection. A notification carries no payload:
/// receivers re-read the collection they watch.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    records: broadcast::Sender<()>,
    users: broadcast::Sender<()>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (records, _) = broadcast::channel(FEED_CAPACITY);
        let (users, _) = broadcast::channel(FEED_CAPACITY);
        Self { records, users }
    }

    /// Announce a change to every current subscriber of `collection`.
    pub fn notify(&self, collection: Collection) {
        // No receivers is fine: nobody is watching yet.
        let _ = self.sender(collection).send(());
    }

    pub fn subscribe(&self, collection: Collection) -> broadcast::Receiver<()> {
        self.sender(collection).subscribe()
    }

    const fn sender(&self, collection: Collection) -> &broadcast::Sender<()> {
        match collection {
            Collection::Records => &self.records,
            Collection::Users => &self.users,
        }
    }
}
