//! Live subscription handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;

/// Handle returned by the `on_*_update` methods.
///
/// [`Subscription::unsubscribe`] stops every future callback and cancels the
/// task pumping snapshots. It may be called any number of times. Dropping the
/// handle unsubscribes as well.
#[derive(Debug)]
pub struct Subscription {
    active: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Subscription {
    pub(crate) fn new(active: Arc<AtomicBool>, task: JoinHandle<()>) -> Self {
        Self {
            active,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn unsubscribe(&self) {
        self.active.store(false, Ordering::SeqCst);
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
