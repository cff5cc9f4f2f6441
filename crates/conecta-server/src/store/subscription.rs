use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{DocumentStore, Entity, Query, fetch};

/// Live query over one collection.
///
/// Yields the complete, mapped result set once on start and again after
/// every change to the collection. Each emission replaces the previous one;
/// nothing is ever delivered as a delta. Dropping the subscription (or calling
/// [`Subscription::unsubscribe`]) stops the background listener.
pub struct Subscription<T> {
    receiver: mpsc::Receiver<Vec<T>>,
    listener: JoinHandle<()>,
}

impl<T: Entity> Subscription<T> {
    pub fn start(store: Arc<dyn DocumentStore>, query: Query) -> Self {
        let (tx, receiver) = mpsc::channel(4);
        let mut changes = store.watch(&query.collection);

        let listener = tokio::spawn(async move {
            loop {
                // Mark the current version as seen before reading so a write
                // landing mid-read still triggers another snapshot.
                let _ = changes.borrow_and_update();

                match fetch::<T>(store.as_ref(), &query).await {
                    Ok(snapshot) => {
                        if tx.send(snapshot).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(collection = %query.collection, "Snapshot read failed: {}", e);
                    }
                }

                if changes.changed().await.is_err() {
                    break;
                }
            }
            tracing::debug!(collection = %query.collection, "Subscription closed");
        });

        Self { receiver, listener }
    }
}

impl<T> Subscription<T> {
    /// Wait for the next full snapshot. `None` once the listener has stopped.
    pub async fn next(&mut self) -> Option<Vec<T>> {
        self.receiver.recv().await
    }

    /// Detach from the collection. No snapshot is delivered afterwards.
    pub fn unsubscribe(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.listener.abort();
    }
}
