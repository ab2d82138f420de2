//! The change feed (spec §4.4): an ordered, sequence-keyed cursor over
//! committed revisions, plus an in-process broadcast of the same events for
//! a host process driving a long-poll or continuous `_changes` feed.
//!
//! Dispatch happens synchronously after the outermost transaction commits —
//! never from inside `put`/`force_insert` before the commit, which spec §9
//! documents as a latent bug in the source this crate is modeled on.
//! Observers must not call back into the `DocumentStore` from the
//! dispatching task; nothing here detects that, so re-entrant handlers are
//! undefined behavior per spec §5.
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};

use crate::types::ChangeNotification;

const NOTIFICATION_CHANNEL_CAPACITY: usize = 256;

/// Registers `DocumentStore`-scoped observers. Cloning shares the same
/// underlying channel; there is no global registry (spec §9 "Global
/// state: there is none at the core level").
#[derive(Clone)]
pub struct ChangeSender {
    tx: broadcast::Sender<ChangeNotification>,
}

impl ChangeSender {
    pub fn new() -> (Self, ChangeReceiver) {
        let (tx, rx) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        (ChangeSender { tx }, ChangeReceiver { rx })
    }

    pub(crate) fn notify(&self, notification: ChangeNotification) {
        // No receivers is not an error — observation is opt-in.
        let _ = self.tx.send(notification);
    }

    pub fn subscribe(&self) -> ChangeReceiver {
        ChangeReceiver {
            rx: self.tx.subscribe(),
        }
    }
}

/// A subscription to a `DocumentStore`'s change notifications.
pub struct ChangeReceiver {
    rx: broadcast::Receiver<ChangeNotification>,
}

impl ChangeReceiver {
    /// Awaits the next notification. Skips over `Lagged` gaps (a slow
    /// subscriber misses intermediate events but keeps receiving) and
    /// returns `None` once the store itself is dropped.
    pub async fn recv(&mut self) -> Option<ChangeNotification> {
        loop {
            match self.rx.recv().await {
                Ok(notification) => return Some(notification),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Adapts this subscription to a [`Stream`], for a host process driving
    /// a continuous `_changes` feed with combinators instead of a `recv`
    /// loop. Lagged gaps are silently skipped, same as `recv`.
    pub fn into_stream(self) -> impl Stream<Item = ChangeNotification> {
        use tokio_stream::StreamExt;
        BroadcastStream::new(self.rx).filter_map(|item| match item {
            Ok(notification) => Some(notification),
            Err(BroadcastStreamRecvError::Lagged(_)) => None,
        })
    }
}
