// ── Reactive status streams ──
//
// Subscription types for consuming status changes from an `EntityCache`.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::status::DeviceStatus;

/// A subscription to one device's status.
///
/// Provides both point-in-time access and change notification via
/// [`changed()`](Self::changed) or by converting to a `Stream`. A slow
/// reader sees the latest status, not every intermediate one; compare
/// [`DeviceStatus::polls`] to detect gaps.
pub struct StatusStream {
    current: Arc<DeviceStatus>,
    receiver: watch::Receiver<Arc<DeviceStatus>>,
}

impl StatusStream {
    pub(crate) fn new(mut receiver: watch::Receiver<Arc<DeviceStatus>>) -> Self {
        let current = receiver.borrow_and_update().clone();
        Self { current, receiver }
    }

    /// Status captured at creation or at the last `changed()`.
    pub fn current(&self) -> &Arc<DeviceStatus> {
        &self.current
    }

    /// Latest status (may have changed since creation).
    pub fn latest(&self) -> Arc<DeviceStatus> {
        self.receiver.borrow().clone()
    }

    /// Whether a poll has completed since the last `changed()`.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Wait for the next completed poll, returning the new status.
    /// Returns `None` once the poller is gone.
    pub async fn changed(&mut self) -> Option<Arc<DeviceStatus>> {
        self.receiver.changed().await.ok()?;
        let status = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&status);
        Some(status)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    ///
    /// The stream yields the current status first, then one item per
    /// observed change.
    pub fn into_stream(self) -> StatusWatchStream {
        StatusWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct StatusWatchStream {
    inner: WatchStream<Arc<DeviceStatus>>,
}

impl Stream for StatusWatchStream {
    type Item = Arc<DeviceStatus>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
