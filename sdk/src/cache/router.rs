//! Cache invalidation router.
//!
//! Translates each domain event into cache-key invalidations. The mapping is
//! an exhaustive match on the event enum, so a new event type does not compile
//! until it is mapped.
//!
//! | Event | Invalidated keys |
//! |---|---|
//! | `notification:new` | `notifications`, `notificationCount` |
//! | `refund:new` | `refunds`, `staffTabCounts`, `analytics` |
//! | `refund:updated` | `refund:{id}`, `auditLogs:{id}`, `refunds`, `staffTabCounts`, `student-history`, `analytics`, `notifications`, `notificationCount` |
//! | `refund:receipt` | `refunds`, `staffTabCounts` |

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use super::keys::CacheKey;
use super::query_cache::InvalidationTarget;
use crate::events::DomainEvent;
use crate::ws::{Signal, SocketManager};

/// Returns the cache keys invalidated by `event`.
#[must_use]
pub fn invalidations(event: &DomainEvent) -> Vec<CacheKey> {
    match event {
        DomainEvent::NotificationNew { .. } => {
            vec![CacheKey::Notifications, CacheKey::NotificationCount]
        }
        DomainEvent::RefundNew { .. } => vec![
            CacheKey::Refunds,
            CacheKey::StaffTabCounts,
            CacheKey::Analytics,
        ],
        DomainEvent::RefundUpdated { refund_id, .. } => vec![
            CacheKey::refund(refund_id.as_str()),
            CacheKey::audit_logs(refund_id.as_str()),
            CacheKey::Refunds,
            CacheKey::StaffTabCounts,
            CacheKey::StudentHistory,
            CacheKey::Analytics,
            CacheKey::Notifications,
            CacheKey::NotificationCount,
        ],
        DomainEvent::RefundReceipt { .. } => vec![CacheKey::Refunds, CacheKey::StaffTabCounts],
    }
}

/// Applies one signal to `target`. Returns the number of keys invalidated,
/// or `None` for a full resync.
pub fn apply<T>(signal: &Signal, target: &T) -> Option<usize>
where
    T: InvalidationTarget + ?Sized,
{
    match signal {
        Signal::Event(event) => {
            let keys = invalidations(event);
            debug!(event = %event.kind(), keys = keys.len(), "invalidating cached queries");
            for key in &keys {
                target.invalidate(key);
            }
            Some(keys.len())
        }
        Signal::Resync => {
            debug!("resync, invalidating all cached queries");
            target.invalidate_all();
            None
        }
    }
}

/// Routes socket signals into an invalidation target.
#[derive(Debug)]
pub struct InvalidationRouter<T: ?Sized> {
    target: Arc<T>,
}

impl<T> InvalidationRouter<T>
where
    T: InvalidationTarget + ?Sized + 'static,
{
    /// Creates a router driving `target`.
    #[must_use]
    pub fn new(target: Arc<T>) -> Self {
        Self { target }
    }

    /// Returns the target.
    #[must_use]
    pub fn target(&self) -> &Arc<T> {
        &self.target
    }

    /// Applies a signal directly, without a socket.
    pub fn route(&self, signal: &Signal) -> Option<usize> {
        apply(signal, self.target.as_ref())
    }

    /// Starts listening to `manager`.
    ///
    /// The listener stays attached across reconnects until the returned
    /// handle is detached or dropped.
    #[must_use]
    pub fn attach(&self, manager: &SocketManager) -> RouterHandle {
        let mut subscription = manager.subscribe();
        let target = Arc::clone(&self.target);

        let task = tokio::spawn(async move {
            while let Some(signal) = subscription.recv().await {
                apply(&signal, target.as_ref());
            }
        });

        RouterHandle { task: Some(task) }
    }
}

/// Handle to an attached router listener.
#[derive(Debug)]
pub struct RouterHandle {
    task: Option<JoinHandle<()>>,
}

impl RouterHandle {
    /// Returns true while the listener is running.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stops the listener and waits until its subscription is released.
    pub async fn detach(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for RouterHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
