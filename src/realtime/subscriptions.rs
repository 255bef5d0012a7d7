//! Typed publish/subscribe registry

use super::message::RealtimeMessage;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&RealtimeMessage) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    callback: Callback,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    by_type: HashMap<String, Vec<Subscription>>,
}

/// Callbacks per message type, invoked in registration order
#[derive(Default)]
pub struct Subscribers {
    inner: Mutex<Registry>,
}

/// Outcome of one dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub panicked: usize,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe<F>(&self, message_type: impl Into<String>, callback: F) -> SubscriptionId
    where
        F: Fn(&RealtimeMessage) + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry
            .by_type
            .entry(message_type.into())
            .or_default()
            .push(Subscription {
                id,
                callback: Arc::new(callback),
            });
        id
    }

    /// Returns whether the subscription existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.lock();
        let mut found = false;
        registry.by_type.retain(|_, subs| {
            let before = subs.len();
            subs.retain(|s| s.id != id);
            found |= subs.len() != before;
            !subs.is_empty()
        });
        found
    }

    pub fn count(&self, message_type: &str) -> usize {
        self.lock().by_type.get(message_type).map_or(0, Vec::len)
    }

    pub fn total(&self) -> usize {
        self.lock().by_type.values().map(Vec::len).sum()
    }

    /// Invoke every callback for the message's type.
    ///
    /// The registry lock is released before callbacks run, so a callback may
    /// subscribe or unsubscribe. A panicking callback is logged and skipped.
    pub fn dispatch(&self, message: &RealtimeMessage) -> DispatchReport {
        let callbacks: Vec<(SubscriptionId, Callback)> = self
            .lock()
            .by_type
            .get(&message.kind)
            .map(|subs| subs.iter().map(|s| (s.id, s.callback.clone())).collect())
            .unwrap_or_default();

        let mut report = DispatchReport::default();
        for (id, callback) in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(message))) {
                Ok(()) => report.delivered += 1,
                Err(_) => {
                    report.panicked += 1;
                    tracing::error!(
                        message_type = %message.kind,
                        subscription = ?id,
                        "Subscriber panicked"
                    );
                }
            }
        }
        report
    }
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("total", &self.total())
            .finish()
    }
}
