//! Cached upstream connections, keyed by endpoint authority.

use std::sync::Arc;

use crossbeam_queue::SegQueue;
use dashmap::DashMap;
use hyper::body::Incoming;
use hyper::client::conn::http1::SendRequest;
use tracing::debug;

/// Idle senders kept per endpoint. Targets come and go with every
/// rescheduling, so deep pools would mostly hold dead sockets.
const MAX_IDLE_PER_ENDPOINT: usize = 8;

/// A lock-free cache of idle HTTP/1.1 senders to upstream endpoints.
#[derive(Debug, Clone, Default)]
pub struct EndpointPool {
    idle: Arc<DashMap<String, Arc<SegQueue<SendRequest<Incoming>>>>>,
}

impl EndpointPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop an idle sender for the endpoint, skipping ones that closed while
    /// parked. The caller still verifies readiness before use.
    pub fn checkout(&self, authority: &str) -> Option<SendRequest<Incoming>> {
        let queue = self.idle.get(authority)?.value().clone();
        while let Some(sender) = queue.pop() {
            if !sender.is_closed() {
                return Some(sender);
            }
        }
        None
    }

    /// Park a sender for reuse. Closed senders and overflow beyond the
    /// per-endpoint cap are dropped.
    pub fn checkin(&self, authority: &str, sender: SendRequest<Incoming>) {
        if sender.is_closed() {
            return;
        }
        let queue = self
            .idle
            .entry(authority.to_string())
            .or_insert_with(|| Arc::new(SegQueue::new()))
            .value()
            .clone();
        if queue.len() < MAX_IDLE_PER_ENDPOINT {
            queue.push(sender);
        }
    }

    /// Drop every idle connection to the endpoint. Called when the control
    /// plane reports the backing task gone.
    pub fn purge(&self, authority: &str) {
        if self.idle.remove(authority).is_some() {
            debug!(authority, "purged idle connections");
        }
    }

    /// Number of endpoints currently holding idle connections.
    pub fn endpoints(&self) -> usize {
        self.idle.len()
    }
}
