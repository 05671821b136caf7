//! Network activity tracking surfaced to the editor
//!
//! The registry client signals request start/settle through the
//! [`ActivityObserver`] seam; this module counts what is in flight and
//! forwards the gauge to the editor as a custom notification, so a status
//! bar can show scan progress.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tower_lsp::Client;
use tower_lsp::lsp_types::notification::Notification;

use crate::version::registry::ActivityObserver;

/// Pending-request gauge. Tolerates more "ended" than "started" signals by
/// clamping at zero.
#[derive(Debug, Default)]
pub struct PendingRequests(AtomicUsize);

impl PendingRequests {
    /// Records a request start and returns the new pending count.
    pub fn started(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Records a request settling and returns the new pending count.
    pub fn ended(&self) -> usize {
        let previous = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                Some(count.saturating_sub(1))
            })
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    pub fn current(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Parameters of the `depwatch/networkActivity` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkActivityParams {
    pub pending_requests: usize,
}

/// Custom notification carrying the in-flight registry request count.
#[derive(Debug)]
pub enum NetworkActivity {}

impl Notification for NetworkActivity {
    type Params = NetworkActivityParams;
    const METHOD: &'static str = "depwatch/networkActivity";
}

/// Forwards every gauge change to the editor. Display only: sending is
/// fire-and-forget and never delays the request being counted.
pub struct EditorActivity {
    client: Client,
    pending: Arc<PendingRequests>,
}

impl EditorActivity {
    pub fn new(client: Client, pending: Arc<PendingRequests>) -> Self {
        Self { client, pending }
    }

    fn publish(&self, pending_requests: usize) {
        let client = self.client.clone();
        tokio::spawn(async move {
            client
                .send_notification::<NetworkActivity>(NetworkActivityParams { pending_requests })
                .await;
        });
    }
}

impl ActivityObserver for EditorActivity {
    fn request_started(&self) {
        let pending = self.pending.started();
        self.publish(pending);
    }

    fn request_ended(&self) {
        let pending = self.pending.ended();
        self.publish(pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_requests_counts_starts_and_ends() {
        let pending = PendingRequests::default();

        assert_eq!(pending.started(), 1);
        assert_eq!(pending.started(), 2);
        assert_eq!(pending.ended(), 1);
        assert_eq!(pending.current(), 1);
        assert_eq!(pending.ended(), 0);
    }

    #[test]
    fn pending_requests_clamps_at_zero() {
        let pending = PendingRequests::default();

        assert_eq!(pending.ended(), 0);
        assert_eq!(pending.ended(), 0);
        assert_eq!(pending.current(), 0);

        // A later start still counts from zero, not from a negative value.
        assert_eq!(pending.started(), 1);
    }
}
