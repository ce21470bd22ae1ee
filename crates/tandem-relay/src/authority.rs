//! The confirming side of the relay.
//!
//! An [`Authority`] owns the system whose source state is the truth. Events
//! are confirmed one at a time under a mutex, appended to history, and
//! broadcast to participants in confirmation order.
//!
//! # Guarantees
//!
//! - **Ordered**: broadcasts happen under the same lock as the dispatch, so
//!   receivers see sequences in increasing order
//! - **In-memory only**: history lives as long as the authority
//! - **Lossy delivery**: slow receivers get [`RelayError::Lagged`](crate::RelayError::Lagged)
//!   and must resync from [`Authority::history`]

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tandem_core::{Event, System};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::RelayError;
use crate::message::{ConfirmedEvent, RelayMessage};

/// Default channel capacity for relay broadcasts.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Settings for an [`Authority`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// How many messages a receiver may fall behind before it lags.
    pub capacity: usize,
    /// Attach a state digest to every `digest_interval`th confirmed event.
    /// Zero disables digests.
    pub digest_interval: u64,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            digest_interval: 1,
        }
    }
}

struct Inner<S> {
    system: System<S>,
    history: Vec<ConfirmedEvent>,
}

/// Confirms events against the authoritative system and broadcasts them.
///
/// Clones share the same system, history, and channel.
///
/// # Example
///
/// ```ignore
/// let authority = Authority::new(build_system());
/// let mut rx = authority.subscribe();
///
/// authority.submit("alice", &inc.event(&2)?).await?;
/// participant.catch_up(&mut rx)?;
/// ```
pub struct Authority<S> {
    inner: Arc<Mutex<Inner<S>>>,
    sender: broadcast::Sender<RelayMessage>,
    digest_interval: u64,
}

impl<S> Authority<S>
where
    S: Clone + Serialize + Send + Sync + 'static,
{
    pub fn new(system: System<S>) -> Self {
        Self::with_config(system, &AuthorityConfig::default())
    }

    pub fn with_config(system: System<S>, config: &AuthorityConfig) -> Self {
        // broadcast::channel panics on zero capacity
        let (sender, _) = broadcast::channel(config.capacity.max(1));
        Self {
            inner: Arc::new(Mutex::new(Inner {
                system,
                history: Vec::new(),
            })),
            sender,
            digest_interval: config.digest_interval,
        }
    }

    /// Confirm `event` as dispatched by `dispatcher`.
    ///
    /// Rejected events are returned as errors and never reach history or
    /// participants.
    pub async fn submit(&self, dispatcher: &str, event: &Event) -> Result<ConfirmedEvent, RelayError> {
        let mut inner = self.inner.lock().await;
        inner.system.dispatch(dispatcher, event)?;

        let sequence = inner.history.len() as u64 + 1;
        let digest = if self.digest_interval > 0 && sequence % self.digest_interval == 0 {
            inner
                .system
                .source_digest()
                .map_err(|e| warn!(sequence, error = %e, "state digest unavailable"))
                .ok()
        } else {
            None
        };

        let confirmed = ConfirmedEvent {
            id: Uuid::new_v4(),
            sequence,
            dispatcher: dispatcher.to_string(),
            event: event.clone(),
            confirmed_at: Utc::now(),
            digest,
        };
        inner.history.push(confirmed.clone());

        let receivers = self
            .sender
            .send(RelayMessage::Confirmed(confirmed.clone()))
            .unwrap_or(0);
        debug!(
            sequence,
            dispatcher = %dispatcher,
            type_tag = %event.type_tag,
            receivers,
            "event confirmed"
        );

        Ok(confirmed)
    }

    /// Receive every message broadcast after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayMessage> {
        self.sender.subscribe()
    }

    /// History and a receiver taken at the same instant, so nothing confirmed
    /// in between is missed or seen twice.
    pub async fn join(&self) -> (Vec<ConfirmedEvent>, broadcast::Receiver<RelayMessage>) {
        let inner = self.inner.lock().await;
        (inner.history.clone(), self.sender.subscribe())
    }

    /// Every confirmed event since creation or the last reset, in order.
    pub async fn history(&self) -> Vec<ConfirmedEvent> {
        self.inner.lock().await.history.clone()
    }

    pub async fn source_state(&self) -> Arc<S> {
        self.inner.lock().await.system.source_state()
    }

    /// Restore the initial state, clear history, and tell participants.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.system.reset();
        inner.history.clear();
        let receivers = self.sender.send(RelayMessage::Reset).unwrap_or(0);
        info!(receivers, "authority reset");
    }

    /// Returns the number of active receivers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<S> Clone for Authority<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            sender: self.sender.clone(),
            digest_interval: self.digest_interval,
        }
    }
}

impl<S> fmt::Debug for Authority<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authority")
            .field("subscriber_count", &self.sender.receiver_count())
            .field("digest_interval", &self.digest_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tandem_testing::{counter_system, Counter};

    #[tokio::test]
    async fn test_submit_broadcasts_in_order() {
        let fx = counter_system();
        let inc = fx.inc.clone();
        let authority = Authority::new(fx.system);
        let mut rx = authority.subscribe();

        authority.submit("root", &inc.event(&2).unwrap()).await.unwrap();
        authority.submit("another", &inc.event(&3).unwrap()).await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.sequence(), Some(1));
        assert_eq!(second.sequence(), Some(2));
        assert_eq!(*authority.source_state().await, Counter::new(45));
    }

    #[tokio::test]
    async fn test_rejected_event_is_not_recorded() {
        let authority = Authority::new(counter_system().system);
        let mut rx = authority.subscribe();

        let err = authority
            .submit("root", &Event::new("inc", json!("two")))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Dispatch(_)));
        assert!(authority.history().await.is_empty());
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_digest_interval() {
        let fx = counter_system();
        let inc = fx.inc.clone();
        let config = AuthorityConfig {
            digest_interval: 2,
            ..AuthorityConfig::default()
        };
        let authority = Authority::with_config(fx.system, &config);

        for _ in 0..4 {
            authority.submit("root", &inc.event(&1).unwrap()).await.unwrap();
        }

        let attached: Vec<bool> = authority
            .history()
            .await
            .iter()
            .map(|c| c.digest.is_some())
            .collect();
        assert_eq!(attached, vec![false, true, false, true]);
    }

    #[tokio::test]
    async fn test_reset_clears_history() {
        let fx = counter_system();
        let inc = fx.inc.clone();
        let authority = Authority::new(fx.system);

        authority.submit("root", &inc.event(&2).unwrap()).await.unwrap();
        let (history, mut rx) = authority.join().await;
        assert_eq!(history.len(), 1);

        authority.reset().await;

        assert_eq!(rx.recv().await.unwrap(), RelayMessage::Reset);
        assert!(authority.history().await.is_empty());
        assert_eq!(*authority.source_state().await, Counter::new(0));

        // Sequences restart after a reset
        let confirmed = authority.submit("root", &inc.event(&2).unwrap()).await.unwrap();
        assert_eq!(confirmed.sequence, 1);
    }

    #[test]
    fn test_config_defaults() {
        let config: AuthorityConfig = serde_json::from_value(json!({ "capacity": 8 })).unwrap();
        assert_eq!(config.capacity, 8);
        assert_eq!(config.digest_interval, 1);
    }
}
