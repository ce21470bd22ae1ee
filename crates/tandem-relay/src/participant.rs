//! The predicting side of the relay.
//!
//! A [`Participant`] mirrors the authority's system locally. Its own events
//! go in optimistically via [`Participant::propose`]; confirmed events from
//! the authority arrive through [`Participant::apply`] and reconcile them.

use std::fmt;

use serde::Serialize;
use tandem_core::{Accepted, Event, HistoryReport, System};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::message::{ConfirmedEvent, RelayMessage};

pub struct Participant<S> {
    id: String,
    system: System<S>,
    last_sequence: u64,
}

impl<S> Participant<S>
where
    S: Clone + Serialize + 'static,
{
    /// `system` must register the same actions as the authority's.
    pub fn new(id: impl Into<String>, system: System<S>) -> Self {
        Self {
            id: id.into(),
            system,
            last_sequence: 0,
        }
    }

    /// The dispatcher id this participant proposes under.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn system(&self) -> &System<S> {
        &self.system
    }

    /// Access for registering subscribers or tuning the lifetime.
    pub fn system_mut(&mut self) -> &mut System<S> {
        &mut self.system
    }

    /// Sequence of the last confirmed event applied locally.
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Predict `event` locally. The host still has to submit it to the
    /// authority.
    pub fn propose(&mut self, event: &Event) -> Result<Accepted, RelayError> {
        Ok(self.system.dispatch_optimistic(&self.id, event)?)
    }

    /// Apply one broadcast message.
    ///
    /// Confirmed events already applied (by sequence) are skipped, so a
    /// message seen both in history and on the channel applies once. A
    /// confirmed event further ahead than the next sequence is refused with
    /// [`RelayError::SequenceGap`]; the participant must resync first.
    pub fn apply(&mut self, message: &RelayMessage) -> Result<(), RelayError> {
        match message {
            RelayMessage::Confirmed(confirmed) => self.apply_confirmed(confirmed),
            RelayMessage::Reset => {
                self.system.reset();
                self.last_sequence = 0;
                info!(participant = %self.id, "participant reset by authority");
                Ok(())
            }
        }
    }

    fn apply_confirmed(&mut self, confirmed: &ConfirmedEvent) -> Result<(), RelayError> {
        if confirmed.sequence <= self.last_sequence {
            debug!(participant = %self.id, sequence = confirmed.sequence, "already applied");
            return Ok(());
        }

        let expected = self.last_sequence + 1;
        if confirmed.sequence != expected {
            warn!(
                participant = %self.id,
                expected,
                received = confirmed.sequence,
                "confirmed event out of sequence"
            );
            return Err(RelayError::SequenceGap {
                expected,
                received: confirmed.sequence,
            });
        }

        let accepted = self.system.dispatch(&confirmed.dispatcher, &confirmed.event)?;
        self.last_sequence = confirmed.sequence;

        if let Some(expected) = &confirmed.digest {
            self.system.verify_source_digest(expected).map_err(|mismatch| {
                warn!(
                    participant = %self.id,
                    sequence = confirmed.sequence,
                    error = %mismatch,
                    "source state diverged"
                );
                mismatch
            })?;
        }

        debug!(
            participant = %self.id,
            sequence = confirmed.sequence,
            matched_pending = accepted.matched_pending,
            pending = self.system.pending_len(),
            "confirmed event applied"
        );
        Ok(())
    }

    /// Discard local state and rebuild it from the authority's history.
    ///
    /// Pending predictions are dropped along with everything else.
    pub fn resync(&mut self, history: &[ConfirmedEvent]) -> HistoryReport {
        self.system.reset();
        let report = self
            .system
            .load_history(history.iter().map(|c| (c.dispatcher.as_str(), &c.event)));
        self.last_sequence = history.last().map_or(0, |c| c.sequence);
        info!(
            participant = %self.id,
            applied = report.applied,
            last_sequence = self.last_sequence,
            "participant resynced"
        );
        report
    }

    /// Apply every message already waiting on `receiver`, without blocking.
    ///
    /// Returns how many were applied.
    pub fn catch_up(&mut self, receiver: &mut broadcast::Receiver<RelayMessage>) -> Result<usize, RelayError> {
        let mut applied = 0;
        loop {
            match receiver.try_recv() {
                Ok(message) => {
                    self.apply(&message)?;
                    applied += 1;
                }
                Err(TryRecvError::Empty) => return Ok(applied),
                Err(TryRecvError::Lagged(n)) => {
                    warn!(participant = %self.id, missed = n, "relay lagged, missed messages");
                    return Err(RelayError::Lagged(n));
                }
                Err(TryRecvError::Closed) => return Err(RelayError::Closed),
            }
        }
    }

    /// Wait for the next message on `receiver` and apply it.
    pub async fn apply_next(&mut self, receiver: &mut broadcast::Receiver<RelayMessage>) -> Result<RelayMessage, RelayError> {
        match receiver.recv().await {
            Ok(message) => {
                self.apply(&message)?;
                Ok(message)
            }
            Err(RecvError::Lagged(n)) => {
                warn!(participant = %self.id, missed = n, "relay lagged, missed messages");
                Err(RelayError::Lagged(n))
            }
            Err(RecvError::Closed) => Err(RelayError::Closed),
        }
    }
}

impl<S> fmt::Debug for Participant<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("id", &self.id)
            .field("last_sequence", &self.last_sequence)
            .field("system", &self.system)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use tandem_core::StateDigest;
    use tandem_testing::{counter_system, Counter};
    use uuid::Uuid;

    fn confirmed(sequence: u64, dispatcher: &str, event: Event, digest: Option<StateDigest>) -> RelayMessage {
        RelayMessage::Confirmed(ConfirmedEvent {
            id: Uuid::new_v4(),
            sequence,
            dispatcher: dispatcher.to_string(),
            event,
            confirmed_at: Utc::now(),
            digest,
        })
    }

    #[test]
    fn test_propose_uses_participant_id() {
        let fx = counter_system();
        let event = fx.inc(2);
        let mut participant = Participant::new("alice", fx.system);

        participant.propose(&event).unwrap();

        let pending: Vec<_> = participant.system().pending().map(|e| e.dispatcher().to_string()).collect();
        assert_eq!(pending, vec!["alice"]);
        // (0 + 5) * 2
        assert_eq!(participant.system().optimistic_state().data, 10);
        assert_eq!(participant.system().source_state().data, 0);
    }

    #[test]
    fn test_confirmation_reconciles_prediction() {
        let fx = counter_system();
        let event = fx.inc(2);
        let mut participant = Participant::new("alice", fx.system);

        participant.propose(&event).unwrap();
        let digest = StateDigest::of(&Counter::new(10)).unwrap();
        participant.apply(&confirmed(1, "alice", event, Some(digest))).unwrap();

        assert_eq!(participant.system().pending_len(), 0);
        assert_eq!(participant.system().source_state().data, 10);
        assert_eq!(participant.last_sequence(), 1);
    }

    #[test]
    fn test_repeated_sequence_applies_once() {
        let fx = counter_system();
        let message = confirmed(1, "root", fx.inc(2), None);
        let mut participant = Participant::new("alice", fx.system);

        participant.apply(&message).unwrap();
        participant.apply(&message).unwrap();

        assert_eq!(participant.system().source_state().data, 8);
    }

    #[test]
    fn test_sequence_gap_is_refused() {
        let fx = counter_system();
        let event = fx.inc(2);
        let mut participant = Participant::new("alice", fx.system);

        let err = participant.apply(&confirmed(3, "root", event.clone(), None)).unwrap_err();

        assert!(matches!(err, RelayError::SequenceGap { expected: 1, received: 3 }));
        assert!(err.needs_resync());
        assert_eq!(participant.system().source_state().data, 0);
        assert_eq!(participant.last_sequence(), 0);

        // In-order delivery still applies
        participant.apply(&confirmed(1, "root", event, None)).unwrap();
        assert_eq!(participant.last_sequence(), 1);
    }

    #[test]
    fn test_digest_mismatch_is_reported() {
        let fx = counter_system();
        let message = confirmed(1, "root", fx.inc(2), Some(StateDigest::of(&Counter::new(9)).unwrap()));
        let mut participant = Participant::new("alice", fx.system);

        let err = participant.apply(&message).unwrap_err();

        assert!(matches!(err, RelayError::Integrity(_)));
        assert!(err.needs_resync());
    }

    #[test]
    fn test_locally_rejected_confirmation() {
        let fx = counter_system();
        let mut participant = Participant::new("alice", fx.system);

        let err = participant
            .apply(&confirmed(1, "root", Event::new("missing", json!(1)), None))
            .unwrap_err();

        assert!(matches!(err, RelayError::Dispatch(_)));
        assert_eq!(participant.last_sequence(), 0);
    }

    #[test]
    fn test_reset_message() {
        let fx = counter_system();
        let event = fx.inc(2);
        let mut participant = Participant::new("alice", fx.system);

        participant.apply(&confirmed(1, "root", event.clone(), None)).unwrap();
        participant.propose(&event).unwrap();
        participant.apply(&RelayMessage::Reset).unwrap();

        assert_eq!(participant.system().source_state().data, 0);
        assert_eq!(participant.system().pending_len(), 0);
        assert_eq!(participant.last_sequence(), 0);
    }
}
