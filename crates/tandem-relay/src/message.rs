//! Messages an authority broadcasts to its participants.
//!
//! Both types serialize with serde so hosts can put them on any wire; the
//! framing is up to the host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tandem_core::{Event, StateDigest};
use uuid::Uuid;

/// An event the authority accepted, in confirmation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedEvent {
    pub id: Uuid,
    /// Position in the authority's history, starting at 1.
    pub sequence: u64,
    pub dispatcher: String,
    pub event: Event,
    pub confirmed_at: DateTime<Utc>,
    /// Digest of the authority's source state after this event, when one was
    /// attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<StateDigest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelayMessage {
    Confirmed(ConfirmedEvent),
    /// The authority restored its initial state and cleared its history.
    Reset,
}

impl RelayMessage {
    pub fn sequence(&self) -> Option<u64> {
        match self {
            RelayMessage::Confirmed(confirmed) => Some(confirmed.sequence),
            RelayMessage::Reset => None,
        }
    }
}
