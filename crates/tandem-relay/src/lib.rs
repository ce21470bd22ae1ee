//! # Tandem Relay
//!
//! In-process plumbing between one authority and any number of participants.
//!
//! ```text
//! Participant.propose(event) ── optimistic, local
//!     │
//!     ▼ host forwards the event
//! Authority.submit(dispatcher, event)
//!     │
//!     ├─► System.dispatch (confirmed)
//!     ├─► history.push(ConfirmedEvent)
//!     └─► broadcast RelayMessage::Confirmed
//!             │
//!             ▼
//!     Participant.catch_up / apply_next
//!             │
//!             ├─► System.dispatch (confirmed) ─► pending prediction consumed
//!             └─► verify digest ─► RelayError::Integrity on divergence
//! ```
//!
//! A participant that lags or diverges calls [`Participant::resync`] with
//! [`Authority::history`].
//!
//! There is no network transport here. [`RelayMessage`] serializes with serde
//! for hosts that want to ship it over one.

mod authority;
mod error;
mod message;
mod participant;

pub use authority::{Authority, AuthorityConfig, DEFAULT_CAPACITY};
pub use error::RelayError;
pub use message::{ConfirmedEvent, RelayMessage};
pub use participant::Participant;
