//! # Tandem
//!
//! Optimistic state reconciliation. One authority owns the confirmed state;
//! participants predict the effect of their own events immediately and
//! reconcile when the authority confirms them.
//!
//! ## Core Concepts
//!
//! - [`Event`] = a proposed change (type tag + raw payload)
//! - **Source state** = confirmed by the authority, changed only by
//!   confirmed dispatches
//! - **Optimistic state** = source state with every pending prediction
//!   replayed on top, in the order the predictions were made
//!
//! ## Architecture
//!
//! ```text
//! Transport
//!     │
//!     ▼ dispatch(dispatcher, event, kind)
//! System ─────────────────────────────────────────────┐
//!     │                                               │
//!     ├─► ActionRegistry.resolve + validate           │
//!     │                                               │
//!     ├─► OptimisticLedger.prune(now)                 │
//!     │                                               │
//!     ├─► StateContainer.apply_to_{source,optimistic} │
//!     │                                               │
//!     ├─► OptimisticLedger.append / remove + replay   │
//!     │                                               │
//!     └─► SubscriptionHub.notify ─────────────────────┘
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Snapshots are immutable** - handlers mutate a draft; committed
//!    snapshots never change, and the initial state is never touched
//! 2. **Optimistic = source + replay** - the optimistic state can always be
//!    rebuilt from the source state and the ledger, in ledger order
//! 3. **One confirmation, one entry** - a confirmed event consumes at most one
//!    matching pending entry, so N identical predictions need N confirmations
//! 4. **Expiry is lazy** - pending entries are pruned on dispatch and on
//!    [`System::flush_expired_optimistic_state`]; there is no timer
//! 5. **Rejections are inert** - an unknown type or invalid payload changes
//!    nothing and notifies nobody
//!
//! ## Example
//!
//! ```ignore
//! use tandem_core::{System, Typed};
//!
//! #[derive(Debug, Clone)]
//! struct Counter {
//!     data: i64,
//! }
//!
//! let mut system = System::new(Counter { data: 0 });
//! let inc = system.register("inc", Typed::<i64>::new(), |state: &mut Counter, _: &str, amount: &i64| {
//!     state.data += *amount;
//! })?;
//!
//! system.on_optimistic_change(|state| println!("now showing {}", state.data));
//!
//! // Predict locally...
//! system.dispatch_optimistic("alice", &inc.event(&3)?)?;
//! assert_eq!(system.optimistic_state().data, 3);
//! assert_eq!(system.source_state().data, 0);
//!
//! // ...and reconcile when the authority confirms
//! system.dispatch("alice", &inc.event(&3)?)?;
//! assert_eq!(system.source_state().data, 3);
//! assert_eq!(system.pending_len(), 0);
//! ```
//!
//! ## What This Is Not
//!
//! Tandem is **not** a transport, a persistence layer, or a view-diffing
//! engine. Hosts forward confirmed events, store history, and decide what to
//! do when [`IntegrityMismatch`] reports divergence.

mod clock;
mod config;
mod core;
mod digest;
mod error;
mod ledger;
mod registry;
mod state;
mod subscription;
mod system;
mod validate;


pub use crate::core::{Action, Event};

pub use crate::error::{DispatchError, IntegrityMismatch, TandemError, ValidationError};

pub use digest::{Fingerprint, StateDigest};

pub use validate::{validator_fn, Absent, Checked, FnValidator, PayloadValidator, Typed, ValidatorExt};

pub use registry::{ActionDefinition, ActionRegistry, Applied, ErasedPayload, HandlerOutput};

pub use state::StateContainer;

pub use ledger::{LedgerEntry, OptimisticLedger};

pub use subscription::{Channel, Subscriber, SubscriptionHub};

pub use system::{Accepted, DispatchKind, HistoryReport, System, SystemBuilder};

pub use config::{lifetime_from_secs, SystemConfig, DEFAULT_OPTIMISTIC_LIFETIME_SECS};

pub use clock::{Clock, SystemClock};

#[cfg(any(test, feature = "testing"))]
pub use clock::ManualClock;
