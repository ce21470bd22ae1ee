//! The optimistic ledger: pending events awaiting confirmation or expiry.
//!
//! Entries are kept in insertion order. Replay walks them front to back, so
//! the order they were proposed in is the order their effects stack in.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::core::Event;
use crate::digest::Fingerprint;
use crate::registry::ErasedPayload;

/// One optimistic event that has not been confirmed yet.
pub struct LedgerEntry {
    fingerprint: Fingerprint,
    dispatcher: String,
    event: Event,
    payload: ErasedPayload,
    expires_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        dispatcher: impl Into<String>,
        event: Event,
        payload: ErasedPayload,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let dispatcher = dispatcher.into();
        Self {
            fingerprint: Fingerprint::of(&dispatcher, &event),
            dispatcher,
            event,
            payload,
            expires_at,
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn dispatcher(&self) -> &str {
        &self.dispatcher
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    /// The validated payload, as the handler receives it.
    pub fn payload(&self) -> &ErasedPayload {
        &self.payload
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// An entry is expired once `now` reaches its expiry time.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl fmt::Debug for LedgerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerEntry")
            .field("fingerprint", &self.fingerprint.as_str())
            .field("dispatcher", &self.dispatcher)
            .field("event", &self.event)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// FIFO list of pending optimistic events.
#[derive(Debug, Default)]
pub struct OptimisticLedger {
    entries: VecDeque<LedgerEntry>,
}

impl OptimisticLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every entry with `expires_at <= now`.
    ///
    /// Returns whether anything was removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| !entry.is_expired(now));
        let pruned = before - self.entries.len();
        if pruned > 0 {
            trace!(pruned, remaining = self.entries.len(), "pruned expired optimistic entries");
        }
        pruned > 0
    }

    /// Add an entry at the tail.
    pub fn append(&mut self, entry: LedgerEntry) {
        trace!(fingerprint = %entry.fingerprint, dispatcher = %entry.dispatcher, "optimistic entry appended");
        self.entries.push_back(entry);
    }

    /// Remove the oldest entry with this fingerprint, if any.
    ///
    /// One confirmation consumes one pending occurrence; later duplicates
    /// stay pending.
    pub fn remove_first_matching(&mut self, fingerprint: &Fingerprint) -> Option<LedgerEntry> {
        let index = self
            .entries
            .iter()
            .position(|entry| &entry.fingerprint == fingerprint)?;
        self.entries.remove(index)
    }

    /// Remove and return the entry at `index`.
    pub(crate) fn remove_at(&mut self, index: usize) -> Option<LedgerEntry> {
        self.entries.remove(index)
    }

    /// Drop every entry. Returns whether the ledger held anything.
    pub fn clear(&mut self) -> bool {
        let had_entries = !self.entries.is_empty();
        self.entries.clear();
        had_entries
    }

    /// Entries in insertion order.
    pub fn entries_in_order(&self) -> impl ExactSizeIterator<Item = &LedgerEntry> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
