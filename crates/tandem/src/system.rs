//! The dispatch coordinator.
//!
//! [`System`] is the only component that touches both the state container
//! and the optimistic ledger. Each dispatch runs to completion before the
//! next one starts:
//!
//! ```text
//! dispatch(dispatcher, event, kind)
//!     │
//!     ├─► registry.resolve(type)        ── unknown  ─► Err(UnknownActionType)
//!     ├─► action.validate(payload)      ── rejected ─► Err(PayloadValidation)
//!     ├─► ledger.prune(now)
//!     │
//!     ├─ Optimistic ─► apply to optimistic ─► ledger.append(entry)
//!     │
//!     └─ Confirmed ──► apply to source ─► collapse optimistic ─► notify confirmed
//!                          └─► ledger.remove_first_matching ─► replay pending
//!     │
//!     └─► notify optimistic ─► Ok(Accepted)
//! ```
//!
//! # Concurrency
//!
//! `System` has no internal locking. Hosts that receive events from several
//! tasks must serialize calls per system, e.g. behind one mutex or actor.
//!
//! # Expiry
//!
//! Expired entries are pruned lazily, on dispatch. A host that dispatches
//! rarely should call [`System::flush_expired_optimistic_state`] on a timer to
//! reclaim memory and drop stale optimistic effects.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{lifetime_from_secs, SystemConfig};
use crate::core::{Action, Event};
use crate::digest::{Fingerprint, StateDigest};
use crate::error::{DispatchError, IntegrityMismatch, TandemError};
use crate::ledger::{LedgerEntry, OptimisticLedger};
use crate::registry::{ActionRegistry, HandlerOutput};
use crate::state::StateContainer;
use crate::subscription::{Channel, SubscriptionHub};
use crate::validate::PayloadValidator;

/// Whether a dispatch is authoritative or a local prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchKind {
    /// Confirmed by the authority; applied to the source state.
    #[default]
    Confirmed,
    /// Predicted locally; applied to the optimistic state only.
    Optimistic,
}

/// A successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub kind: DispatchKind,
    /// Fingerprint of the dispatched `(dispatcher, event)` pair.
    pub fingerprint: Fingerprint,
    /// For confirmed dispatches: whether a pending optimistic entry was
    /// consumed by this confirmation.
    pub matched_pending: bool,
}

/// Outcome of [`System::load_history`].
#[derive(Debug, Default)]
pub struct HistoryReport {
    pub applied: usize,
    /// Position in the history and reason for each rejected entry.
    pub rejected: Vec<(usize, DispatchError)>,
}

impl HistoryReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Builder for [`System`].
///
/// # Example
///
/// ```ignore
/// let system = SystemBuilder::new(Counter::default())
///     .with_optimistic_lifetime(chrono::Duration::milliseconds(500))
///     .build();
/// ```
pub struct SystemBuilder<S> {
    initial: S,
    optimistic_lifetime: Duration,
    clock: Arc<dyn Clock>,
}

impl<S: Clone + 'static> SystemBuilder<S> {
    pub fn new(initial: S) -> Self {
        Self {
            initial,
            optimistic_lifetime: SystemConfig::default().optimistic_lifetime(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Apply settings loaded by the host.
    pub fn with_config(mut self, config: &SystemConfig) -> Self {
        self.optimistic_lifetime = config.optimistic_lifetime();
        self
    }

    /// How long an optimistic event stays pending without confirmation.
    pub fn with_optimistic_lifetime(mut self, lifetime: Duration) -> Self {
        self.optimistic_lifetime = lifetime;
        self
    }

    /// Use `clock` instead of the wall clock for expiry.
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn build(self) -> System<S> {
        System {
            registry: ActionRegistry::new(),
            state: StateContainer::new(self.initial),
            ledger: OptimisticLedger::new(),
            hub: SubscriptionHub::new(),
            clock: self.clock,
            optimistic_lifetime: self.optimistic_lifetime,
        }
    }
}

/// A typed state plus the events that may change it.
///
/// # Example
///
/// ```ignore
/// let mut system = System::new(Counter { data: 0 });
/// system.on_confirmed_change(|state| println!("confirmed: {state:?}"));
///
/// let inc = system.register("inc", Typed::<i64>::new(), |state: &mut Counter, dispatcher: &str, amount: &i64| {
///     state.data = (state.data + dispatcher.len() as i64) * amount;
/// })?;
///
/// system.dispatch("root", &inc.event(&2)?)?;
/// assert_eq!(system.source_state().data, 8);
/// ```
pub struct System<S> {
    registry: ActionRegistry<S>,
    state: StateContainer<S>,
    ledger: OptimisticLedger,
    hub: SubscriptionHub<S>,
    clock: Arc<dyn Clock>,
    optimistic_lifetime: Duration,
}

impl<S: Clone + 'static> System<S> {
    /// Create a system with default settings.
    pub fn new(initial: S) -> Self {
        SystemBuilder::new(initial).build()
    }

    pub fn builder(initial: S) -> SystemBuilder<S> {
        SystemBuilder::new(initial)
    }

    // =========================================================================
    // Setup
    // =========================================================================

    /// Register an action. See [`ActionRegistry::register`].
    pub fn register<V, F, R>(
        &mut self,
        type_tag: impl Into<String>,
        validator: V,
        handler: F,
    ) -> Result<Action<V::Output>, TandemError>
    where
        V: PayloadValidator,
        F: Fn(&mut S, &str, &V::Output) -> R + Send + Sync + 'static,
        R: HandlerOutput<S>,
    {
        self.registry.register(type_tag, validator, handler)
    }

    pub fn is_registered(&self, type_tag: &str) -> bool {
        self.registry.contains(type_tag)
    }

    /// Observe every new source state.
    pub fn on_confirmed_change<F>(&mut self, subscriber: F)
    where
        F: Fn(&Arc<S>) + Send + Sync + 'static,
    {
        self.hub.on_confirmed_change(subscriber);
    }

    /// Observe every new optimistic state.
    pub fn on_optimistic_change<F>(&mut self, subscriber: F)
    where
        F: Fn(&Arc<S>) + Send + Sync + 'static,
    {
        self.hub.on_optimistic_change(subscriber);
    }

    pub fn optimistic_lifetime(&self) -> Duration {
        self.optimistic_lifetime
    }

    /// Change the lifetime of optimistic entries appended from now on.
    ///
    /// Entries already pending keep the expiry they were created with.
    pub fn set_optimistic_lifetime(&mut self, lifetime: Duration) {
        self.optimistic_lifetime = lifetime;
    }

    pub fn set_optimistic_lifetime_secs(&mut self, secs: f64) {
        self.optimistic_lifetime = lifetime_from_secs(secs);
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Dispatch a confirmed event.
    pub fn dispatch(&mut self, dispatcher: &str, event: &Event) -> Result<Accepted, DispatchError> {
        self.dispatch_with(dispatcher, event, DispatchKind::Confirmed)
    }

    /// Dispatch an event optimistically, pending confirmation.
    pub fn dispatch_optimistic(&mut self, dispatcher: &str, event: &Event) -> Result<Accepted, DispatchError> {
        self.dispatch_with(dispatcher, event, DispatchKind::Optimistic)
    }

    /// Validate and apply `event` as dispatched by `dispatcher`.
    ///
    /// Unknown types and invalid payloads are rejected before anything
    /// changes. Otherwise expired ledger entries are pruned, the handler is
    /// applied to the state `kind` selects, and subscribers are notified:
    /// the confirmed channel for confirmed dispatches, the optimistic channel
    /// for every accepted dispatch.
    pub fn dispatch_with(
        &mut self,
        dispatcher: &str,
        event: &Event,
        kind: DispatchKind,
    ) -> Result<Accepted, DispatchError> {
        let Some(action) = self.registry.resolve(&event.type_tag) else {
            warn!(dispatcher = %dispatcher, type_tag = %event.type_tag, "unknown action type");
            return Err(DispatchError::UnknownActionType {
                type_tag: event.type_tag.clone(),
            });
        };

        let payload = match action.validate(event.payload.as_ref()) {
            Ok(payload) => payload,
            Err(source) => {
                warn!(dispatcher = %dispatcher, type_tag = %event.type_tag, error = %source, "payload rejected");
                return Err(DispatchError::PayloadValidation {
                    type_tag: event.type_tag.clone(),
                    source,
                });
            }
        };

        let now = self.clock.now();
        let pruned = self.ledger.prune(now);
        let fingerprint = Fingerprint::of(dispatcher, event);

        let applied = match kind {
            DispatchKind::Optimistic => {
                // Keep the optimistic state derivable from source + ledger
                if pruned {
                    replay_pending(&self.registry, &mut self.state, &mut self.ledger);
                }
                self.state
                    .apply_to_optimistic(|draft| action.handle(draft, dispatcher, &payload))
                    .map(|()| {
                        let expires_at = expiry_after(now, self.optimistic_lifetime);
                        self.ledger
                            .append(LedgerEntry::new(dispatcher, event.clone(), payload.clone(), expires_at));
                        false
                    })
            }
            DispatchKind::Confirmed => {
                match self
                    .state
                    .apply_to_source(|draft| action.handle(draft, dispatcher, &payload))
                {
                    Ok(()) => {
                        self.state.reset_optimistic_to_source();
                        self.hub.notify(Channel::Confirmed, self.state.source());

                        let matched = self.ledger.remove_first_matching(&fingerprint).is_some();
                        replay_pending(&self.registry, &mut self.state, &mut self.ledger);
                        Ok(matched)
                    }
                    Err(e) => {
                        if pruned {
                            replay_pending(&self.registry, &mut self.state, &mut self.ledger);
                        }
                        Err(e)
                    }
                }
            }
        };

        let matched_pending = match applied {
            Ok(matched) => matched,
            Err(source) => {
                warn!(dispatcher = %dispatcher, type_tag = %event.type_tag, error = %source, "handler failed");
                // Pruning already changed the optimistic state
                if pruned {
                    self.hub.notify(Channel::Optimistic, self.state.optimistic());
                }
                return Err(DispatchError::HandlerFailed {
                    type_tag: event.type_tag.clone(),
                    source,
                });
            }
        };

        self.hub.notify(Channel::Optimistic, self.state.optimistic());

        debug!(
            dispatcher = %dispatcher,
            type_tag = %event.type_tag,
            ?kind,
            fingerprint = %fingerprint,
            matched_pending,
            pending = self.ledger.len(),
            "dispatch accepted"
        );

        Ok(Accepted {
            kind,
            fingerprint,
            matched_pending,
        })
    }

    /// Apply a confirmed history in order, e.g. when a participant reconnects.
    ///
    /// Rejected entries are reported and skipped; the rest still apply.
    pub fn load_history<'a, I>(&mut self, history: I) -> HistoryReport
    where
        I: IntoIterator<Item = (&'a str, &'a Event)>,
    {
        let mut report = HistoryReport::default();
        for (index, (dispatcher, event)) in history.into_iter().enumerate() {
            match self.dispatch(dispatcher, event) {
                Ok(_) => report.applied += 1,
                Err(e) => {
                    warn!(index, dispatcher = %dispatcher, error = %e, "history entry rejected");
                    report.rejected.push((index, e));
                }
            }
        }
        info!(applied = report.applied, rejected = report.rejected.len(), "history loaded");
        report
    }

    // =========================================================================
    // Flushing and reset
    // =========================================================================

    /// Drop every pending optimistic event and collapse onto the source state.
    ///
    /// Does nothing, and notifies nobody, when nothing is pending.
    pub fn flush_optimistic_state(&mut self) {
        if !self.ledger.clear() {
            return;
        }
        self.state.reset_optimistic_to_source();
        debug!("optimistic state flushed");
        self.hub.notify(Channel::Optimistic, self.state.optimistic());
    }

    /// Drop expired optimistic events and rebuild from the survivors.
    ///
    /// Notifies optimistic subscribers only when something expired.
    pub fn flush_expired_optimistic_state(&mut self) {
        let now = self.clock.now();
        if !self.ledger.prune(now) {
            return;
        }
        replay_pending(&self.registry, &mut self.state, &mut self.ledger);
        self.hub.notify(Channel::Optimistic, self.state.optimistic());
    }

    /// Restore the initial state, drop all pending events, and notify both
    /// channels once.
    pub fn reset(&mut self) {
        self.state.hard_reset();
        self.ledger.clear();
        info!("system reset to initial state");
        self.hub.notify(Channel::Confirmed, self.state.source());
        self.hub.notify(Channel::Optimistic, self.state.optimistic());
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// The state the system was constructed with.
    pub fn initial_state(&self) -> Arc<S> {
        Arc::clone(self.state.initial())
    }

    /// The confirmed state.
    pub fn source_state(&self) -> Arc<S> {
        Arc::clone(self.state.source())
    }

    /// The source state with every pending event replayed on top.
    pub fn optimistic_state(&self) -> Arc<S> {
        Arc::clone(self.state.optimistic())
    }

    /// Pending optimistic entries, oldest first.
    pub fn pending(&self) -> impl ExactSizeIterator<Item = &LedgerEntry> + '_ {
        self.ledger.entries_in_order()
    }

    pub fn pending_len(&self) -> usize {
        self.ledger.len()
    }
}

impl<S: Clone + Serialize + 'static> System<S> {
    /// Digest of the current source state, for integrity checks with peers.
    pub fn source_digest(&self) -> Result<StateDigest, TandemError> {
        StateDigest::of(self.state.source().as_ref())
    }

    /// Compare the local source state against a digest from the authority.
    ///
    /// A serialization failure counts as a mismatch against an empty digest.
    pub fn verify_source_digest(&self, expected: &StateDigest) -> Result<(), IntegrityMismatch> {
        let actual = self
            .source_digest()
            .unwrap_or_else(|_| StateDigest::from_hex(String::new()));
        if &actual == expected {
            Ok(())
        } else {
            Err(IntegrityMismatch {
                expected: expected.clone(),
                actual,
            })
        }
    }
}

impl<S> fmt::Debug for System<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("registry", &self.registry)
            .field("pending", &self.ledger.len())
            .field("hub", &self.hub)
            .field("optimistic_lifetime", &self.optimistic_lifetime)
            .finish_non_exhaustive()
    }
}

/// `now + lifetime`, saturating at the ends of the representable range.
///
/// A lifetime too large to add never expires; one too negative has already
/// expired.
fn expiry_after(now: DateTime<Utc>, lifetime: Duration) -> DateTime<Utc> {
    now.checked_add_signed(lifetime).unwrap_or(if lifetime < Duration::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Rebuild the optimistic state: source state, then every pending entry in
/// ledger order. Entries whose handler fails are dropped from the ledger.
fn replay_pending<S: Clone + 'static>(
    registry: &ActionRegistry<S>,
    state: &mut StateContainer<S>,
    ledger: &mut OptimisticLedger,
) {
    state.reset_optimistic_to_source();

    let mut failed = Vec::new();
    for (index, entry) in ledger.entries_in_order().enumerate() {
        let type_tag = &entry.event().type_tag;
        let result = match registry.resolve(type_tag) {
            Some(action) => {
                state.apply_to_optimistic(|draft| action.handle(draft, entry.dispatcher(), entry.payload()))
            }
            None => Err(anyhow::anyhow!("no action registered for {type_tag}")),
        };
        if let Err(error) = result {
            warn!(
                fingerprint = %entry.fingerprint(),
                dispatcher = %entry.dispatcher(),
                type_tag = %type_tag,
                error = %error,
                "dropping optimistic entry that failed to replay"
            );
            failed.push(index);
        }
    }

    for index in failed.into_iter().rev() {
        ledger.remove_at(index);
    }

    debug!(pending = ledger.len(), "optimistic state replayed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::registry::Applied;
    use crate::validate::{Absent, Typed};
    use serde::Deserialize;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        data: i64,
    }

    type Log = Arc<Mutex<Vec<i64>>>;

    struct Fixture {
        system: System<Counter>,
        inc: Action<i64>,
        clock: ManualClock,
        confirmed: Log,
        optimistic: Log,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::default();
        let mut system = System::builder(Counter { data: 0 })
            .with_clock(clock.clone())
            .build();
        let inc = system
            .register("inc", Typed::<i64>::new(), |state: &mut Counter, dispatcher: &str, amount: &i64| {
                state.data += dispatcher.len() as i64;
                state.data *= *amount;
            })
            .unwrap();

        let confirmed: Log = Arc::default();
        let optimistic: Log = Arc::default();
        {
            let confirmed = confirmed.clone();
            system.on_confirmed_change(move |s| confirmed.lock().unwrap().push(s.data));
        }
        {
            let optimistic = optimistic.clone();
            system.on_optimistic_change(move |s| optimistic.lock().unwrap().push(s.data));
        }

        Fixture {
            system,
            inc,
            clock,
            confirmed,
            optimistic,
        }
    }

    fn calls(log: &Log) -> Vec<i64> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn test_confirmed_dispatch_notifies_both_channels() {
        let mut f = fixture();
        let accepted = f.system.dispatch("root", &f.inc.event(&2).unwrap()).unwrap();

        assert_eq!(accepted.kind, DispatchKind::Confirmed);
        assert!(!accepted.matched_pending);
        assert_eq!(calls(&f.confirmed), vec![8]);
        assert_eq!(calls(&f.optimistic), vec![8]);
    }

    #[test]
    fn test_rejections_change_nothing() {
        let mut f = fixture();

        let err = f
            .system
            .dispatch("root", &Event::new("missing", serde_json::json!(1)))
            .unwrap_err();
        assert!(err.is_unknown_type());

        let err = f
            .system
            .dispatch("root", &Event::new("inc", serde_json::json!("x")))
            .unwrap_err();
        assert!(err.validation().is_some());

        assert!(calls(&f.confirmed).is_empty());
        assert!(calls(&f.optimistic).is_empty());
        assert_eq!(f.system.source_state().data, 0);
    }

    #[test]
    fn test_optimistic_entry_expires_at_lifetime() {
        let mut f = fixture();
        f.system.set_optimistic_lifetime(Duration::seconds(5));
        let start = f.clock.now();

        f.system.dispatch_optimistic("root", &f.inc.event(&1).unwrap()).unwrap();

        let entry = f.system.pending().next().unwrap();
        assert_eq!(entry.expires_at(), start + Duration::seconds(5));

        f.clock.advance(Duration::seconds(5));
        f.system.flush_expired_optimistic_state();
        assert_eq!(f.system.pending_len(), 0);
        assert_eq!(f.system.optimistic_state().data, 0);
    }

    #[test]
    fn test_unbounded_lifetimes_do_not_overflow() {
        let mut f = fixture();

        for secs in [f64::INFINITY, 1e13] {
            f.system.set_optimistic_lifetime_secs(secs);
            f.system.dispatch_optimistic("root", &f.inc.event(&1).unwrap()).unwrap();
        }
        assert_eq!(f.system.pending().last().unwrap().expires_at(), DateTime::<Utc>::MAX_UTC);

        f.clock.advance(Duration::days(365 * 1000));
        f.system.flush_expired_optimistic_state();
        assert_eq!(f.system.pending_len(), 2);

        f.system.set_optimistic_lifetime_secs(f64::NEG_INFINITY);
        f.system.dispatch_optimistic("root", &f.inc.event(&1).unwrap()).unwrap();
        f.system.flush_expired_optimistic_state();
        assert_eq!(f.system.pending_len(), 2);
    }

    #[test]
    fn test_expiry_saturates() {
        let now = Utc::now();
        assert_eq!(expiry_after(now, Duration::MAX), DateTime::<Utc>::MAX_UTC);
        assert_eq!(expiry_after(now, Duration::MIN), DateTime::<Utc>::MIN_UTC);
        assert_eq!(expiry_after(now, Duration::seconds(1)), now + Duration::seconds(1));
    }

    #[test]
    fn test_prune_during_optimistic_dispatch_rebuilds_first() {
        let mut f = fixture();
        f.system.set_optimistic_lifetime(Duration::seconds(1));
        f.system.dispatch_optimistic("admin", &f.inc.event(&2).unwrap()).unwrap();
        assert_eq!(f.system.optimistic_state().data, 10);

        f.clock.advance(Duration::seconds(2));
        f.system.dispatch_optimistic("root", &f.inc.event(&6).unwrap()).unwrap();

        // (0 + 4) * 6: the expired admin effect is gone
        assert_eq!(f.system.optimistic_state().data, 24);
        assert_eq!(f.system.pending_len(), 1);
    }

    #[test]
    fn test_failing_handler_is_recoverable() {
        let mut system = System::new(Counter { data: 1 });
        system
            .register("explode", Absent, |state: &mut Counter, _: &str, _: &()| -> anyhow::Result<()> {
                state.data = 999;
                anyhow::bail!("refusing")
            })
            .unwrap();

        let err = system.dispatch("root", &Event::bare("explode")).unwrap_err();
        assert!(matches!(err, DispatchError::HandlerFailed { .. }));
        assert_eq!(system.source_state().data, 1);

        let err = system.dispatch_optimistic("root", &Event::bare("explode")).unwrap_err();
        assert!(matches!(err, DispatchError::HandlerFailed { .. }));
        assert_eq!(system.optimistic_state().data, 1);
        assert_eq!(system.pending_len(), 0);
    }

    #[test]
    fn test_entry_failing_on_replay_is_dropped() {
        let mut system = System::new(Counter { data: 0 });
        let set = system
            .register("set", Typed::<i64>::new(), |_: &mut Counter, _: &str, value: &i64| {
                Applied::Replaced(Counter { data: *value })
            })
            .unwrap();
        // Only succeeds while the state is still zero
        let first = system
            .register("first", Absent, |state: &mut Counter, _: &str, _: &()| -> anyhow::Result<()> {
                anyhow::ensure!(state.data == 0, "already set");
                state.data = -1;
                Ok(())
            })
            .unwrap();

        system.dispatch_optimistic("root", &first.bare()).unwrap();
        assert_eq!(system.optimistic_state().data, -1);

        system.dispatch("root", &set.event(&7).unwrap()).unwrap();
        assert_eq!(system.pending_len(), 0);
        assert_eq!(system.optimistic_state().data, 7);
    }

    #[test]
    fn test_source_digest_round_trip() {
        let mut f = fixture();
        f.system.dispatch("root", &f.inc.event(&2).unwrap()).unwrap();

        let digest = f.system.source_digest().unwrap();
        assert_eq!(digest, StateDigest::of(&Counter { data: 8 }).unwrap());
        f.system.verify_source_digest(&digest).unwrap();

        let stale = StateDigest::of(&Counter { data: 0 }).unwrap();
        let mismatch = f.system.verify_source_digest(&stale).unwrap_err();
        assert_eq!(mismatch.actual, digest);
    }

    #[test]
    fn test_load_history_skips_rejected_entries() {
        let mut f = fixture();
        let good = f.inc.event(&2).unwrap();
        let bad = Event::new("inc", serde_json::json!("two"));
        let unknown = Event::bare("nope");

        let report = f
            .system
            .load_history([("root", &good), ("root", &bad), ("root", &unknown), ("another", &good)]);

        assert_eq!(report.applied, 2);
        assert_eq!(
            report.rejected.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(!report.is_clean());
        // (0 + 4) * 2 = 8, then (8 + 7) * 2 = 30
        assert_eq!(f.system.source_state().data, 30);
    }

    #[test]
    fn test_builder_config() {
        let config = SystemConfig {
            optimistic_lifetime_secs: 0.5,
        };
        let system = System::builder(Counter { data: 0 }).with_config(&config).build();
        assert_eq!(system.optimistic_lifetime(), Duration::milliseconds(500));

        let mut system = System::new(Counter { data: 0 });
        system.set_optimistic_lifetime_secs(-1.0);
        assert_eq!(system.optimistic_lifetime(), Duration::seconds(-1));
    }
}
