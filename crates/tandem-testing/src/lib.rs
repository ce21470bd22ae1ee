//! Testing utilities for tandem systems.
//!
//! - [`Recorder`] captures every snapshot a subscriber channel delivers, in
//!   order, so tests can assert on call counts and arguments.
//! - [`counter_system`] builds the small counter system most tests start from.
//!
//! # Example
//!
//! ```ignore
//! use tandem_testing::counter_system;
//!
//! let mut fx = counter_system();
//! fx.system.dispatch("root", &fx.inc(2))?;
//! assert_eq!(fx.confirmed.last().unwrap().data, 8);
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tandem_core::{Action, Event, System, Typed};

pub use tandem_core::ManualClock;

// =============================================================================
// Recorder
// =============================================================================

/// Ordered log of the snapshots delivered to one subscriber.
///
/// Clones share the same log.
pub struct Recorder<S> {
    calls: Arc<Mutex<Vec<Arc<S>>>>,
}

impl<S: Send + Sync + 'static> Recorder<S> {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A subscriber callback that records into this log.
    pub fn subscriber(&self) -> impl Fn(&Arc<S>) + Send + Sync + 'static {
        let calls = Arc::clone(&self.calls);
        move |state| {
            calls
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(Arc::clone(state))
        }
    }

    /// Subscribe to both channels of `system`, returning
    /// `(confirmed, optimistic)` recorders.
    pub fn attach(system: &mut System<S>) -> (Self, Self)
    where
        S: Clone,
    {
        let confirmed = Self::new();
        let optimistic = Self::new();
        system.on_confirmed_change(confirmed.subscriber());
        system.on_optimistic_change(optimistic.subscriber());
        (confirmed, optimistic)
    }

    pub fn call_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The snapshot passed on the `n`th call, counting from 1.
    pub fn nth(&self, n: usize) -> Option<Arc<S>> {
        n.checked_sub(1).and_then(|i| self.lock().get(i).cloned())
    }

    pub fn last(&self) -> Option<Arc<S>> {
        self.lock().last().cloned()
    }

    pub fn calls(&self) -> Vec<Arc<S>> {
        self.lock().clone()
    }

    /// Whether any call received a snapshot equal to `expected`.
    pub fn was_called_with(&self, expected: &S) -> bool
    where
        S: PartialEq,
    {
        self.lock().iter().any(|s| s.as_ref() == expected)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<S>>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<S: Send + Sync + 'static> Default for Recorder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for Recorder<S> {
    fn clone(&self) -> Self {
        Self {
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<S> fmt::Debug for Recorder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.calls.lock().map(|calls| calls.len()).unwrap_or(0);
        f.debug_struct("Recorder").field("calls", &count).finish()
    }
}

// =============================================================================
// Counter fixture
// =============================================================================

/// The state used across tandem's own tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub data: i64,
}

impl Counter {
    pub fn new(data: i64) -> Self {
        Self { data }
    }
}

/// A counter system with recorders on both channels and a manual clock.
pub struct CounterFixture {
    pub system: System<Counter>,
    pub inc: Action<i64>,
    pub confirmed: Recorder<Counter>,
    pub optimistic: Recorder<Counter>,
    pub clock: ManualClock,
}

impl CounterFixture {
    /// An `inc` event with `amount`.
    pub fn inc(&self, amount: i64) -> Event {
        self.inc
            .event(&amount)
            .unwrap_or_else(|e| panic!("i64 payload must serialize: {e}"))
    }
}

impl fmt::Debug for CounterFixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterFixture")
            .field("system", &self.system)
            .field("confirmed", &self.confirmed)
            .field("optimistic", &self.optimistic)
            .finish()
    }
}

/// Build `{ data: 0 }` with one action:
/// `inc(amount)` sets `data = (data + dispatcher.len()) * amount`.
///
/// Mixing the dispatcher into the result makes replay order and dispatcher
/// attribution observable in the numbers.
pub fn counter_system() -> CounterFixture {
    let clock = ManualClock::default();
    let mut system = System::builder(Counter::default())
        .with_clock(clock.clone())
        .build();

    let inc = system
        .register("inc", Typed::<i64>::new(), |state: &mut Counter, dispatcher: &str, amount: &i64| {
            state.data += dispatcher.len() as i64;
            state.data *= *amount;
        })
        .unwrap_or_else(|e| panic!("fresh system cannot hold a duplicate: {e}"));

    let (confirmed, optimistic) = Recorder::attach(&mut system);

    CounterFixture {
        system,
        inc,
        confirmed,
        optimistic,
        clock,
    }
}
