//! Events and typed event constructors.
//!
//! An [`Event`] is the unit that travels between participants: a type tag
//! plus an optional raw JSON payload. Registering an action returns an
//! [`Action`], a typed constructor that produces events for that tag.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TandemError;

/// A proposed state change: a type tag and its raw payload.
///
/// The payload is kept in raw form until the registry validates it, so an
/// event can be forwarded, stored, and fingerprinted without knowing the
/// typed payload it decodes into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Event {
    /// Create an event with a payload.
    pub fn new(type_tag: impl Into<String>, payload: Value) -> Self {
        Self {
            type_tag: type_tag.into(),
            payload: Some(payload),
        }
    }

    /// Create an event that carries no payload.
    pub fn bare(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            payload: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Some(payload) => write!(f, "{}({})", self.type_tag, payload),
            None => write!(f, "{}", self.type_tag),
        }
    }
}

/// Typed constructor for the events of one registered action.
///
/// Returned by [`System::register`](crate::System::register). The type
/// parameter is the validator's output type, so `inc.event(&2)` only accepts
/// what the registered validator would accept.
///
/// # Example
///
/// ```ignore
/// let inc = system.register("inc", Typed::<i64>::new(), |state: &mut Counter, _, amount| {
///     state.data += *amount;
/// })?;
///
/// system.dispatch("root", &inc.event(&2)?)?;
/// ```
pub struct Action<P> {
    type_tag: String,
    _payload: PhantomData<fn(P)>,
}

impl<P> Action<P> {
    pub(crate) fn new(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            _payload: PhantomData,
        }
    }

    /// The tag this constructor produces events for.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Build an event without a payload.
    ///
    /// Only useful when the validator accepts an absent payload, e.g.
    /// [`Absent`](crate::Absent) or `Typed<()>`.
    pub fn bare(&self) -> Event {
        Event::bare(self.type_tag.clone())
    }
}

impl<P: Serialize> Action<P> {
    /// Build an event carrying `payload`.
    pub fn event(&self, payload: &P) -> Result<Event, TandemError> {
        Ok(Event::new(self.type_tag.clone(), serde_json::to_value(payload)?))
    }
}

impl<P> Clone for Action<P> {
    fn clone(&self) -> Self {
        Self::new(self.type_tag.clone())
    }
}

impl<P> fmt::Debug for Action<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("type_tag", &self.type_tag)
            .field("payload", &std::any::type_name::<P>())
            .finish()
    }
}
