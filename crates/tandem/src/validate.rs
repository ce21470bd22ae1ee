//! Payload validators.
//!
//! A validator turns the raw JSON payload of an event into the typed value
//! the handler receives, or rejects it with a [`ValidationError`]. The
//! registry only depends on the [`PayloadValidator`] trait, so any schema
//! library can be adapted behind it.
//!
//! # Example
//!
//! ```ignore
//! use tandem_core::{Absent, Typed, ValidatorExt};
//!
//! // Any serde type
//! let amount = Typed::<i64>::new().check("min", "must be at least 1", |n| *n >= 1);
//!
//! // No payload at all
//! let ping = Absent;
//! ```

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ValidationError;

/// Accepts or rejects a raw payload.
///
/// `raw` is `None` when the event carried no payload.
pub trait PayloadValidator: Send + Sync + 'static {
    /// The typed payload handed to the action's handler.
    type Output: Send + Sync + 'static;

    fn validate(&self, raw: Option<&Value>) -> Result<Self::Output, ValidationError>;
}

// =============================================================================
// Typed
// =============================================================================

/// Validates by deserializing into `T`.
///
/// An absent payload is decoded from JSON `null`, so `Typed<()>` and
/// `Typed<Option<T>>` accept events built without a payload.
pub struct Typed<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Typed<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Typed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Typed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Typed<{}>", std::any::type_name::<T>())
    }
}

impl<T> PayloadValidator for Typed<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    type Output = T;

    fn validate(&self, raw: Option<&Value>) -> Result<T, ValidationError> {
        let result = match raw {
            Some(value) => T::deserialize(value),
            None => T::deserialize(&Value::Null),
        };
        result.map_err(|e| ValidationError::new("type", e.to_string()))
    }
}

// =============================================================================
// Absent
// =============================================================================

/// Accepts only events without a payload (or with an explicit `null`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Absent;

impl PayloadValidator for Absent {
    type Output = ();

    fn validate(&self, raw: Option<&Value>) -> Result<(), ValidationError> {
        match raw {
            None | Some(Value::Null) => Ok(()),
            Some(other) => Err(ValidationError::new(
                "absent",
                format!("expected no payload, got {other}"),
            )),
        }
    }
}

// =============================================================================
// Combinators
// =============================================================================

/// A validator refined with an extra predicate. Built by [`ValidatorExt::check`].
pub struct Checked<V, F> {
    inner: V,
    constraint: &'static str,
    message: &'static str,
    predicate: F,
}

impl<V, F> PayloadValidator for Checked<V, F>
where
    V: PayloadValidator,
    F: Fn(&V::Output) -> bool + Send + Sync + 'static,
{
    type Output = V::Output;

    fn validate(&self, raw: Option<&Value>) -> Result<V::Output, ValidationError> {
        let value = self.inner.validate(raw)?;
        if (self.predicate)(&value) {
            Ok(value)
        } else {
            Err(ValidationError::new(self.constraint, self.message))
        }
    }
}

/// Adapts a plain function into a validator.
pub struct FnValidator<F, T> {
    f: F,
    _marker: PhantomData<fn() -> T>,
}

/// Use `f` as a validator.
///
/// ```ignore
/// let even = validator_fn(|raw| match raw.and_then(|v| v.as_i64()) {
///     Some(n) if n % 2 == 0 => Ok(n),
///     _ => Err(ValidationError::new("even", "expected an even integer")),
/// });
/// ```
pub fn validator_fn<F, T>(f: F) -> FnValidator<F, T>
where
    F: Fn(Option<&Value>) -> Result<T, ValidationError> + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    FnValidator {
        f,
        _marker: PhantomData,
    }
}

impl<F, T> PayloadValidator for FnValidator<F, T>
where
    F: Fn(Option<&Value>) -> Result<T, ValidationError> + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    type Output = T;

    fn validate(&self, raw: Option<&Value>) -> Result<T, ValidationError> {
        (self.f)(raw)
    }
}

/// Refinements available on every validator.
pub trait ValidatorExt: PayloadValidator + Sized {
    /// Reject values for which `predicate` returns false.
    fn check<F>(self, constraint: &'static str, message: &'static str, predicate: F) -> Checked<Self, F>
    where
        F: Fn(&Self::Output) -> bool + Send + Sync + 'static,
    {
        Checked {
            inner: self,
            constraint,
            message,
            predicate,
        }
    }
}

impl<V: PayloadValidator> ValidatorExt for V {}
