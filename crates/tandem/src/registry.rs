//! Action registry: type tag → (validator, handler).
//!
//! Payload types are erased at registration. The registry stores a validator
//! that yields `Arc<dyn Any>` and a handler that downcasts it back, so one
//! map holds actions with unrelated payload types.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::core::Action;
use crate::error::{TandemError, ValidationError};
use crate::validate::PayloadValidator;

/// A validated payload, type-erased for storage in the ledger.
pub type ErasedPayload = Arc<dyn Any + Send + Sync>;

/// What a handler did with the draft it was given.
#[derive(Debug)]
pub enum Applied<S> {
    /// The draft was mutated in place and becomes the next snapshot.
    Mutated,
    /// The handler built a brand-new state; the draft is discarded.
    Replaced(S),
}

/// Return types a handler may use.
///
/// - `()` – the handler mutated the draft.
/// - [`Applied<S>`] – mutated, or replaced with a new state.
/// - `anyhow::Result<T>` for either of the above – a fallible handler.
pub trait HandlerOutput<S> {
    fn into_applied(self) -> anyhow::Result<Applied<S>>;
}

impl<S> HandlerOutput<S> for () {
    fn into_applied(self) -> anyhow::Result<Applied<S>> {
        Ok(Applied::Mutated)
    }
}

impl<S> HandlerOutput<S> for Applied<S> {
    fn into_applied(self) -> anyhow::Result<Applied<S>> {
        Ok(self)
    }
}

impl<S, T: HandlerOutput<S>> HandlerOutput<S> for anyhow::Result<T> {
    fn into_applied(self) -> anyhow::Result<Applied<S>> {
        self?.into_applied()
    }
}

type ErasedValidator = Box<dyn Fn(Option<&Value>) -> Result<ErasedPayload, ValidationError> + Send + Sync>;
type ErasedHandler<S> = Box<dyn Fn(&mut S, &str, &(dyn Any + Send + Sync)) -> anyhow::Result<Applied<S>> + Send + Sync>;

/// One registered action.
pub struct ActionDefinition<S> {
    type_tag: String,
    validator: ErasedValidator,
    handler: ErasedHandler<S>,
}

impl<S> ActionDefinition<S> {
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Validate a raw payload into its erased typed form.
    pub fn validate(&self, raw: Option<&Value>) -> Result<ErasedPayload, ValidationError> {
        (self.validator)(raw)
    }

    /// Run the handler against `draft`.
    ///
    /// `payload` must come from this definition's [`validate`](Self::validate).
    pub fn handle(&self, draft: &mut S, dispatcher: &str, payload: &ErasedPayload) -> anyhow::Result<Applied<S>> {
        (self.handler)(draft, dispatcher, payload.as_ref())
    }
}

impl<S> fmt::Debug for ActionDefinition<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("type_tag", &self.type_tag)
            .finish_non_exhaustive()
    }
}

/// Registered actions keyed by type tag.
pub struct ActionRegistry<S> {
    actions: HashMap<String, ActionDefinition<S>>,
}

impl<S: 'static> ActionRegistry<S> {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Register `handler` for `type_tag`, validating payloads with `validator`.
    ///
    /// Returns a typed constructor for events of this action. Fails with
    /// [`TandemError::DuplicateAction`] if the tag is already taken; the
    /// existing registration is left in place.
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
        let type_tag = type_tag.into();
        if self.actions.contains_key(&type_tag) {
            return Err(TandemError::DuplicateAction { type_tag });
        }

        let validator: ErasedValidator =
            Box::new(move |raw| validator.validate(raw).map(|v| Arc::new(v) as ErasedPayload));

        let tag = type_tag.clone();
        let handler: ErasedHandler<S> = Box::new(move |state, dispatcher, payload| {
            let Some(payload) = payload.downcast_ref::<V::Output>() else {
                anyhow::bail!("payload for {tag} has the wrong type");
            };
            handler(state, dispatcher, payload).into_applied()
        });

        debug!(type_tag = %type_tag, payload = std::any::type_name::<V::Output>(), "action registered");
        self.actions.insert(
            type_tag.clone(),
            ActionDefinition {
                type_tag: type_tag.clone(),
                validator,
                handler,
            },
        );

        Ok(Action::new(type_tag))
    }

    /// Look up the action for `type_tag`.
    pub fn resolve(&self, type_tag: &str) -> Option<&ActionDefinition<S>> {
        self.actions.get(type_tag)
    }

    pub fn contains(&self, type_tag: &str) -> bool {
        self.actions.contains_key(type_tag)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl<S: 'static> Default for ActionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for ActionRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.actions.keys().collect();
        tags.sort();
        f.debug_struct("ActionRegistry").field("actions", &tags).finish()
    }
}
