//! Source and optimistic state snapshots with copy-on-write apply.
//!
//! Snapshots are `Arc<S>` and never mutated after they are committed. Every
//! apply clones the current snapshot into a draft, lets the handler work on
//! the draft, and commits the result as a fresh `Arc`. A caller holding an
//! older snapshot keeps seeing exactly what it was given.

use std::sync::Arc;

use crate::registry::Applied;

/// Holds the initial, source, and optimistic snapshots.
///
/// The initial snapshot is owned by the container and only ever read, so no
/// handler can reach it through a mutable reference.
#[derive(Debug)]
pub struct StateContainer<S> {
    initial: Arc<S>,
    source: Arc<S>,
    optimistic: Arc<S>,
}

impl<S: Clone> StateContainer<S> {
    pub fn new(initial: S) -> Self {
        let initial = Arc::new(initial);
        Self {
            source: Arc::clone(&initial),
            optimistic: Arc::clone(&initial),
            initial,
        }
    }

    pub fn initial(&self) -> &Arc<S> {
        &self.initial
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn optimistic(&self) -> &Arc<S> {
        &self.optimistic
    }

    /// Apply `handler` to a draft of the source state and commit the result.
    ///
    /// On error nothing is committed.
    pub fn apply_to_source<F>(&mut self, handler: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut S) -> anyhow::Result<Applied<S>>,
    {
        self.source = produce(&self.source, handler)?;
        Ok(())
    }

    /// Apply `handler` to a draft of the optimistic state and commit the result.
    ///
    /// On error nothing is committed.
    pub fn apply_to_optimistic<F>(&mut self, handler: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut S) -> anyhow::Result<Applied<S>>,
    {
        self.optimistic = produce(&self.optimistic, handler)?;
        Ok(())
    }

    /// Collapse the optimistic state onto the current source state.
    ///
    /// Both end up sharing one immutable snapshot. The next optimistic apply
    /// drafts a copy, so it cannot leak into the source.
    pub fn reset_optimistic_to_source(&mut self) {
        self.optimistic = Arc::clone(&self.source);
    }

    /// Restore source and optimistic state to the initial snapshot.
    pub fn hard_reset(&mut self) {
        self.source = Arc::clone(&self.initial);
        self.optimistic = Arc::clone(&self.initial);
    }
}

fn produce<S, F>(base: &Arc<S>, handler: F) -> anyhow::Result<Arc<S>>
where
    S: Clone,
    F: FnOnce(&mut S) -> anyhow::Result<Applied<S>>,
{
    let mut draft = S::clone(base);
    match handler(&mut draft)? {
        Applied::Mutated => Ok(Arc::new(draft)),
        Applied::Replaced(next) => Ok(Arc::new(next)),
    }
}
