//! Re-entrancy guard for entity writes.
//!
//! A write broadcasts change notifications that land back in our own
//! handlers before the write completes. Every handler checks
//! [`UpdateGuard::is_busy`] first, and every write goes through
//! [`UpdateGuard::guarded_update`], so those echoes are dropped instead of
//! triggering another round of layout.

use std::cell::RefCell;
use std::collections::HashSet;
use std::future::Future;

use tracing::trace;

use crate::host::EntityId;

/// Outcome of a guarded write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guarded<T> {
    /// The mutation ran.
    Applied(T),
    /// Another write for the entity was already in flight.
    Skipped,
}

impl<T> Guarded<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Guarded::Applied(_))
    }
}

/// Busy and arranged sets.
#[derive(Debug, Default)]
pub struct UpdateGuard {
    busy: RefCell<HashSet<EntityId>>,
    arranged: RefCell<HashSet<EntityId>>,
}

/// Holds an entity busy until dropped.
struct BusyToken<'a> {
    guard: &'a UpdateGuard,
    id: EntityId,
}

impl Drop for BusyToken<'_> {
    fn drop(&mut self) {
        self.guard.busy.borrow_mut().remove(&self.id);
    }
}

impl UpdateGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self, id: EntityId) -> bool {
        self.busy.borrow().contains(&id)
    }

    /// Whether the entity has been positioned or scaled at least once.
    pub fn is_arranged(&self, id: EntityId) -> bool {
        self.arranged.borrow().contains(&id)
    }

    /// Arranged entities in id order.
    pub fn arranged(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.arranged.borrow().iter().copied().collect();
        ids.sort();
        ids
    }

    pub fn clear_arranged(&self) {
        self.arranged.borrow_mut().clear();
    }

    pub fn clear(&self) {
        self.busy.borrow_mut().clear();
        self.arranged.borrow_mut().clear();
    }

    fn acquire(&self, id: EntityId) -> Option<BusyToken<'_>> {
        if !self.busy.borrow_mut().insert(id) {
            return None;
        }
        Some(BusyToken { guard: self, id })
    }

    /// Run `mutation` with `id` marked busy.
    ///
    /// Returns [`Guarded::Skipped`] without running anything if `id` is
    /// already busy. The busy mark is released on every exit path, including
    /// mutation failure and the future being dropped.
    pub async fn guarded_update<F, Fut, T, E>(
        &self,
        id: EntityId,
        mutation: F,
    ) -> Result<Guarded<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(_token) = self.acquire(id) else {
            trace!(entity = %id, "Write already in flight, skipping");
            return Ok(Guarded::Skipped);
        };

        let value = mutation().await?;
        self.arranged.borrow_mut().insert(id);
        Ok(Guarded::Applied(value))
    }
}
