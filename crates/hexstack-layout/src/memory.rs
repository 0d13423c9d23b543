//! In-memory host for tests and offline simulation.
//!
//! [`MemoryScene`] stores entities, persists patches, and broadcasts the
//! same notifications a live host would. Broadcasts of a write happen
//! synchronously inside the write future, before it resolves, so the layout
//! core sees its own echoes exactly as it does in production.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use hexstack_topology::{GridBackend, Point};
use serde::Serialize;

use crate::config::SettingsSource;
use crate::error::MutationError;
use crate::host::{
    EntityDirectory, EntityId, EntityPatch, EntitySnapshot, HostContext, HostEvent, Listener,
    MutationSink, NotificationSource, PositionChange, SubscriptionId,
};

/// A patch the scene persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedMutation {
    pub id: EntityId,
    pub patch: EntityPatch,
}

#[derive(Default)]
pub struct MemoryScene {
    entities: RefCell<BTreeMap<EntityId, EntitySnapshot>>,
    listeners: RefCell<Vec<(SubscriptionId, Listener)>>,
    next_subscription: Cell<u64>,
    rejected: RefCell<HashSet<EntityId>>,
    log: RefCell<Vec<AppliedMutation>>,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity without notifying anyone (pre-existing scene content).
    pub fn insert(&self, snapshot: EntitySnapshot) {
        self.entities.borrow_mut().insert(snapshot.id, snapshot);
    }

    /// Create an entity and broadcast the creation.
    pub fn spawn(&self, snapshot: EntitySnapshot) {
        let id = snapshot.id;
        self.insert(snapshot);
        self.emit(&HostEvent::Create { id });
    }

    /// User-driven move of an entity's top-left corner to `to`.
    ///
    /// Not recorded in the mutation log. Returns false for unknown entities.
    pub fn drag(&self, id: EntityId, to: Point) -> bool {
        if !self.entities.borrow().contains_key(&id) {
            return false;
        }
        self.emit(&HostEvent::PreUpdate {
            id,
            changes: PositionChange::to(to),
        });
        if let Some(entity) = self.entities.borrow_mut().get_mut(&id) {
            entity.position = to;
        }
        self.emit(&HostEvent::PostUpdate { id });
        true
    }

    /// Delete an entity and broadcast the deletion.
    pub fn despawn(&self, id: EntityId) -> bool {
        let removed = self.entities.borrow_mut().remove(&id).is_some();
        if removed {
            self.emit(&HostEvent::Delete { id });
        }
        removed
    }

    /// Drop an entity without any notification, leaving stale references.
    pub fn forget(&self, id: EntityId) {
        self.entities.borrow_mut().remove(&id);
    }

    /// Make every future write to `id` fail.
    pub fn reject_updates_for(&self, id: EntityId) {
        self.rejected.borrow_mut().insert(id);
    }

    pub fn accept_updates_for(&self, id: EntityId) {
        self.rejected.borrow_mut().remove(&id);
    }

    /// Every persisted patch, in order.
    pub fn mutations(&self) -> Vec<AppliedMutation> {
        self.log.borrow().clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.log.borrow().len()
    }

    pub fn clear_mutations(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn active_subscriptions(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Build a [`HostContext`] backed by this scene.
    pub fn context<G: GridBackend>(
        self: &Rc<Self>,
        grid: G,
        settings: Rc<dyn SettingsSource>,
    ) -> HostContext<G> {
        HostContext::new(grid, self.clone(), self.clone(), self.clone(), settings)
    }

    fn emit(&self, event: &HostEvent) {
        // Listeners may call back into the scene.
        let listeners: Vec<Listener> =
            self.listeners.borrow().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(event);
        }
    }
}

impl EntityDirectory for MemoryScene {
    fn get(&self, id: EntityId) -> Option<EntitySnapshot> {
        self.entities.borrow().get(&id).cloned()
    }

    fn entities(&self) -> Vec<EntitySnapshot> {
        self.entities.borrow().values().cloned().collect()
    }
}

impl MutationSink for MemoryScene {
    fn update(
        &self,
        id: EntityId,
        patch: EntityPatch,
    ) -> LocalBoxFuture<'_, Result<(), MutationError>> {
        Box::pin(async move {
            if self.rejected.borrow().contains(&id) {
                return Err(MutationError::Rejected {
                    entity: id,
                    reason: "update rejected by scene".into(),
                });
            }
            if !self.entities.borrow().contains_key(&id) {
                return Err(MutationError::Gone(id));
            }

            self.emit(&HostEvent::PreUpdate {
                id,
                changes: PositionChange::from(&patch),
            });
            if let Some(entity) = self.entities.borrow_mut().get_mut(&id) {
                entity.apply(&patch);
            }
            self.log.borrow_mut().push(AppliedMutation { id, patch });
            self.emit(&HostEvent::PostUpdate { id });
            Ok(())
        })
    }
}

impl NotificationSource for MemoryScene {
    fn subscribe(&self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.get());
        self.next_subscription.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.borrow_mut().retain(|(sub, _)| *sub != id);
    }
}
