//! Synchronous intake of host notifications.
//!
//! A move arrives as two notifications. The pre-update carries the proposed
//! position: the router resolves origin and destination cells, updates
//! occupancy right away and stashes a [`PendingMovement`]. The post-update
//! claims that record and hands it to the engine. A post-update with nothing
//! pending is the normal case for non-moves and for our own write echoes.
//!
//! Nothing here awaits; the router runs inside the host's broadcast, possibly
//! while one of our own writes is suspended.

use hexstack_topology::{CellKey, GridBackend, Size};
use tracing::{debug, trace};

use crate::config::LayoutSettings;
use crate::engine::LayoutTask;
use crate::host::{EntityId, EntitySnapshot, HostContext, HostEvent, PositionChange};
use crate::scale::approximate_scale;
use crate::state::{LayoutState, PendingMovement};

pub struct EventRouter<'a, G> {
    state: &'a LayoutState,
    host: &'a HostContext<G>,
}

impl<'a, G: GridBackend> EventRouter<'a, G> {
    pub fn new(state: &'a LayoutState, host: &'a HostContext<G>) -> Self {
        Self { state, host }
    }

    /// Apply the bookkeeping for one notification and return the layout
    /// work it implies, if any.
    pub fn accept(&self, event: &HostEvent) -> Option<LayoutTask> {
        let settings = self.host.settings.current();
        if !settings.enabled {
            trace!(?event, "Layout disabled, ignoring notification");
            return None;
        }

        let id = event.entity();
        match event {
            // No busy check: a deleted entity must leave occupancy even mid-write.
            HostEvent::Delete { .. } => return self.deleted(id),
            _ if self.state.guard().is_busy(id) => {
                trace!(entity = %id, "Echo of in-flight write, ignoring");
                return None;
            }
            _ => {}
        }

        match event {
            HostEvent::PreUpdate { changes, .. } => {
                self.pre_update(id, changes, &settings);
                None
            }
            HostEvent::PostUpdate { .. } => self.post_update(id),
            HostEvent::Create { .. } => self.created(id, &settings),
            HostEvent::Delete { .. } => None,
        }
    }

    fn pre_update(&self, id: EntityId, changes: &PositionChange, settings: &LayoutSettings) {
        if !changes.is_positional() {
            return;
        }
        let Some(snapshot) = self.host.directory.get(id) else {
            trace!(entity = %id, "Pre-update for unknown entity");
            return;
        };

        let footprint = effective_size(&snapshot, settings);
        let grid = &self.host.grid;
        let tracked = self.state.occupancy().cell_of(id);
        let origin = tracked.unwrap_or_else(|| grid.cell_key_for(snapshot.position, footprint));
        let destination = grid.cell_key_for(changes.applied_to(snapshot.position), footprint);

        if origin == destination {
            return;
        }

        let movement = PendingMovement {
            origin,
            destination,
            origin_center: grid.center_of(origin),
            destination_center: grid.center_of(destination),
        };
        self.state.occupancy_mut().relocate(id, origin, destination);
        self.state.stash_pending(id, movement);
        debug!(entity = %id, from = %origin, to = %destination, "Cell transition pending");
    }

    fn post_update(&self, id: EntityId) -> Option<LayoutTask> {
        let movement = self.state.take_pending(id)?;
        Some(LayoutTask::Moved { id, movement })
    }

    fn created(&self, id: EntityId, settings: &LayoutSettings) -> Option<LayoutTask> {
        let snapshot = self.host.directory.get(id)?;
        let cell = self.cell_of_snapshot(&snapshot, settings);
        self.state.occupancy_mut().place(cell, id);
        debug!(entity = %id, %cell, "Entity created");
        Some(LayoutTask::Created { id, cell })
    }

    fn deleted(&self, id: EntityId) -> Option<LayoutTask> {
        self.state.take_pending(id);
        let cell = self.state.occupancy().cell_of(id)?;
        self.state.occupancy_mut().remove(cell, id);
        debug!(entity = %id, %cell, "Entity removed");
        Some(LayoutTask::Removed { id, cell })
    }

    /// Cell an entity occupies according to its current position.
    pub fn cell_of_snapshot(
        &self,
        snapshot: &EntitySnapshot,
        settings: &LayoutSettings,
    ) -> CellKey {
        self.host
            .grid
            .cell_key_for(snapshot.position, effective_size(snapshot, settings))
    }
}

/// Footprint in grid units as currently drawn.
fn effective_size(snapshot: &EntitySnapshot, settings: &LayoutSettings) -> Size {
    snapshot.size.scaled(approximate_scale(snapshot, &settings.scale_fields))
}
