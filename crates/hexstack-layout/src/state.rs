//! Layout state: the context object every handler is threaded through.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;

use hexstack_topology::{CellKey, Point};
use serde::Serialize;

use crate::guard::UpdateGuard;
use crate::host::EntityId;
use crate::occupancy::OccupancyTable;

/// Cell transition recorded between a pre-update and its post-update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PendingMovement {
    pub origin: CellKey,
    pub destination: CellKey,
    pub origin_center: Point,
    pub destination_center: Point,
}

/// All mutable layout state.
///
/// Interior mutability lets notification handlers run while a write is
/// suspended. No borrow is ever held across an await point.
#[derive(Debug, Default)]
pub struct LayoutState {
    occupancy: RefCell<OccupancyTable>,
    pending: RefCell<HashMap<EntityId, PendingMovement>>,
    guard: UpdateGuard,
}

impl LayoutState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn occupancy(&self) -> Ref<'_, OccupancyTable> {
        self.occupancy.borrow()
    }

    pub fn occupancy_mut(&self) -> RefMut<'_, OccupancyTable> {
        self.occupancy.borrow_mut()
    }

    pub fn guard(&self) -> &UpdateGuard {
        &self.guard
    }

    /// Record a movement, replacing any stale record for the entity.
    pub fn stash_pending(&self, id: EntityId, movement: PendingMovement) {
        self.pending.borrow_mut().insert(id, movement);
    }

    /// Take the entity's pending movement, deleting it.
    pub fn take_pending(&self, id: EntityId) -> Option<PendingMovement> {
        self.pending.borrow_mut().remove(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Drop every table.
    pub fn clear(&self) {
        self.occupancy.borrow_mut().clear();
        self.pending.borrow_mut().clear();
        self.guard.clear();
    }

    /// Serializable view, ordered by cell.
    pub fn snapshot(&self) -> LayoutSnapshot {
        let occupancy = self.occupancy.borrow();
        let mut cells: Vec<CellSnapshot> = occupancy
            .cells()
            .map(|(cell, occupants)| CellSnapshot {
                cell: *cell,
                occupants: occupants.to_vec(),
                first: occupancy.first_occupant_of(*cell),
            })
            .collect();
        cells.sort_by_key(|c| c.cell);

        LayoutSnapshot {
            cells,
            pending: self.pending_count(),
            arranged: self.guard.arranged(),
        }
    }
}

/// One occupied cell in a [`LayoutSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellSnapshot {
    pub cell: CellKey,
    pub occupants: Vec<EntityId>,
    pub first: Option<EntityId>,
}

/// Point-in-time dump of the layout state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutSnapshot {
    pub cells: Vec<CellSnapshot>,
    pub pending: usize,
    pub arranged: Vec<EntityId>,
}
