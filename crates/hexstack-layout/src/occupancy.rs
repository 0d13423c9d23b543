//! Cell membership and first-occupant bookkeeping.
//!
//! The table is the single source of truth for where an entity is. Lookups
//! only go cell → entities; finding an entity's cell is a scan.
//!
//! # First Occupant
//!
//! The first entity inserted into an empty cell holds positional priority.
//! When it leaves, priority passes to the earliest-inserted remaining
//! occupant. Occupant lists keep insertion order to make that deterministic.

use std::collections::HashMap;

use hexstack_topology::CellKey;

use crate::host::EntityId;

#[derive(Debug, Clone, Default)]
pub struct OccupancyTable {
    cells: HashMap<CellKey, Vec<EntityId>>,
    first: HashMap<CellKey, EntityId>,
}

impl OccupancyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entity` into `cell`.
    ///
    /// Callers must remove the entity from its previous cell first (see
    /// [`relocate`](Self::relocate) and [`place`](Self::place)). Returns
    /// false if it was already a member.
    pub fn add(&mut self, cell: CellKey, entity: EntityId) -> bool {
        let occupants = self.cells.entry(cell).or_default();
        if occupants.contains(&entity) {
            return false;
        }
        occupants.push(entity);
        if occupants.len() == 1 {
            self.first.insert(cell, entity);
        }
        true
    }

    /// Remove `entity` from `cell`. Returns false if it was not a member.
    pub fn remove(&mut self, cell: CellKey, entity: EntityId) -> bool {
        let Some(occupants) = self.cells.get_mut(&cell) else {
            return false;
        };
        let Some(index) = occupants.iter().position(|e| *e == entity) else {
            return false;
        };
        occupants.remove(index);

        if occupants.is_empty() {
            self.cells.remove(&cell);
            self.first.remove(&cell);
        } else if self.first.get(&cell) == Some(&entity) {
            self.first.insert(cell, occupants[0]);
        }
        true
    }

    /// Move `entity` between cells.
    pub fn relocate(&mut self, entity: EntityId, from: CellKey, to: CellKey) {
        self.remove(from, entity);
        self.add(to, entity);
    }

    /// Put `entity` in `cell`, dropping any membership it had elsewhere.
    pub fn place(&mut self, cell: CellKey, entity: EntityId) {
        match self.cell_of(entity) {
            Some(current) if current == cell => {}
            Some(current) => self.relocate(entity, current, cell),
            None => {
                self.add(cell, entity);
            }
        }
    }

    /// Occupants in insertion order (empty for an unoccupied cell).
    pub fn occupants_of(&self, cell: CellKey) -> &[EntityId] {
        self.cells.get(&cell).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn occupant_count(&self, cell: CellKey) -> usize {
        self.occupants_of(cell).len()
    }

    pub fn first_occupant_of(&self, cell: CellKey) -> Option<EntityId> {
        self.first.get(&cell).copied()
    }

    /// Scan for the cell currently holding `entity`.
    pub fn cell_of(&self, entity: EntityId) -> Option<CellKey> {
        self.cells
            .iter()
            .find(|(_, occupants)| occupants.contains(&entity))
            .map(|(cell, _)| *cell)
    }

    /// Occupied cells with their occupant lists.
    pub fn cells(&self) -> impl Iterator<Item = (&CellKey, &[EntityId])> {
        self.cells.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Total tracked entities.
    pub fn entity_count(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.first.clear();
    }
}
