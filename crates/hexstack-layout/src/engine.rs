//! Stacking policy.
//!
//! Given a settled occupancy change, decide the scale and position of the
//! entities in the affected cells and issue guarded writes.
//!
//! # Rules
//!
//! - An entity alone in its cell is centered at solo scale.
//! - When a newcomer enters an occupied cell, the first occupant shrinks to
//!   pair scale in place, and the newcomer shrinks and sits between the cell
//!   center and the side it came from.
//! - A cell left with one occupant restores it to solo scale in place.
//!
//! A failed write only affects its own entity; the rest of the task still
//! runs and the first failure is reported afterwards.

use hexstack_topology::{footprint_size, midpoint, CellKey, GridBackend, Point};
use tracing::{debug, warn};

use crate::config::LayoutSettings;
use crate::error::{MutationError, Result};
use crate::guard::Guarded;
use crate::host::{EntityId, EntityPatch, EntitySnapshot, HostContext};
use crate::scale::{approximate_scale, scale_differs};
use crate::state::{LayoutState, PendingMovement};

/// Divisor used when the newcomer direction vector has zero length.
pub const DEGENERATE_LENGTH: f64 = 1.0;

/// Work produced by the event router for the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutTask {
    /// `id` was registered into `cell`.
    Created { id: EntityId, cell: CellKey },
    /// `id` was moved between cells.
    Moved { id: EntityId, movement: PendingMovement },
    /// `id` was deregistered from `cell`.
    Removed { id: EntityId, cell: CellKey },
}

/// Where a newcomer's center goes.
///
/// Start at the midpoint of the two cell centers, shift by
/// `center_distance` grid units along the destination-center→midpoint unit
/// vector, then by the fixed `offset_x`/`offset_y` grid fractions.
pub fn newcomer_center(
    origin_center: Point,
    destination_center: Point,
    grid_unit: f64,
    settings: &LayoutSettings,
) -> Point {
    let mid = midpoint(origin_center, destination_center);
    let toward_mid = mid - destination_center;
    let length = toward_mid.length();
    let length = if length > 0.0 { length } else { DEGENERATE_LENGTH };

    let push = toward_mid / length * (grid_unit * settings.center_distance);
    let offset = Point::new(grid_unit * settings.offset_x, grid_unit * settings.offset_y);
    mid + push + offset
}

/// Collects the first hard failure of a task.
#[derive(Default)]
struct Failures(Option<MutationError>);

impl Failures {
    fn record(&mut self, outcome: std::result::Result<bool, MutationError>) {
        match outcome {
            Ok(_) => {}
            Err(MutationError::Gone(id)) => {
                debug!(entity = %id, "Entity vanished mid-layout, skipping");
            }
            Err(e) => {
                warn!(error = %e, "Layout write rejected");
                self.0.get_or_insert(e);
            }
        }
    }

    fn finish(self) -> Result<()> {
        match self.0 {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

/// Applies the stacking rules against one [`LayoutState`].
pub struct LayoutEngine<'a, G> {
    state: &'a LayoutState,
    host: &'a HostContext<G>,
}

impl<'a, G: GridBackend> LayoutEngine<'a, G> {
    pub fn new(state: &'a LayoutState, host: &'a HostContext<G>) -> Self {
        Self { state, host }
    }

    /// Run one task to completion.
    pub async fn run(&self, task: LayoutTask) -> Result<()> {
        let settings = self.host.settings.current();
        let mut failures = Failures::default();

        match task {
            LayoutTask::Created { id, cell } => {
                self.entity_created(id, cell, &settings, &mut failures).await
            }
            LayoutTask::Moved { id, movement } => {
                self.entity_moved(id, movement, &settings, &mut failures).await
            }
            LayoutTask::Removed { id, cell } => {
                self.entity_removed(id, cell, &settings, &mut failures).await
            }
        }

        failures.finish()
    }

    async fn entity_created(
        &self,
        id: EntityId,
        cell: CellKey,
        settings: &LayoutSettings,
        failures: &mut Failures,
    ) {
        let count = self.state.occupancy().occupant_count(cell);
        if count <= 1 {
            debug!(entity = %id, %cell, "Created alone, centering");
            failures.record(self.center_solo(id, cell, settings).await);
        } else {
            debug!(entity = %id, %cell, occupants = count, "Created into occupied cell");
            failures.record(self.set_scale(id, settings.pair_scale, settings).await);
        }
    }

    async fn entity_moved(
        &self,
        id: EntityId,
        movement: PendingMovement,
        settings: &LayoutSettings,
        failures: &mut Failures,
    ) {
        let left_behind = self.state.occupancy().occupants_of(movement.origin).to_vec();
        if let &[remaining] = left_behind.as_slice() {
            debug!(
                entity = %remaining,
                cell = %movement.origin,
                "Left alone, restoring solo scale"
            );
            failures.record(self.set_scale(remaining, settings.solo_scale, settings).await);
        }

        let (arrived, first) = {
            let occupancy = self.state.occupancy();
            (
                occupancy.occupants_of(movement.destination).to_vec(),
                occupancy.first_occupant_of(movement.destination),
            )
        };

        // A later drag may already have taken the mover out of the destination.
        if !arrived.contains(&id) {
            debug!(
                entity = %id,
                cell = %movement.destination,
                "Mover left destination before layout, skipping"
            );
            return;
        }

        if let &[only] = arrived.as_slice() {
            debug!(entity = %only, cell = %movement.destination, "Moved into empty cell");
            failures.record(self.center_solo(only, movement.destination, settings).await);
            return;
        }

        if let Some(first) = first.filter(|f| *f != id) {
            failures.record(self.set_scale(first, settings.pair_scale, settings).await);
        }
        debug!(
            entity = %id,
            cell = %movement.destination,
            occupants = arrived.len(),
            "Placing newcomer"
        );
        failures.record(self.place_newcomer(id, &movement, settings).await);
    }

    async fn entity_removed(
        &self,
        id: EntityId,
        cell: CellKey,
        settings: &LayoutSettings,
        failures: &mut Failures,
    ) {
        let remaining = self.state.occupancy().occupants_of(cell).to_vec();
        if let &[last] = remaining.as_slice() {
            debug!(removed = %id, entity = %last, %cell, "Left alone, restoring solo scale");
            failures.record(self.set_scale(last, settings.solo_scale, settings).await);
        }
    }

    /// Center `id` in `cell` at solo scale.
    async fn center_solo(
        &self,
        id: EntityId,
        cell: CellKey,
        settings: &LayoutSettings,
    ) -> std::result::Result<bool, MutationError> {
        let Some(snapshot) = self.host.directory.get(id) else {
            return Ok(false);
        };
        let center = self.host.grid.center_of(cell);
        let patch = self.positioned_patch(&snapshot, center, settings.solo_scale, settings);
        self.write(id, patch).await
    }

    /// Move `id` to its newcomer spot at pair scale.
    async fn place_newcomer(
        &self,
        id: EntityId,
        movement: &PendingMovement,
        settings: &LayoutSettings,
    ) -> std::result::Result<bool, MutationError> {
        let Some(snapshot) = self.host.directory.get(id) else {
            return Ok(false);
        };
        let center = newcomer_center(
            movement.origin_center,
            movement.destination_center,
            self.host.grid.unit_size(),
            settings,
        );
        let patch = self.positioned_patch(&snapshot, center, settings.pair_scale, settings);
        self.write(id, patch).await
    }

    /// Change only the scale of `id`, if it is off by more than the tolerance.
    async fn set_scale(
        &self,
        id: EntityId,
        target: f64,
        settings: &LayoutSettings,
    ) -> std::result::Result<bool, MutationError> {
        let Some(snapshot) = self.host.directory.get(id) else {
            return Ok(false);
        };
        if !scale_differs(approximate_scale(&snapshot, &settings.scale_fields), target) {
            return Ok(false);
        }
        self.write(id, EntityPatch::default().with_scale(target)).await
    }

    /// Patch putting the footprint of `snapshot` drawn at `scale` around `center`.
    fn positioned_patch(
        &self,
        snapshot: &EntitySnapshot,
        center: Point,
        scale: f64,
        settings: &LayoutSettings,
    ) -> EntityPatch {
        let footprint = footprint_size(snapshot.size, scale, self.host.grid.unit_size());
        let top_left = Point::new(
            center.x - footprint.width / 2.0,
            center.y - footprint.height / 2.0,
        );

        let mut patch = EntityPatch::default().with_position(top_left);
        if scale_differs(approximate_scale(snapshot, &settings.scale_fields), scale) {
            patch = patch.with_scale(scale);
        }
        patch
    }

    async fn write(
        &self,
        id: EntityId,
        patch: EntityPatch,
    ) -> std::result::Result<bool, MutationError> {
        if patch.is_empty() {
            return Ok(false);
        }
        let sink = &self.host.sink;
        let outcome = self
            .state
            .guard()
            .guarded_update(id, || sink.update(id, patch))
            .await?;
        Ok(matches!(outcome, Guarded::Applied(())))
    }
}
