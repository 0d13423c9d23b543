//! Scenario description and replay.

use std::rc::Rc;

use hexstack_layout::topology::{CellKey, GridMath, HexGrid, Point};
use hexstack_layout::{
    AppliedMutation, EntityDirectory, EntityId, EntitySnapshot, LayoutService, LayoutSettings,
    LayoutSnapshot, MemoryScene, ResetReport,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

fn default_grid_size() -> f64 {
    100.0
}

/// A scripted sequence of user actions on a hex scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Hex width in pixels
    #[serde(default = "default_grid_size")]
    pub grid_size: f64,
    #[serde(default)]
    pub settings: LayoutSettings,
    /// Entities present before initialization
    #[serde(default)]
    pub entities: Vec<Placement>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// An entity positioned either by pixel or by cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Placement {
    /// Centered in a cell at the given scale
    InCell {
        id: EntityId,
        cell: CellKey,
        #[serde(default = "full_scale")]
        scale: f64,
    },
    /// Raw snapshot
    Snapshot(EntitySnapshot),
}

fn full_scale() -> f64 {
    1.0
}

/// One user action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Move an entity's top-left corner
    Drag { id: EntityId, to: Point },
    /// Move an entity so its current footprint is centered in a cell
    DragToCell { id: EntityId, cell: CellKey },
    /// Create an entity
    Spawn { entity: Placement },
    /// Delete an entity
    Despawn { id: EntityId },
    /// Reset every entity to baseline scale
    Reset,
}

/// What a replay produced.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub layout: LayoutSnapshot,
    pub entities: Vec<EntitySnapshot>,
    pub mutations: Vec<AppliedMutation>,
    pub resets: Vec<ResetReport>,
}

impl Scenario {
    /// The pairing walk-through: B joins A, C joins them, B leaves again.
    pub fn demo() -> Self {
        let place = |id, col, row| Placement::InCell {
            id: EntityId(id),
            cell: CellKey::new(col, row),
            scale: 1.0,
        };
        let drag = |id, col, row| Step::DragToCell {
            id: EntityId(id),
            cell: CellKey::new(col, row),
        };
        Self {
            grid_size: default_grid_size(),
            settings: LayoutSettings::default(),
            entities: vec![place(1, 1, 0), place(2, 0, 0), place(3, 1, 1)],
            steps: vec![
                drag(2, 1, 0),
                drag(3, 1, 0),
                drag(2, 3, 0),
                Step::Despawn { id: EntityId(3) },
            ],
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Replay every step, draining layout work after each.
    pub async fn run(&self) -> Result<Outcome> {
        let grid = GridMath::new(HexGrid::new(self.grid_size));
        let scene = Rc::new(MemoryScene::new());
        for placement in &self.entities {
            scene.insert(placement.resolve(&grid));
        }

        let settings = Rc::new(self.settings.clone());
        let service = LayoutService::new(scene.context(HexGrid::new(self.grid_size), settings));
        let seeded = service.initialize();
        info!(seeded, steps = self.steps.len(), "Scenario loaded");

        let mut resets = Vec::new();
        for (index, step) in self.steps.iter().enumerate() {
            info!(step = index, ?step, "Applying step");
            match step {
                Step::Drag { id, to } => {
                    if !scene.drag(*id, *to) {
                        return Err(Error::UnknownEntity { step: index, id: *id });
                    }
                }
                Step::DragToCell { id, cell } => {
                    let snapshot = scene
                        .get(*id)
                        .ok_or(Error::UnknownEntity { step: index, id: *id })?;
                    let to = centered_top_left(&grid, &snapshot, *cell, &self.settings);
                    scene.drag(*id, to);
                }
                Step::Spawn { entity } => scene.spawn(entity.resolve(&grid)),
                Step::Despawn { id } => {
                    if !scene.despawn(*id) {
                        warn!(step = index, entity = %id, "Despawn of unknown entity");
                    }
                }
                Step::Reset => resets.push(service.reset_all().await),
            }
            service.drain().await?;
        }

        let outcome = Outcome {
            layout: service.state().snapshot(),
            entities: scene.entities(),
            mutations: scene.mutations(),
            resets,
        };
        service.cleanup();
        Ok(outcome)
    }
}

impl Placement {
    fn resolve(&self, grid: &GridMath<HexGrid>) -> EntitySnapshot {
        match self {
            Placement::InCell { id, cell, scale } => {
                let center = grid.center_of(*cell);
                let half = grid.unit_size() * scale / 2.0;
                let top_left = Point::new(center.x - half, center.y - half);
                EntitySnapshot::new(*id, top_left).with_scale(*scale)
            }
            Placement::Snapshot(snapshot) => snapshot.clone(),
        }
    }
}

/// Top-left corner centering the entity's drawn footprint on `cell`.
fn centered_top_left(
    grid: &GridMath<HexGrid>,
    snapshot: &EntitySnapshot,
    cell: CellKey,
    settings: &LayoutSettings,
) -> Point {
    let scale = hexstack_layout::approximate_scale(snapshot, &settings.scale_fields);
    let footprint =
        hexstack_layout::topology::footprint_size(snapshot.size, scale, grid.unit_size());
    let center = grid.center_of(cell);
    Point::new(center.x - footprint.width / 2.0, center.y - footprint.height / 2.0)
}
