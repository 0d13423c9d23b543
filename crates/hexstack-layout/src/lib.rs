//! Hexstack Layout
//!
//! Tracks which tokens occupy which hex cells and re-lays them out
//! deterministically whenever occupancy changes.
//!
//! # Components
//!
//! - [`OccupancyTable`]: cell → occupants, plus each cell's first occupant
//! - [`UpdateGuard`]: busy set that suppresses echoes of our own writes
//! - [`LayoutEngine`]: the stacking rules (solo, pair, departure)
//! - [`EventRouter`]: two-phase pre/post-update intake and pending movements
//! - [`LayoutService`]: host lifecycle, task queue and bulk reset
//!
//! # Stacking Rules
//!
//! One occupant is centered at solo scale. When a newcomer arrives, the
//! first occupant shrinks to pair scale where it stands and the newcomer
//! shrinks beside it, between the cell center and the side it came from.
//! When a cell drops back to one occupant, that occupant returns to solo
//! scale.
//!
//! # Threading
//!
//! Single-threaded and cooperative. Writes are asynchronous and the host may
//! re-enter notification handlers before a write resolves; all state lives
//! behind `RefCell`s that are never borrowed across an await.

mod config;
mod engine;
mod error;
mod guard;
mod host;
mod memory;
mod occupancy;
mod router;
mod scale;
mod service;
mod state;

pub use config::{LayoutSettings, SettingsSource};
pub use engine::{newcomer_center, LayoutEngine, LayoutTask, DEGENERATE_LENGTH};
pub use error::{Error, MutationError, Result};
pub use guard::{Guarded, UpdateGuard};
pub use host::{
    EntityDirectory, EntityId, EntityPatch, EntitySnapshot, HostContext, HostEvent, Listener,
    MutationSink, NotificationSource, PositionChange, SubscriptionId,
};
pub use memory::{AppliedMutation, MemoryScene};
pub use occupancy::OccupancyTable;
pub use router::EventRouter;
pub use scale::{approximate_scale, scale_differs, ScaleField, BASELINE_SCALE, SCALE_TOLERANCE};
pub use service::{LayoutService, ResetReport};
pub use state::{CellSnapshot, LayoutSnapshot, LayoutState, PendingMovement};

pub use hexstack_topology as topology;
