//! Hexstack Grid Topology
//!
//! Coordinate plumbing for stacking tokens on a hexagonal canvas grid.
//!
//! # Coordinate Spaces
//!
//! - **Axial** ([`HexCoord`]): q/r axes at 60 degrees, used for the hex math.
//! - **Offset** ([`CellKey`]): the host's column/row addressing (odd-r,
//!   pointy-top). This is the key every occupancy lookup uses.
//! - **Pixel** ([`Point`], [`Size`]): canvas space, top-left anchored.
//!
//! # Grid Services
//!
//! Pixel/cell conversion belongs to the host. [`GridMath`] wraps any
//! [`GridBackend`], probes which of its historical APIs is available and
//! exposes one stable set of conversions. [`HexGrid`] is a self-contained
//! backend for tests and offline simulation.

mod geometry;
mod grid;
mod hex;

pub use geometry::{footprint_size, midpoint, CellKey, Point, Size};
pub use grid::{GridApi, GridBackend, GridMath, HexGrid};
pub use hex::HexCoord;
