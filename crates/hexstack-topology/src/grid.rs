//! Grid service boundary and the probing wrapper built on top of it.
//!
//! Hosts have shipped three generations of pixel/cell conversion API. A
//! [`GridBackend`] implements whichever of them it supports; [`GridMath`]
//! probes once at construction and sticks to the most capable one.
//!
//! # Round-trip law
//!
//! For every variant, `cell_key_at(center_of(k)) == k`.

use crate::{CellKey, HexCoord, Point, Size};

/// A host grid service.
///
/// Only [`unit_size`](Self::unit_size) is required. Every other method
/// defaults to "unsupported".
pub trait GridBackend {
    /// Pixel size of one grid unit.
    fn unit_size(&self) -> f64;

    /// Pixel dimensions of one cell's bounding box.
    fn cell_pixel_size(&self) -> Size {
        Size::square(self.unit_size())
    }

    /// Cell containing a pixel (current API).
    fn offset_of(&self, _point: Point) -> Option<CellKey> {
        None
    }

    /// Pixel center of a cell (current API).
    fn offset_center(&self, _cell: CellKey) -> Option<Point> {
        None
    }

    /// `(row, col)` of the cell containing a pixel (legacy API).
    fn grid_position_of(&self, _point: Point) -> Option<(i64, i64)> {
        None
    }

    /// Top-left pixel of the cell at `(row, col)` (legacy API).
    fn pixels_from_grid_position(&self, _row: i64, _col: i64) -> Option<Point> {
        None
    }

    /// Top-left pixel of the cell containing a point (oldest API).
    fn snapped_top_left(&self, _point: Point) -> Option<Point> {
        None
    }
}

/// Which backend API generation [`GridMath`] settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridApi {
    /// `offset_of` / `offset_center`
    Offset,
    /// `grid_position_of` / `pixels_from_grid_position`
    GridPosition,
    /// `snapped_top_left`; keys are the snapped top-left pixel
    TopLeft,
    /// No conversion support; square cells of `unit_size`
    Square,
}

impl GridApi {
    /// Probe a backend for the most capable API it answers.
    pub fn probe<G: GridBackend + ?Sized>(backend: &G) -> Self {
        let p = Point::ORIGIN;
        if backend.offset_of(p).is_some() && backend.offset_center(CellKey::ORIGIN).is_some() {
            Self::Offset
        } else if backend.grid_position_of(p).is_some()
            && backend.pixels_from_grid_position(0, 0).is_some()
        {
            Self::GridPosition
        } else if backend.snapped_top_left(p).is_some() {
            Self::TopLeft
        } else {
            Self::Square
        }
    }
}

/// Coordinate functions over a probed grid backend.
#[derive(Debug, Clone)]
pub struct GridMath<G> {
    backend: G,
    api: GridApi,
}

impl<G: GridBackend> GridMath<G> {
    pub fn new(backend: G) -> Self {
        let api = GridApi::probe(&backend);
        Self { backend, api }
    }

    /// The API generation in use.
    pub fn api(&self) -> GridApi {
        self.api
    }

    pub fn backend(&self) -> &G {
        &self.backend
    }

    pub fn unit_size(&self) -> f64 {
        self.backend.unit_size()
    }

    /// Cell whose area contains `point`.
    pub fn cell_key_at(&self, point: Point) -> CellKey {
        let resolved = match self.api {
            GridApi::Offset => self.backend.offset_of(point),
            GridApi::GridPosition => self
                .backend
                .grid_position_of(point)
                .map(|(row, col)| CellKey::new(col, row)),
            GridApi::TopLeft => self
                .backend
                .snapped_top_left(point)
                .map(|tl| CellKey::new(tl.x.round() as i64, tl.y.round() as i64)),
            GridApi::Square => None,
        };
        resolved.unwrap_or_else(|| self.square_key(point))
    }

    /// Cell containing the center of a footprint `size_in_cells` big whose
    /// top-left corner sits at `top_left`.
    pub fn cell_key_for(&self, top_left: Point, size_in_cells: Size) -> CellKey {
        let footprint = size_in_cells.scaled(self.unit_size());
        self.cell_key_at(top_left.offset_by_half(footprint))
    }

    /// Pixel center of a cell.
    pub fn center_of(&self, cell: CellKey) -> Point {
        let resolved = match self.api {
            GridApi::Offset => self.backend.offset_center(cell),
            GridApi::GridPosition => self
                .backend
                .pixels_from_grid_position(cell.row, cell.col)
                .map(|tl| tl.offset_by_half(self.backend.cell_pixel_size())),
            GridApi::TopLeft => Some(
                Point::new(cell.col as f64, cell.row as f64)
                    .offset_by_half(self.backend.cell_pixel_size()),
            ),
            GridApi::Square => None,
        };
        resolved.unwrap_or_else(|| self.square_center(cell))
    }

    fn square_key(&self, point: Point) -> CellKey {
        let unit = self.unit_size();
        CellKey::new((point.x / unit).floor() as i64, (point.y / unit).floor() as i64)
    }

    fn square_center(&self, cell: CellKey) -> Point {
        let unit = self.unit_size();
        Point::new((cell.col as f64 + 0.5) * unit, (cell.row as f64 + 0.5) * unit)
    }
}

/// Pointy-top hexagonal grid with odd-r offset addressing.
///
/// `size` is the hex width (flat-to-flat). Cell `0:0` has its bounding box
/// anchored at the pixel origin. Implements every API generation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HexGrid {
    pub size: f64,
}

impl HexGrid {
    pub const fn new(size: f64) -> Self {
        Self { size }
    }

    /// Corner radius of one hex.
    pub fn radius(&self) -> f64 {
        self.size / 3f64.sqrt()
    }

    /// Vertical distance between adjacent row centers.
    pub fn row_spacing(&self) -> f64 {
        1.5 * self.radius()
    }

    fn axial_of(&self, point: Point) -> HexCoord {
        let px = point.x - self.size / 2.0;
        let py = point.y - self.radius();
        let rf = py / self.row_spacing();
        let qf = px / self.size - rf / 2.0;
        HexCoord::round(qf, rf)
    }

    fn axial_center(&self, hex: HexCoord) -> Point {
        Point::new(
            self.size * (hex.q as f64 + hex.r as f64 / 2.0) + self.size / 2.0,
            self.row_spacing() * hex.r as f64 + self.radius(),
        )
    }
}

impl GridBackend for HexGrid {
    fn unit_size(&self) -> f64 {
        self.size
    }

    fn cell_pixel_size(&self) -> Size {
        Size::new(self.size, 2.0 * self.radius())
    }

    fn offset_of(&self, point: Point) -> Option<CellKey> {
        Some(self.axial_of(point).to_offset())
    }

    fn offset_center(&self, cell: CellKey) -> Option<Point> {
        Some(self.axial_center(HexCoord::from_offset(cell)))
    }

    fn grid_position_of(&self, point: Point) -> Option<(i64, i64)> {
        let key = self.axial_of(point).to_offset();
        Some((key.row, key.col))
    }

    fn pixels_from_grid_position(&self, row: i64, col: i64) -> Option<Point> {
        let center = self.axial_center(HexCoord::from_offset(CellKey::new(col, row)));
        Some(Point::new(center.x - self.size / 2.0, center.y - self.radius()))
    }

    fn snapped_top_left(&self, point: Point) -> Option<Point> {
        let key = self.axial_of(point).to_offset();
        self.pixels_from_grid_position(key.row, key.col)
    }
}
