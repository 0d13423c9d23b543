//! Axial hex coordinates for a pointy-top plane.
//!
//! A cell is addressed by (q, r); the cube component s is derived so that
//! q + r + s = 0. Hosts address cells by (column, row), so conversions to and
//! from odd-r offset coordinates live here as well.

use std::ops::{Add, Neg, Sub};

use crate::CellKey;

/// Axial cell address. `r` doubles as the offset row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HexCoord {
    pub q: i64,
    pub r: i64,
}

impl HexCoord {
    pub const ORIGIN: Self = Self { q: 0, r: 0 };

    pub const fn new(q: i64, r: i64) -> Self {
        Self { q, r }
    }

    /// Derived cube component.
    pub const fn s(&self) -> i64 {
        -self.q - self.r
    }

    /// Number of steps between two cells.
    pub fn hex_distance(&self, other: &Self) -> u64 {
        let d = *self - *other;
        d.q.unsigned_abs().max(d.r.unsigned_abs()).max(d.s().unsigned_abs())
    }

    /// The six neighbor directions.
    pub const DIRECTIONS: [Self; 6] = [
        Self { q: 1, r: 0 },  // East
        Self { q: 1, r: -1 }, // Northeast
        Self { q: 0, r: -1 }, // Northwest
        Self { q: -1, r: 0 }, // West
        Self { q: -1, r: 1 }, // Southwest
        Self { q: 0, r: 1 },  // Southeast
    ];

    pub fn neighbors(&self) -> [Self; 6] {
        Self::DIRECTIONS.map(|d| *self + d)
    }

    /// Round fractional axial coordinates to the containing cell.
    ///
    /// Rounds all three cube components and then recomputes the one with the
    /// largest rounding error, so q + r + s = 0 is preserved.
    pub fn round(qf: f64, rf: f64) -> Self {
        let sf = -qf - rf;
        let mut q = qf.round();
        let mut r = rf.round();
        let s = sf.round();

        let dq = (q - qf).abs();
        let dr = (r - rf).abs();
        let ds = (s - sf).abs();

        if dq > dr && dq > ds {
            q = -r - s;
        } else if dr > ds {
            r = -q - s;
        }

        Self::new(q as i64, r as i64)
    }

    /// Convert to odd-r offset coordinates (odd rows shoved right).
    pub fn to_offset(self) -> CellKey {
        let col = self.q + (self.r - (self.r & 1)) / 2;
        CellKey::new(col, self.r)
    }

    /// Convert from odd-r offset coordinates.
    pub fn from_offset(key: CellKey) -> Self {
        let q = key.col - (key.row - (key.row & 1)) / 2;
        Self::new(q, key.row)
    }
}

impl Add for HexCoord {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            q: self.q + other.q,
            r: self.r + other.r,
        }
    }
}

impl Sub for HexCoord {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self {
            q: self.q - other.q,
            r: self.r - other.r,
        }
    }
}

impl Neg for HexCoord {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self {
            q: -self.q,
            r: -self.r,
        }
    }
}

impl std::fmt::Display for HexCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.q, self.r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_counts_steps() {
        let a = HexCoord::new(2, -1);
        assert_eq!(a.hex_distance(&a), 0);
        assert_eq!(a.hex_distance(&HexCoord::ORIGIN), 2);
        assert_eq!(HexCoord::new(-3, 5).hex_distance(&HexCoord::new(1, 0)), 5);
    }

    #[test]
    fn six_distinct_neighbors_one_step_away() {
        let center = HexCoord::new(3, -2);
        let around = center.neighbors();

        assert!(around.iter().all(|n| n.hex_distance(&center) == 1));
        let unique: std::collections::HashSet<_> = around.iter().collect();
        assert_eq!(unique.len(), 6);
    }

    #[test]
    fn round_snaps_to_nearest_cell() {
        assert_eq!(HexCoord::round(0.1, -0.1), HexCoord::ORIGIN);
        assert_eq!(HexCoord::round(0.9, 0.05), HexCoord::new(1, 0));
        assert_eq!(HexCoord::round(-1.2, 0.9), HexCoord::new(-1, 1));
    }

    #[test]
    fn round_preserves_cube_constraint() {
        for (qf, rf) in [(0.5, 0.5), (-0.49, 0.51), (2.4, -1.6), (0.33, 0.33)] {
            let c = HexCoord::round(qf, rf);
            assert_eq!(c.q + c.r + c.s(), 0);
        }
    }

    #[test]
    fn offset_conversion_inverts() {
        for q in -4..=4 {
            for r in -4..=4 {
                let c = HexCoord::new(q, r);
                assert_eq!(HexCoord::from_offset(c.to_offset()), c);
            }
        }
    }

    #[test]
    fn odd_rows_shift_columns() {
        // Odd rows (including negative ones) are shoved right.
        assert_eq!(HexCoord::new(0, 1).to_offset(), CellKey::new(0, 1));
        assert_eq!(HexCoord::new(-1, 2).to_offset(), CellKey::new(0, 2));
        assert_eq!(HexCoord::new(0, -1).to_offset(), CellKey::new(-1, -1));
    }

    #[test]
    fn vector_arithmetic() {
        let p = HexCoord::new(1, 2);
        let d = HexCoord::new(4, -1);

        assert_eq!(p + d, HexCoord::new(5, 1));
        assert_eq!(p - d, HexCoord::new(-3, 3));
        assert_eq!(-(p - d), d - p);
    }
}
