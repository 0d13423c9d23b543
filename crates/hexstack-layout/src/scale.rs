//! Approximate current scale and the write-suppression tolerance.

use serde::{Deserialize, Serialize};

use crate::host::EntitySnapshot;

/// Scale writes closer than this to the current scale are skipped.
pub const SCALE_TOLERANCE: f64 = 0.01;

/// Scale used when an entity reports none of the considered fields.
pub const BASELINE_SCALE: f64 = 1.0;

/// A scale-like field of an entity snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleField {
    Scale,
    TextureScaleX,
    TextureScaleY,
}

impl ScaleField {
    pub const ALL: [Self; 3] = [Self::Scale, Self::TextureScaleX, Self::TextureScaleY];

    fn read(self, snapshot: &EntitySnapshot) -> Option<f64> {
        match self {
            Self::Scale => snapshot.scale,
            Self::TextureScaleX => snapshot.texture_scale_x,
            Self::TextureScaleY => snapshot.texture_scale_y,
        }
    }
}

/// Mean of the listed fields that are present, or [`BASELINE_SCALE`].
pub fn approximate_scale(snapshot: &EntitySnapshot, fields: &[ScaleField]) -> f64 {
    let (sum, count) = fields
        .iter()
        .filter_map(|f| f.read(snapshot))
        .fold((0.0, 0u32), |(sum, n), v| (sum + v, n + 1));
    if count == 0 {
        BASELINE_SCALE
    } else {
        sum / f64::from(count)
    }
}

/// Whether writing `target` over `current` is worth a mutation.
pub fn scale_differs(current: f64, target: f64) -> bool {
    (current - target).abs() > SCALE_TOLERANCE
}
