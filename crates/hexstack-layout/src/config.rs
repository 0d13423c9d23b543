//! Layout settings and where they are read from.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::scale::ScaleField;

/// Tunables of the stacking policy.
///
/// Offsets and the center distance are fractions of the grid unit size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Whether notifications are processed at all.
    pub enabled: bool,

    /// Scale of an entity alone in its cell.
    pub solo_scale: f64,

    /// Scale of every entity in a shared cell.
    pub pair_scale: f64,

    /// Radial shift of a newcomer along the destination-center→midpoint
    /// direction. Positive moves away from the center, negative toward it.
    pub center_distance: f64,

    /// Fixed horizontal newcomer shift.
    pub offset_x: f64,

    /// Fixed vertical newcomer shift.
    pub offset_y: f64,

    /// Fields averaged to estimate an entity's current scale.
    pub scale_fields: Vec<ScaleField>,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            solo_scale: 1.0,
            pair_scale: 0.4,
            center_distance: -0.10,
            offset_x: -0.30,
            offset_y: -0.30,
            scale_fields: ScaleField::ALL.to_vec(),
        }
    }
}

impl LayoutSettings {
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_scales(mut self, solo: f64, pair: f64) -> Self {
        self.solo_scale = solo;
        self.pair_scale = pair;
        self
    }

    #[must_use]
    pub fn with_center_distance(mut self, fraction: f64) -> Self {
        self.center_distance = fraction;
        self
    }

    #[must_use]
    pub fn with_offsets(mut self, x: f64, y: f64) -> Self {
        self.offset_x = x;
        self.offset_y = y;
        self
    }

    #[must_use]
    pub fn with_scale_fields(mut self, fields: Vec<ScaleField>) -> Self {
        self.scale_fields = fields;
        self
    }
}

/// Settings storage, consulted on every notification (never cached).
pub trait SettingsSource {
    fn current(&self) -> LayoutSettings;
}

impl SettingsSource for LayoutSettings {
    fn current(&self) -> LayoutSettings {
        self.clone()
    }
}

impl SettingsSource for RefCell<LayoutSettings> {
    fn current(&self) -> LayoutSettings {
        self.borrow().clone()
    }
}
