//! Host-facing seams: entity lookup, mutation, and notifications.
//!
//! Everything here is supplied by the embedding application. The layout core
//! only ever reads snapshots, writes partial patches, and reacts to events.

use std::rc::Rc;

use futures::future::LocalBoxFuture;
use hexstack_topology::{GridBackend, GridMath, Point, Size};
use serde::{Deserialize, Serialize};

use crate::config::SettingsSource;
use crate::error::MutationError;

/// Identifier of a token on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Point-in-time view of an entity as the host reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    /// Top-left pixel position.
    pub position: Point,
    /// Footprint in grid units.
    #[serde(default)]
    pub size: Size,
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub texture_scale_x: Option<f64>,
    #[serde(default)]
    pub texture_scale_y: Option<f64>,
}

impl EntitySnapshot {
    /// A one-cell entity at full scale.
    pub fn new(id: EntityId, position: Point) -> Self {
        Self {
            id,
            position,
            size: Size::square(1.0),
            scale: Some(1.0),
            texture_scale_x: Some(1.0),
            texture_scale_y: Some(1.0),
        }
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.size = size;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self.texture_scale_x = Some(scale);
        self.texture_scale_y = Some(scale);
        self
    }

    /// Apply a patch in place, the way a host persists it.
    pub fn apply(&mut self, patch: &EntityPatch) {
        if let Some(x) = patch.x {
            self.position.x = x;
        }
        if let Some(y) = patch.y {
            self.position.y = y;
        }
        if patch.scale.is_some() {
            self.scale = patch.scale;
        }
        if patch.texture_scale_x.is_some() {
            self.texture_scale_x = patch.texture_scale_x;
        }
        if patch.texture_scale_y.is_some() {
            self.texture_scale_y = patch.texture_scale_y;
        }
    }
}

/// Partial field set accepted by a [`MutationSink`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture_scale_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture_scale_y: Option<f64>,
}

impl EntityPatch {
    #[must_use]
    pub fn with_position(mut self, position: Point) -> Self {
        self.x = Some(position.x);
        self.y = Some(position.y);
        self
    }

    /// Set the entity scale and both texture axes together.
    #[must_use]
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self.texture_scale_x = Some(scale);
        self.texture_scale_y = Some(scale);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn moves(&self) -> bool {
        self.x.is_some() || self.y.is_some()
    }
}

/// Proposed positional fields carried by a pre-update notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionChange {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

impl PositionChange {
    pub fn to(position: Point) -> Self {
        Self {
            x: Some(position.x),
            y: Some(position.y),
        }
    }

    pub fn is_positional(&self) -> bool {
        self.x.is_some() || self.y.is_some()
    }

    /// The resulting position once applied over `current`.
    pub fn applied_to(&self, current: Point) -> Point {
        Point::new(self.x.unwrap_or(current.x), self.y.unwrap_or(current.y))
    }
}

impl From<&EntityPatch> for PositionChange {
    fn from(patch: &EntityPatch) -> Self {
        Self {
            x: patch.x,
            y: patch.y,
        }
    }
}

/// Notifications delivered by the host for entity documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// A change is about to be applied.
    PreUpdate { id: EntityId, changes: PositionChange },
    /// A change has been applied.
    PostUpdate { id: EntityId },
    /// An entity was created.
    Create { id: EntityId },
    /// An entity was deleted.
    Delete { id: EntityId },
}

impl HostEvent {
    pub fn entity(&self) -> EntityId {
        match self {
            HostEvent::PreUpdate { id, .. }
            | HostEvent::PostUpdate { id }
            | HostEvent::Create { id }
            | HostEvent::Delete { id } => *id,
        }
    }
}

/// Lookup of live entities in the active scene.
pub trait EntityDirectory {
    fn get(&self, id: EntityId) -> Option<EntitySnapshot>;

    /// Every entity currently present in the active scene.
    fn entities(&self) -> Vec<EntitySnapshot>;
}

/// Asynchronous persistence of entity changes.
///
/// The host may broadcast the change (and so re-enter notification
/// handlers) before the returned future completes.
pub trait MutationSink {
    fn update(
        &self,
        id: EntityId,
        patch: EntityPatch,
    ) -> LocalBoxFuture<'_, Result<(), MutationError>>;
}

/// Callback registered with a [`NotificationSource`].
pub type Listener = Rc<dyn Fn(&HostEvent)>;

/// Handle returned by [`NotificationSource::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Event subscription registry of the host.
pub trait NotificationSource {
    fn subscribe(&self, listener: Listener) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Everything the layout core consumes from the host.
pub struct HostContext<G> {
    pub grid: GridMath<G>,
    pub directory: Rc<dyn EntityDirectory>,
    pub sink: Rc<dyn MutationSink>,
    pub notifications: Rc<dyn NotificationSource>,
    pub settings: Rc<dyn SettingsSource>,
}

impl<G: GridBackend> HostContext<G> {
    pub fn new(
        grid: G,
        directory: Rc<dyn EntityDirectory>,
        sink: Rc<dyn MutationSink>,
        notifications: Rc<dyn NotificationSource>,
        settings: Rc<dyn SettingsSource>,
    ) -> Self {
        Self {
            grid: GridMath::new(grid),
            directory,
            sink,
            notifications,
            settings,
        }
    }
}
