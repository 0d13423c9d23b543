//! Error types for hexstack-layout.

use thiserror::Error;

use crate::host::EntityId;

/// Result type for hexstack-layout operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by a [`MutationSink`](crate::host::MutationSink).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MutationError {
    /// The entity disappeared before the write landed.
    #[error("entity {0} no longer exists")]
    Gone(EntityId),

    /// The host refused to persist the change.
    #[error("host rejected update of entity {entity}: {reason}")]
    Rejected { entity: EntityId, reason: String },
}

/// Errors surfaced to whoever drives notification handling.
#[derive(Debug, Error)]
pub enum Error {
    /// A position/scale write failed in the host.
    #[error("mutation failed: {0}")]
    Mutation(#[from] MutationError),

    /// An event arrived before `initialize()` or after `cleanup()`.
    #[error("layout service is not initialized")]
    NotInitialized,
}
