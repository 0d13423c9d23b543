//! Error types for the simulator.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Scenario file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Scenario file is not valid JSON for a scenario
    #[error("Scenario parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A layout write failed
    #[error("Layout error: {0}")]
    Layout(#[from] hexstack_layout::Error),

    /// A step references an entity the scene does not have
    #[error("Step {step}: unknown entity {id}")]
    UnknownEntity { step: usize, id: hexstack_layout::EntityId },
}
