//! Hexstack simulator
//!
//! Replays a scenario against an in-memory scene and prints the resulting
//! layout as JSON. Without an argument the built-in pairing demo runs.
//!
//! ```text
//! hexstack-sim [scenario.json]
//! ```

mod error;
mod scenario;

use std::path::Path;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::Result;
use crate::scenario::Scenario;

fn load(path: Option<&Path>) -> Result<Scenario> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading scenario");
            Scenario::from_json(&std::fs::read_to_string(path)?)
        }
        None => {
            tracing::info!("No scenario given, running demo");
            Ok(Scenario::demo())
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout carries the JSON result
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hexstack_sim=info,hexstack_layout=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let arg = std::env::args_os().nth(1);
    let scenario = load(arg.as_deref().map(Path::new))?;
    let outcome = scenario.run().await?;

    tracing::info!(
        cells = outcome.layout.cells.len(),
        mutations = outcome.mutations.len(),
        "Scenario complete"
    );
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
