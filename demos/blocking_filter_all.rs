//! Fetch every page of an entity and print the aggregated results.
//!
//! Run:
//! `cargo run --example blocking_filter_all`
//!
//! Env vars:
//! - `REMOTE_MODELS_BASE_URL` (required, for example `http://localhost:8000/api/v1/`)
//! - `REMOTE_MODELS_ENTITY` (defaults to `benchmarks-states`)
//! - `RUST_LOG` (for example `remote_models=debug`)

use remote_models::{Page, RemoteModel};
use serde_json::Value;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let entity =
        std::env::var("REMOTE_MODELS_ENTITY").unwrap_or_else(|_| "benchmarks-states".to_owned());

    let model = RemoteModel::from_env()?;
    let all: Page<Value> = model.filter_all(&entity, &())?;

    println!("{} results", all.count);
    println!("{}", serde_json::to_string_pretty(&all.results)?);
    Ok(())
}
