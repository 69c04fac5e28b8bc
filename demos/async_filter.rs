//! Filter an entity with query conditions using the async model.
//!
//! Run:
//! `cargo run --example async_filter`
//!
//! Env vars:
//! - `REMOTE_MODELS_BASE_URL` (required)
//! - `REMOTE_MODELS_LIMIT` (defaults to `5`)

use remote_models::{AsyncRemoteModel, Page};
use serde_json::Value;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let limit = std::env::var("REMOTE_MODELS_LIMIT").unwrap_or_else(|_| "5".to_owned());

    let model = AsyncRemoteModel::from_env()?;
    let page: Page<Value> = model
        .filter(
            "benchmarks-states",
            &[("limit", limit.as_str()), ("offset", "0")],
        )
        .await?;

    println!("{} of {} results", page.results.len(), page.count);
    if let Some(next) = &page.next {
        println!("next page: {next}");
    }
    Ok(())
}
