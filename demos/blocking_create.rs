//! Create one record, then a batch, and delete the first again.
//!
//! Run:
//! `cargo run --example blocking_create`
//!
//! Env vars:
//! - `REMOTE_MODELS_BASE_URL` (required)
//! - `REMOTE_MODELS_TOKEN` (optional, sent as `Authorization: Token <value>`)

use remote_models::{EmptyResponse, GenericResponse, RemoteModel, RemoteResponse};
use serde_json::json;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut model = RemoteModel::from_env()?;
    if let Ok(token) = std::env::var("REMOTE_MODELS_TOKEN") {
        model = model.with_header("authorization", &format!("Token {token}"))?;
    }

    let created: GenericResponse = model.create(
        "benchmark-timeseries",
        &json!({"date": "2022-10-11", "benchmark": 1}),
    )?;
    println!("created: {:?}", created.fields);

    let batch: EmptyResponse = model.create_bulk(
        "benchmark-timeseries",
        &[
            json!({"date": "2022-10-12", "benchmark": 1}),
            json!({"date": "2022-10-13", "benchmark": 1}),
        ],
    )?;
    if let Some(raw) = batch.raw() {
        println!("bulk create: {} {}", raw.status(), raw.text());
    }

    let deleted: EmptyResponse = model.delete("benchmark-timeseries", &created.fields)?;
    if let Some(raw) = deleted.raw() {
        println!("delete: {}", raw.status());
    }
    Ok(())
}
