//! Typed CRUD client for resource-oriented JSON REST APIs.
//!
//! Public API layers:
//! - [`RemoteModel`]/[`AsyncRemoteModel`]: `filter`, `filter_all`, `create`,
//!   `create_bulk`, `update` and `delete` against `{base_url}{entity}/`.
//! - [`RemoteResponse`]/[`PaginatedResponse`]: how decoded bodies become
//!   caller-defined response types, with stock shapes [`Page`],
//!   [`GenericResponse`], [`FailedResponse`] and [`EmptyResponse`].
//! - [`ClientConfig`]/[`RetryPolicy`]: timeout, retry and default headers.
//! - [`ClientError`]: unified error type used by all operations.
//!
//! ```no_run
//! use remote_models::{Page, RemoteModel};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct BenchmarkState {
//!     benchmark: u64,
//!     state: String,
//! }
//!
//! let model = RemoteModel::new("http://benchmarks-api.example.com/api/v1/")?;
//! let states: Page<BenchmarkState> =
//!     model.filter_all("benchmarks-states", &[("benchmark", "1")])?;
//! println!("{} states", states.count);
//! # Ok::<(), remote_models::ClientError>(())
//! ```

mod blocking_client;
mod client;
mod config;
mod error;
mod request;
mod response;

/// Blocking remote model.
pub use blocking_client::RemoteModel;
/// Async remote model.
pub use client::AsyncRemoteModel;
pub use config::{ClientConfig, ENV_BASE_URL, ENV_MAX_RETRIES, ENV_TIMEOUT_SECS, RetryPolicy};
/// Error type returned by all remote model operations.
pub use error::ClientError;
pub use response::{
    EmptyResponse, FailedResponse, GenericResponse, Page, PaginatedResponse, RawResponse,
    RemoteResponse,
};

/// HTTP types appearing in the public API.
pub use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
pub use reqwest::{Method, StatusCode, Url};
