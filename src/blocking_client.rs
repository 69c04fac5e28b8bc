use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Method, Url};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{ClientConfig, RetryPolicy, base_url_from_env};
use crate::request::{
    check_status, decode, decode_deleted, encode_conditions, entity_url, merge_headers,
    next_page_url, parse_base_url, should_retry, transport_error,
};
use crate::{ClientError, PaginatedResponse, RawResponse, RemoteResponse};

/// Blocking typed CRUD client for one REST API root.
///
/// Every verb targets `{base_url}{entity}/?{query}` and decodes the JSON
/// answer into a caller-chosen [`RemoteResponse`]. The connection pool is
/// shared by clones, so one model can serve many threads.
///
/// This is the synchronous counterpart of [`crate::AsyncRemoteModel`].
#[derive(Clone, Debug)]
pub struct RemoteModel {
    base_url: Url,
    config: ClientConfig,
    http: reqwest::blocking::Client,
}

impl RemoteModel {
    /// Creates a model with the default configuration: 30 second timeout,
    /// 3 retries and a JSON `content-type` header.
    ///
    /// The URL is normalized to include a trailing slash.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ClientError> {
        Self::with_config(base_url, ClientConfig::default())
    }

    /// Creates a model with an explicit configuration.
    pub fn with_config(
        base_url: impl AsRef<str>,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        let base_url = parse_base_url(base_url.as_ref())?;
        let http = build_http(&config)?;
        Ok(Self {
            base_url,
            config,
            http,
        })
    }

    /// Creates a model from `REMOTE_MODELS_BASE_URL` and the optional
    /// `REMOTE_MODELS_TIMEOUT_SECS` / `REMOTE_MODELS_MAX_RETRIES` variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::with_config(base_url_from_env()?, ClientConfig::from_env()?)
    }

    /// Returns a new model using `timeout` as the per-attempt deadline.
    pub fn with_timeout(self, timeout: Duration) -> Result<Self, ClientError> {
        let mut config = self.config;
        config.timeout = timeout;
        Self::rebuild(self.base_url, config)
    }

    /// Returns a new model using `retry` for transient transport failures.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Returns a new model sending `name: value` with every request.
    ///
    /// Authentication headers are added this way.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, ClientError> {
        self.config.insert_header(name, value)?;
        Ok(self)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetches one page of `entity` matching `conditions`.
    ///
    /// `conditions` may be a struct, a map, a slice of `(key, value)` pairs or
    /// `&()` for none.
    pub fn filter<R, Q>(&self, entity: &str, conditions: &Q) -> Result<R, ClientError>
    where
        R: RemoteResponse,
        Q: Serialize + ?Sized,
    {
        let query = encode_conditions(conditions)?;
        let url = entity_url(&self.base_url, entity, &query)?;
        let raw = self.execute::<()>(Method::GET, url, None, &HeaderMap::new())?;
        decode(raw)
    }

    /// Follows every `next` link and returns all results as a single page.
    ///
    /// The aggregate's `count` is the number of accumulated results and it has
    /// no raw response attached. Any failing page aborts the whole traversal.
    pub fn filter_all<R, Q>(&self, entity: &str, conditions: &Q) -> Result<R, ClientError>
    where
        R: PaginatedResponse,
        Q: Serialize + ?Sized,
    {
        let mut page: R = self.filter(entity, conditions)?;
        let mut results = page.take_results();

        while let Some(next) = page.next_url() {
            let url = next_page_url(next)?;
            debug!(url = %url, collected = results.len(), "following next page");
            let raw = self.execute::<()>(Method::GET, url, None, &HeaderMap::new())?;
            page = decode(raw)?;
            results.extend(page.take_results());
        }

        Ok(R::from_results(results))
    }

    /// Creates one record from `fields` with a `POST`.
    pub fn create<R, B>(&self, entity: &str, fields: &B) -> Result<R, ClientError>
    where
        R: RemoteResponse,
        B: Serialize + ?Sized,
    {
        let url = entity_url(&self.base_url, entity, "")?;
        let raw = self.execute(Method::POST, url, Some(fields), &HeaderMap::new())?;
        decode(raw)
    }

    /// Creates many records with one `POST` of a JSON array.
    ///
    /// The response body is not decoded into `R`; read it through
    /// [`RemoteResponse::raw`] instead.
    pub fn create_bulk<R, B>(&self, entity: &str, records: &[B]) -> Result<R, ClientError>
    where
        R: RemoteResponse,
        B: Serialize,
    {
        let url = entity_url(&self.base_url, entity, "")?;
        let raw = self.execute(Method::POST, url, Some(records), &HeaderMap::new())?;
        R::from_raw(raw)
    }

    /// Updates a record with a `PATCH` of `fields`.
    pub fn update<R, B>(&self, entity: &str, fields: &B) -> Result<R, ClientError>
    where
        R: RemoteResponse,
        B: Serialize + ?Sized,
    {
        let url = entity_url(&self.base_url, entity, "")?;
        let raw = self.execute(Method::PATCH, url, Some(fields), &HeaderMap::new())?;
        decode(raw)
    }

    /// Deletes with a `DELETE` carrying `fields` as its JSON body.
    ///
    /// A `204 No Content` with an empty body yields a response built only from
    /// the raw transport response.
    pub fn delete<R, B>(&self, entity: &str, fields: &B) -> Result<R, ClientError>
    where
        R: RemoteResponse,
        B: Serialize + ?Sized,
    {
        let url = entity_url(&self.base_url, entity, "")?;
        let raw = self.execute(Method::DELETE, url, Some(fields), &HeaderMap::new())?;
        decode_deleted(raw)
    }

    /// Sends one request through the retry, timeout and status pipeline.
    ///
    /// `extra_headers` override the default headers for this call only.
    pub fn execute<B>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        extra_headers: &HeaderMap,
    ) -> Result<RawResponse, ClientError>
    where
        B: Serialize + ?Sized,
    {
        let headers = merge_headers(&self.config.default_headers, extra_headers);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(method = %method, url = %url, attempt, "sending request");

            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .headers(headers.clone());
            if let Some(json_body) = body {
                request = request.json(json_body);
            }

            let result = request.send().and_then(|response| {
                let status = response.status();
                let response_headers = response.headers().clone();
                let final_url = response.url().clone();
                response
                    .text()
                    .map(|payload| (status, response_headers, final_url, payload))
            });

            match result {
                Ok((status, response_headers, final_url, payload)) => {
                    return check_status(&url, status, response_headers, final_url, payload);
                }
                Err(error) if should_retry(&self.config.retry, attempt, &method, &error) => {
                    let delay = self.config.retry.delay_for(attempt);
                    warn!(
                        method = %method,
                        url = %url,
                        attempt,
                        error = %error,
                        "retrying request in {delay:?}"
                    );
                    std::thread::sleep(delay);
                }
                Err(error) => return Err(transport_error(&url, error)),
            }
        }
    }

    fn rebuild(base_url: Url, config: ClientConfig) -> Result<Self, ClientError> {
        let http = build_http(&config)?;
        Ok(Self {
            base_url,
            config,
            http,
        })
    }
}

fn build_http(config: &ClientConfig) -> Result<reqwest::blocking::Client, ClientError> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(config.timeout)
        .build()?)
}
