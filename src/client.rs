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

/// Async typed CRUD client for one REST API root.
///
/// Same verbs and semantics as [`crate::RemoteModel`], for callers running
/// inside a Tokio runtime.
#[derive(Clone, Debug)]
pub struct AsyncRemoteModel {
    base_url: Url,
    config: ClientConfig,
    http: reqwest::Client,
}

impl AsyncRemoteModel {
    /// Creates a model with the default configuration.
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
    pub async fn filter<R, Q>(&self, entity: &str, conditions: &Q) -> Result<R, ClientError>
    where
        R: RemoteResponse,
        Q: Serialize + ?Sized,
    {
        let query = encode_conditions(conditions)?;
        let url = entity_url(&self.base_url, entity, &query)?;
        let raw = self
            .execute::<()>(Method::GET, url, None, &HeaderMap::new())
            .await?;
        decode(raw)
    }

    /// Follows every `next` link and returns all results as a single page.
    pub async fn filter_all<R, Q>(&self, entity: &str, conditions: &Q) -> Result<R, ClientError>
    where
        R: PaginatedResponse,
        Q: Serialize + ?Sized,
    {
        let mut page: R = self.filter(entity, conditions).await?;
        let mut results = page.take_results();

        while let Some(next) = page.next_url() {
            let url = next_page_url(next)?;
            debug!(url = %url, collected = results.len(), "following next page");
            let raw = self
                .execute::<()>(Method::GET, url, None, &HeaderMap::new())
                .await?;
            page = decode(raw)?;
            results.extend(page.take_results());
        }

        Ok(R::from_results(results))
    }

    /// Creates one record from `fields` with a `POST`.
    pub async fn create<R, B>(&self, entity: &str, fields: &B) -> Result<R, ClientError>
    where
        R: RemoteResponse,
        B: Serialize + ?Sized,
    {
        let url = entity_url(&self.base_url, entity, "")?;
        let raw = self
            .execute(Method::POST, url, Some(fields), &HeaderMap::new())
            .await?;
        decode(raw)
    }

    /// Creates many records with one `POST` of a JSON array.
    ///
    /// Only the raw response is attached; the body is not decoded into `R`.
    pub async fn create_bulk<R, B>(&self, entity: &str, records: &[B]) -> Result<R, ClientError>
    where
        R: RemoteResponse,
        B: Serialize,
    {
        let url = entity_url(&self.base_url, entity, "")?;
        let raw = self
            .execute(Method::POST, url, Some(records), &HeaderMap::new())
            .await?;
        R::from_raw(raw)
    }

    /// Updates a record with a `PATCH` of `fields`.
    pub async fn update<R, B>(&self, entity: &str, fields: &B) -> Result<R, ClientError>
    where
        R: RemoteResponse,
        B: Serialize + ?Sized,
    {
        let url = entity_url(&self.base_url, entity, "")?;
        let raw = self
            .execute(Method::PATCH, url, Some(fields), &HeaderMap::new())
            .await?;
        decode(raw)
    }

    /// Deletes with a `DELETE` carrying `fields` as its JSON body.
    pub async fn delete<R, B>(&self, entity: &str, fields: &B) -> Result<R, ClientError>
    where
        R: RemoteResponse,
        B: Serialize + ?Sized,
    {
        let url = entity_url(&self.base_url, entity, "")?;
        let raw = self
            .execute(Method::DELETE, url, Some(fields), &HeaderMap::new())
            .await?;
        decode_deleted(raw)
    }

    /// Sends one request through the retry, timeout and status pipeline.
    ///
    /// `extra_headers` override the default headers for this call only.
    pub async fn execute<B>(
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

            let result = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let response_headers = response.headers().clone();
                    let final_url = response.url().clone();
                    response
                        .text()
                        .await
                        .map(|payload| (status, response_headers, final_url, payload))
                }
                Err(error) => Err(error),
            };

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
                    tokio::time::sleep(delay).await;
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

fn build_http(config: &ClientConfig) -> Result<reqwest::Client, ClientError> {
    Ok(reqwest::Client::builder()
        .timeout(config.timeout)
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::AsyncRemoteModel;
    use crate::ClientError;

    #[test]
    fn rejects_relative_base_url() {
        let error = AsyncRemoteModel::new("/api/v1/").expect_err("relative url");
        assert!(matches!(error, ClientError::InvalidBaseUrl(url) if url == "/api/v1/"));
    }

    #[test]
    fn invalid_default_header_is_reported() {
        let error = AsyncRemoteModel::new("http://localhost:8000/api/")
            .expect("valid url")
            .with_header("x-api-key", "line\nbreak")
            .expect_err("newline in value");
        assert!(matches!(error, ClientError::InvalidHeader(_)));
    }
}
