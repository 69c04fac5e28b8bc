use reqwest::header::HeaderMap;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ClientError;

/// Unparsed transport response attached to every decoded response.
///
/// Useful when the body carries nothing to decode (for example a `204` delete)
/// or when the caller needs headers the response type does not model.
#[derive(Clone, Debug)]
pub struct RawResponse {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl RawResponse {
    pub(crate) fn new(url: Url, status: StatusCode, headers: HeaderMap, body: String) -> Self {
        Self {
            url,
            status,
            headers,
            body,
        }
    }

    /// Final URL of the request.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Body as received.
    pub fn text(&self) -> &str {
        &self.body
    }

    /// Returns `true` when the body is empty or whitespace only.
    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty()
    }

    /// Parses the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// A response type the remote model verbs can construct.
///
/// Body fields are bound through `Deserialize`; unknown keys are ignored unless
/// the type is marked `#[serde(deny_unknown_fields)]`. The raw transport
/// response is handed over separately through [`RemoteResponse::attach_raw`].
pub trait RemoteResponse: DeserializeOwned {
    /// Stores the raw transport response on the decoded value.
    fn attach_raw(&mut self, raw: RawResponse);

    /// Raw transport response, if one was attached.
    fn raw(&self) -> Option<&RawResponse>;

    /// Builds a response carrying only the raw transport response.
    ///
    /// The default deserializes an empty JSON object, so types with required
    /// fields fail here with [`ClientError::Json`].
    fn from_raw(raw: RawResponse) -> Result<Self, ClientError> {
        let mut response: Self = serde_json::from_value(Value::Object(Map::new()))?;
        response.attach_raw(raw);
        Ok(response)
    }
}

/// A response exposing a server-side `next` link, traversed by `filter_all`.
pub trait PaginatedResponse: RemoteResponse {
    type Item;

    /// Absolute URL of the next page, `None` on the last page.
    fn next_url(&self) -> Option<&str>;

    /// Moves this page's results out.
    fn take_results(&mut self) -> Vec<Self::Item>;

    /// Builds the aggregate of every page. `count` must equal `results.len()`.
    fn from_results(results: Vec<Self::Item>) -> Self;
}

/// Standard `count` / `next` / `previous` / `results` page.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Page<T> {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
    #[serde(skip)]
    raw: Option<RawResponse>,
}

impl<T: DeserializeOwned> RemoteResponse for Page<T> {
    fn attach_raw(&mut self, raw: RawResponse) {
        self.raw = Some(raw);
    }

    fn raw(&self) -> Option<&RawResponse> {
        self.raw.as_ref()
    }
}

impl<T: DeserializeOwned> PaginatedResponse for Page<T> {
    type Item = T;

    fn next_url(&self) -> Option<&str> {
        self.next.as_deref()
    }

    fn take_results(&mut self) -> Vec<T> {
        std::mem::take(&mut self.results)
    }

    fn from_results(results: Vec<T>) -> Self {
        Self {
            count: results.len() as u64,
            next: None,
            previous: None,
            results,
            raw: None,
        }
    }
}

/// Free-form response keeping every top-level body key in server order.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct GenericResponse {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(skip)]
    raw: Option<RawResponse>,
}

impl GenericResponse {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

impl RemoteResponse for GenericResponse {
    fn attach_raw(&mut self, raw: RawResponse) {
        self.raw = Some(raw);
    }

    fn raw(&self) -> Option<&RawResponse> {
        self.raw.as_ref()
    }
}

/// Conventional `{"detail": "..."}` error body.
#[derive(Clone, Debug, Deserialize)]
pub struct FailedResponse {
    pub detail: String,
    #[serde(skip)]
    raw: Option<RawResponse>,
}

impl RemoteResponse for FailedResponse {
    fn attach_raw(&mut self, raw: RawResponse) {
        self.raw = Some(raw);
    }

    fn raw(&self) -> Option<&RawResponse> {
        self.raw.as_ref()
    }
}

/// Response with no decoded fields; only the raw handle is kept.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EmptyResponse {
    #[serde(skip)]
    raw: Option<RawResponse>,
}

impl RemoteResponse for EmptyResponse {
    fn attach_raw(&mut self, raw: RawResponse) {
        self.raw = Some(raw);
    }

    fn raw(&self) -> Option<&RawResponse> {
        self.raw.as_ref()
    }
}
