//! Request plumbing shared by the async and blocking remote models.

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded;

use crate::{ClientError, RawResponse, RemoteResponse, RetryPolicy};

/// Parses the API root and normalizes it to end with `/`.
pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, ClientError> {
    let parsed =
        Url::parse(base_url).map_err(|_| ClientError::InvalidBaseUrl(base_url.to_owned()))?;
    if !matches!(parsed.scheme(), "http" | "https")
        || parsed.query().is_some()
        || parsed.fragment().is_some()
    {
        return Err(ClientError::InvalidBaseUrl(base_url.to_owned()));
    }
    Ok(ensure_trailing_slash(parsed))
}

fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_owned();
        path.push('/');
        url.set_path(&path);
    }
    url
}

/// Builds `{base}{entity}/?{query}`. The `?` is kept even for an empty query.
pub(crate) fn entity_url(base_url: &Url, entity: &str, query: &str) -> Result<Url, ClientError> {
    let entity = entity.strip_prefix('/').unwrap_or(entity);
    let raw = format!("{base_url}{entity}/?{query}");
    Url::parse(&raw).map_err(|_| ClientError::InvalidPath(raw))
}

/// Parses a server-provided pagination link.
pub(crate) fn next_page_url(next: &str) -> Result<Url, ClientError> {
    Url::parse(next).map_err(|_| ClientError::InvalidPath(next.to_owned()))
}

/// Encodes filter conditions as an `application/x-www-form-urlencoded` string.
///
/// Accepts anything serializing to a JSON object, a sequence of
/// `(key, value)` pairs, or `()` for no conditions. Arrays repeat their key,
/// `null` values are skipped.
pub(crate) fn encode_conditions<Q>(conditions: &Q) -> Result<String, ClientError>
where
    Q: Serialize + ?Sized,
{
    let value = serde_json::to_value(conditions)
        .map_err(|err| ClientError::InvalidConditions(err.to_string()))?;
    let mut serializer = form_urlencoded::Serializer::new(String::new());

    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, value) in &map {
                append_pair(&mut serializer, key, value)?;
            }
        }
        Value::Array(pairs) => {
            for pair in &pairs {
                match pair.as_array().map(Vec::as_slice) {
                    Some([Value::String(key), value]) => {
                        append_pair(&mut serializer, key, value)?;
                    }
                    _ => {
                        return Err(ClientError::InvalidConditions(format!(
                            "expected a (key, value) pair, got {pair}"
                        )));
                    }
                }
            }
        }
        other => {
            return Err(ClientError::InvalidConditions(format!(
                "expected a map of conditions, got {other}"
            )));
        }
    }

    Ok(serializer.finish())
}

fn append_pair(
    serializer: &mut form_urlencoded::Serializer<'_, String>,
    key: &str,
    value: &Value,
) -> Result<(), ClientError> {
    match value {
        Value::Null => {}
        Value::String(text) => {
            serializer.append_pair(key, text);
        }
        Value::Number(number) => {
            serializer.append_pair(key, &number.to_string());
        }
        Value::Bool(flag) => {
            serializer.append_pair(key, if *flag { "true" } else { "false" });
        }
        Value::Array(items) => {
            for item in items {
                if item.is_array() {
                    return Err(ClientError::InvalidConditions(format!(
                        "nested list for '{key}'"
                    )));
                }
                append_pair(serializer, key, item)?;
            }
        }
        Value::Object(_) => {
            return Err(ClientError::InvalidConditions(format!(
                "nested object for '{key}'"
            )));
        }
    }
    Ok(())
}

/// Default headers with per-call overrides applied on top.
pub(crate) fn merge_headers(defaults: &HeaderMap, extra: &HeaderMap) -> HeaderMap {
    let mut headers = defaults.clone();
    for (name, value) in extra {
        headers.insert(name.clone(), value.clone());
    }
    headers
}

fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT | Method::DELETE
    )
}

/// Decides whether a failed attempt (1-based `attempt`) is retried.
pub(crate) fn should_retry(
    policy: &RetryPolicy,
    attempt: u32,
    method: &Method,
    error: &reqwest::Error,
) -> bool {
    if attempt > policy.max_retries {
        return false;
    }
    error.is_connect() || is_idempotent(method)
}

/// Maps a transport failure that survived retries to a [`ClientError`].
pub(crate) fn transport_error(url: &Url, error: reqwest::Error) -> ClientError {
    if error.is_timeout() {
        tracing::error!(url = %url, error = %error, "remote model request timed out");
        ClientError::Timeout {
            url: url.to_string(),
            source: error,
        }
    } else {
        ClientError::Request(error)
    }
}

/// Wraps a completed exchange, turning any status of 400 or above into an error.
pub(crate) fn check_status(
    request_url: &Url,
    status: StatusCode,
    headers: HeaderMap,
    final_url: Url,
    body: String,
) -> Result<RawResponse, ClientError> {
    if status.as_u16() >= 400 {
        return Err(ClientError::FailedRequest {
            status,
            url: request_url.to_string(),
            body,
        });
    }
    Ok(RawResponse::new(final_url, status, headers, body))
}

/// Decodes the body into `R` and attaches the raw response.
pub(crate) fn decode<R: RemoteResponse>(raw: RawResponse) -> Result<R, ClientError> {
    let mut response: R = serde_json::from_str(raw.text())?;
    response.attach_raw(raw);
    Ok(response)
}

/// Like [`decode`], but a `204` with an empty body yields a raw-only response.
pub(crate) fn decode_deleted<R: RemoteResponse>(raw: RawResponse) -> Result<R, ClientError> {
    if raw.status() == StatusCode::NO_CONTENT && raw.is_empty() {
        R::from_raw(raw)
    } else {
        decode(raw)
    }
}
