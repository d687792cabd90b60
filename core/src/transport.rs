//! Request building, execution and response classification.
//!
//! # Design
//! `Transport` holds only a base URL and an executor; it carries no mutable
//! state between calls. `build_request` and `parse_response` are pure, so
//! URL resolution, header rules and error classification are testable without
//! a network. `call` glues them around one executor round-trip, guarded by a
//! [`CancelToken`].

use std::fmt;
use std::sync::Arc;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::cancel::CancelToken;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpExecutor, HttpMethod, HttpRequest, HttpResponse, RequestBody, ReqwestExecutor};
use crate::types::ProblemDetails;

const JSON: &str = "application/json";

impl RequestBody {
    /// Serializes `value` as a JSON body.
    pub fn json<B: Serialize + ?Sized>(value: &B) -> Result<Self, ApiError> {
        serde_json::to_string(value)
            .map(RequestBody::Json)
            .map_err(|e| ApiError::SerializationError(e.to_string()))
    }
}

/// Per-call options: method (GET by default), body and extra headers.
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub method: HttpMethod,
    pub body: Option<RequestBody>,
    pub headers: Vec<(String, String)>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self::new(HttpMethod::Get)
    }
}

impl CallOptions {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn get() -> Self {
        Self::new(HttpMethod::Get)
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_json<B: Serialize + ?Sized>(self, value: &B) -> Result<Self, ApiError> {
        Ok(self.with_body(RequestBody::json(value)?))
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Stateless JSON transport for the Follow Rivers API.
#[derive(Clone)]
pub struct Transport {
    base_url: String,
    executor: Arc<dyn HttpExecutor>,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Transport {
    pub fn new(base_url: &str, executor: Arc<dyn HttpExecutor>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            executor,
        }
    }

    /// Transport over the network using `reqwest`.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(&config.base_url, Arc::new(ReqwestExecutor::new()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URLs pass through untouched; anything else is joined onto
    /// the base URL.
    pub fn resolve_url(&self, path_or_url: &str) -> String {
        if has_http_scheme(path_or_url) {
            path_or_url.to_string()
        } else if path_or_url.starts_with('/') {
            format!("{}{path_or_url}", self.base_url)
        } else {
            format!("{}/{path_or_url}", self.base_url)
        }
    }

    pub fn build_request(&self, path_or_url: &str, options: CallOptions) -> HttpRequest {
        let mut headers = options.headers;
        set_header(&mut headers, "Accept", JSON);
        match &options.body {
            Some(RequestBody::Json(_)) => set_header(&mut headers, "Content-Type", JSON),
            Some(RequestBody::Raw { content_type, .. }) => {
                set_header(&mut headers, "Content-Type", content_type)
            }
            None => {}
        }

        HttpRequest {
            method: options.method,
            url: self.resolve_url(path_or_url),
            headers,
            body: options.body,
        }
    }

    /// Executes one request. `Ok(None)` means the server sent no usable body.
    pub async fn call<T: DeserializeOwned>(
        &self,
        path_or_url: &str,
        options: CallOptions,
        cancel: &CancelToken,
    ) -> Result<Option<T>, ApiError> {
        let request = self.build_request(path_or_url, options);
        debug!(method = %request.method, url = %request.url, "calling API");
        let url = request.url.clone();

        let response = cancel
            .guard(async {
                self.executor.execute(request).await.map_err(|cause| {
                    error!(%url, %cause, "network error calling the API");
                    ApiError::Network { cause }
                })
            })
            .await?;

        parse_response(response)
    }

    /// Like [`Transport::call`], but a missing body is an error.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        path_or_url: &str,
        options: CallOptions,
        cancel: &CancelToken,
    ) -> Result<T, ApiError> {
        self.call(path_or_url, options, cancel)
            .await?
            .ok_or(ApiError::EmptyBody)
    }

    /// Executes a request whose response body, if any, is not needed.
    pub async fn send(
        &self,
        path_or_url: &str,
        options: CallOptions,
        cancel: &CancelToken,
    ) -> Result<(), ApiError> {
        self.call::<IgnoredAny>(path_or_url, options, cancel).await?;
        Ok(())
    }
}

/// Classifies a response: non-2xx becomes an error built from the problem
/// details body; 204, empty and malformed bodies become `None`.
pub fn parse_response<T: DeserializeOwned>(response: HttpResponse) -> Result<Option<T>, ApiError> {
    if !response.is_success() {
        let details = parse_problem(&response.body);
        return Err(ApiError::from_status(response.status, details));
    }

    if response.status == 204 || response.body.trim().is_empty() {
        return Ok(None);
    }

    let value: serde_json::Value = match serde_json::from_str(&response.body) {
        Ok(value) => value,
        Err(e) => {
            warn!(status = response.status, error = %e, "could not parse API response as JSON");
            return Ok(None);
        }
    };

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| ApiError::DeserializationError(e.to_string()))
}

fn parse_problem(body: &str) -> Option<ProblemDetails> {
    if body.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(body) {
        Ok(details) => Some(details),
        Err(e) => {
            debug!(error = %e, "error response has no problem details body");
            None
        }
    }
}

fn has_http_scheme(s: &str) -> bool {
    let lower = s.get(..8).unwrap_or(s).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    headers.push((name.to_string(), value.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedExecutor;
    use crate::types::Person;

    fn transport() -> Transport {
        Transport::new("http://localhost:5000", Arc::new(ScriptedExecutor::new()))
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn relative_paths_join_the_base_url() {
        let t = transport();
        assert_eq!(t.resolve_url("/api/person"), "http://localhost:5000/api/person");
        assert_eq!(t.resolve_url("api/person"), "http://localhost:5000/api/person");
    }

    #[test]
    fn absolute_urls_are_used_verbatim() {
        let t = transport();
        let url = "HTTPS://rivers.example/api/person?pageNumber=2&pageSize=10";
        assert_eq!(t.resolve_url(url), url);
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let t = Transport::new("http://localhost:5000/", Arc::new(ScriptedExecutor::new()));
        assert_eq!(t.resolve_url("/api/person"), "http://localhost:5000/api/person");
    }

    #[test]
    fn get_request_accepts_json_without_content_type() {
        let req = transport().build_request("/api/person/1", CallOptions::get());
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.header("accept"), Some(JSON));
        assert_eq!(req.header("content-type"), None);
        assert!(req.body.is_none());
    }

    #[test]
    fn json_body_sets_content_type() {
        let options = CallOptions::new(HttpMethod::Post)
            .with_json(&serde_json::json!({"name": "Mariana"}))
            .unwrap();
        let req = transport().build_request("/api/person", options);
        assert_eq!(req.header("Content-Type"), Some(JSON));
        match req.body {
            Some(RequestBody::Json(text)) => {
                let body: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(body["name"], "Mariana");
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn raw_body_keeps_its_content_type() {
        let options = CallOptions::new(HttpMethod::Post)
            .with_header("content-type", "text/plain")
            .with_body(RequestBody::Raw {
                content_type: "multipart/form-data; boundary=xyz".to_string(),
                bytes: b"--xyz--".to_vec(),
            });
        let req = transport().build_request("/upload", options);
        assert_eq!(req.header("content-type"), Some("multipart/form-data; boundary=xyz"));
        assert_eq!(req.headers.iter().filter(|(k, _)| k.eq_ignore_ascii_case("content-type")).count(), 1);
    }

    #[test]
    fn caller_accept_header_is_overridden() {
        let options = CallOptions::get().with_header("accept", "text/html").with_header("X-Trace", "1");
        let req = transport().build_request("/api/person", options);
        assert_eq!(req.header("Accept"), Some(JSON));
        assert_eq!(req.header("x-trace"), Some("1"));
    }

    #[test]
    fn error_message_is_problem_title() {
        let err = parse_response::<Person>(response(
            400,
            r#"{"title":"One or more validation errors occurred.","status":400,"errors":{"name":["required"]}}"#,
        ))
        .unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(err.to_string(), "One or more validation errors occurred.");
        assert!(err.details().unwrap().errors.is_some());
    }

    #[test]
    fn error_without_body_uses_generic_message() {
        let err = parse_response::<Person>(response(502, "")).unwrap_err();
        assert_eq!(err.to_string(), "API error (502)");
        assert!(err.details().is_none());
    }

    #[test]
    fn error_with_unparseable_body_uses_generic_message() {
        let err = parse_response::<Person>(response(500, "<html>oops</html>")).unwrap_err();
        assert_eq!(err.to_string(), "API error (500)");
    }

    #[test]
    fn no_content_is_absent() {
        assert!(parse_response::<Person>(response(204, "")).unwrap().is_none());
        assert!(parse_response::<Person>(response(200, "  ")).unwrap().is_none());
    }

    #[test]
    fn malformed_json_is_absent_not_an_error() {
        assert!(parse_response::<Person>(response(200, "{not json")).unwrap().is_none());
    }

    #[test]
    fn wrong_shape_is_a_deserialization_error() {
        let err = parse_response::<Person>(response(200, r#"{"id":"x"}"#)).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[tokio::test]
    async fn network_failure_has_status_zero() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.push_failure("connection refused");
        let t = Transport::new("http://localhost:5000", executor);
        let err = t
            .call::<Person>("/api/person/1", CallOptions::get(), &CancelToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), 0);
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn fetch_requires_a_body() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.push(204, "");
        let t = Transport::new("http://localhost:5000", executor);
        let err = t
            .fetch::<Person>("/api/person/1", CallOptions::get(), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::EmptyBody));
    }

    #[tokio::test]
    async fn cancelled_call_never_reaches_the_executor() {
        let executor = Arc::new(ScriptedExecutor::new());
        let t = Transport::new("http://localhost:5000", executor.clone());
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = t.send("/api/person/1", CallOptions::new(HttpMethod::Delete), &cancel).await.unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));
        assert!(executor.requests().is_empty());
    }
}
