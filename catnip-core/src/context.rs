//! The request-scoped [`Context`] every middleware and route handler works on.
//!
//! A context is created once per request with the request body already
//! buffered. Handlers read the request through it and build the response by
//! mutating it; nothing is shared with other requests.

use std::collections::HashMap;
use std::fmt;

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{header, Extensions, HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, Uri};
use axum::response::Response;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CatnipError;

/// Body of the response being built.
#[derive(Default)]
pub enum ResponseBody {
    #[default]
    Empty,
    Full(Bytes),
    Stream(Body),
}

impl ResponseBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, ResponseBody::Empty)
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Empty => f.write_str("Empty"),
            ResponseBody::Full(bytes) => write!(f, "Full({} bytes)", bytes.len()),
            ResponseBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

#[derive(Debug, Default)]
struct ResponseState {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: ResponseBody,
}

/// Request/response state for a single request.
#[derive(Debug, Default)]
pub struct Context {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: HashMap<String, String>,
    extensions: Extensions,
    response: ResponseState,
}

impl Context {
    /// Build a context from request parts and a buffered body.
    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        Context {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params: HashMap::new(),
            extensions: parts.extensions,
            response: ResponseState::default(),
        }
    }

    // ── Request ────────────────────────────────────────────────

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a request header as a string, if present and visible ASCII.
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The buffered request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Deserialize the request body as JSON.
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T, CatnipError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| CatnipError::BadRequest(format!("Invalid JSON: {}", e)))
    }

    /// A captured path parameter, e.g. `id` for `/users/:id`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    /// First value of a query parameter, percent-decoded.
    ///
    /// `None` means the parameter is absent; `?name=` yields `Some("")`.
    pub fn query(&self, name: &str) -> Option<String> {
        self.query_pairs()
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// All query parameters. When a name repeats, the last value wins.
    pub fn query_params(&self) -> HashMap<String, String> {
        self.query_pairs().into_iter().collect()
    }

    fn query_pairs(&self) -> Vec<(String, String)> {
        self.uri
            .query()
            .and_then(|q| serde_urlencoded::from_str(q).ok())
            .unwrap_or_default()
    }

    /// Typed per-request state shared between handlers.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// A body-less copy of the request line and headers, for handing the
    /// request to a framework service (router, file server).
    pub(crate) fn to_request(&self) -> Request<Body> {
        let mut request = Request::new(Body::empty());
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.headers_mut() = self.headers.clone();
        request
    }

    // ── Response ───────────────────────────────────────────────

    /// The status set so far, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.response.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.response.status = Some(status);
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response.headers
    }

    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.response.headers
    }

    /// Set (replace) a response header.
    pub fn set_header<K, V>(&mut self, name: K, value: V) -> Result<(), CatnipError>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: fmt::Display,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: fmt::Display,
    {
        let name = HeaderName::try_from(name).map_err(|e| CatnipError::InvalidHeader(e.to_string()))?;
        let value =
            HeaderValue::try_from(value).map_err(|e| CatnipError::InvalidHeader(e.to_string()))?;
        self.response.headers.insert(name, value);
        Ok(())
    }

    pub fn set_body(&mut self, body: ResponseBody) {
        self.response.body = body;
    }

    /// Respond with plain text.
    pub fn text(&mut self, text: impl Into<String>) {
        self.response.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.response.body = ResponseBody::Full(Bytes::from(text.into()));
    }

    /// Respond with a JSON-serialized value.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CatnipError> {
        let bytes = serde_json::to_vec(value)?;
        self.response.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.response.body = ResponseBody::Full(Bytes::from(bytes));
        Ok(())
    }

    /// Turn the built response into an HTTP response.
    ///
    /// Without an explicit status the response is `200 OK` when a body was
    /// written and `404 Not Found` otherwise.
    pub fn into_response(self) -> Response {
        let ResponseState {
            status,
            headers,
            body,
        } = self.response;
        let status = status.unwrap_or(if body.is_empty() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::OK
        });
        let body = match body {
            ResponseBody::Empty => Body::empty(),
            ResponseBody::Full(bytes) => Body::from(bytes),
            ResponseBody::Stream(body) => body,
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}
