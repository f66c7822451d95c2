//! HTTP boundary for the service under test
//!
//! Requests and responses are plain values so the runner can be driven by any
//! [`Transport`]. The shipped transport is a `ureq` agent with a global
//! per-call timeout.

use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Envelope `code` the backend returns on success
pub const SUCCESS_CODE: i64 = 0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection to {url} failed: {message}")]
    Connect { url: String, message: String },

    #[error("Request to {url} timed out: {message}")]
    Timeout { url: String, message: String },

    #[error("Request to {url} failed: {message}")]
    Other { url: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

/// One part of a `multipart/form-data` body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl Part {
    pub fn file(name: &str, filename: &str, content_type: &str, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.to_string(),
            filename: Some(filename.to_string()),
            content_type: Some(content_type.to_string()),
            data: data.into(),
        }
    }

    pub fn json(name: &str, value: &Value) -> Self {
        Self {
            name: name.to_string(),
            filename: None,
            content_type: Some("application/json".to_string()),
            data: value.to_string().into_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
    Multipart(Vec<Part>),
}

/// A fully rendered request, relative to the configured base URL
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl HttpRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post_json(path: &str, value: Value) -> Self {
        Self::new(Method::Post, path).with_body(Body::Json(value))
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success_status(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the `{code, message, data}` envelope, if the body is one
    pub fn envelope(&self) -> Option<Envelope> {
        let raw: Value = serde_json::from_str(&self.body).ok()?;
        let code = raw.get("code")?.as_i64()?;
        let message = raw
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Some(Envelope { code, message, raw })
    }
}

/// The backend's response wrapper
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub code: i64,
    pub message: String,
    /// The whole decoded body; assertions and extraction point into it
    pub raw: Value,
}

impl Envelope {
    pub fn data(&self) -> Option<&Value> {
        self.raw.get("data")
    }
}

/// Anything that can deliver an [`HttpRequest`] to the service
pub trait Transport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking transport backed by a `ureq` agent
pub struct UreqTransport {
    agent: ureq::Agent,
    base_url: String,
}

impl UreqTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn decorate<B>(
        &self,
        mut builder: ureq::RequestBuilder<B>,
        request: &HttpRequest,
    ) -> ureq::RequestBuilder<B> {
        for (key, value) in &request.query {
            builder = builder.query(key, value);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder
    }

    fn dispatch(
        &self,
        request: &HttpRequest,
        url: &str,
    ) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
        let (content_type, payload) = encode_body(&request.body);

        match request.method {
            Method::Get => self.decorate(self.agent.get(url), request).call(),
            Method::Delete => self.decorate(self.agent.delete(url), request).call(),
            Method::Post | Method::Put => {
                let mut builder = if request.method == Method::Post {
                    self.agent.post(url)
                } else {
                    self.agent.put(url)
                };
                builder = self.decorate(builder, request);
                if let Some(content_type) = content_type {
                    builder = builder.header("Content-Type", content_type.as_str());
                }
                builder.send(&payload[..])
            }
        }
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = self.url(&request.path);
        debug!(method = %request.method, %url, "sending request");

        let response = self
            .dispatch(request, &url)
            .map_err(|e| classify_ureq_error(&url, e))?;

        let status = response.status().as_u16();
        let body = response
            .into_body()
            .read_to_string()
            .map_err(|e| classify_ureq_error(&url, e))?;

        debug!(%url, status, bytes = body.len(), "received response");
        Ok(HttpResponse { status, body })
    }
}

fn classify_ureq_error(url: &str, error: ureq::Error) -> TransportError {
    let url = url.to_string();
    let message = error.to_string();
    match error {
        ureq::Error::Timeout(_) => TransportError::Timeout { url, message },
        ureq::Error::ConnectionFailed | ureq::Error::HostNotFound => {
            TransportError::Connect { url, message }
        }
        ureq::Error::Io(ref io) if io.kind() == std::io::ErrorKind::TimedOut => {
            TransportError::Timeout { url, message }
        }
        ureq::Error::Io(ref io)
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ) =>
        {
            TransportError::Connect { url, message }
        }
        _ => TransportError::Other { url, message },
    }
}

/// Join a base URL and a request path with exactly one slash between them
pub fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base, path.trim_start_matches('/'))
}

fn encode_body(body: &Body) -> (Option<String>, Vec<u8>) {
    match body {
        Body::Empty => (None, Vec::new()),
        Body::Json(value) => (
            Some("application/json".to_string()),
            value.to_string().into_bytes(),
        ),
        Body::Multipart(parts) => {
            let boundary = multipart_boundary();
            (
                Some(format!("multipart/form-data; boundary={}", boundary)),
                encode_multipart(parts, &boundary),
            )
        }
    }
}

fn multipart_boundary() -> String {
    format!("eduprobe-boundary-{}", crate::fixture::random_suffix())
}

/// Serialize parts as a `multipart/form-data` body
pub fn encode_multipart(parts: &[Part], boundary: &str) -> Vec<u8> {
    let mut body = Vec::new();

    for part in parts {
        push_line(&mut body, &format!("--{}", boundary));
        let disposition = match &part.filename {
            Some(filename) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
                part.name, filename
            ),
            None => format!("Content-Disposition: form-data; name=\"{}\"", part.name),
        };
        push_line(&mut body, &disposition);
        if let Some(content_type) = &part.content_type {
            push_line(&mut body, &format!("Content-Type: {}", content_type));
        }
        push_line(&mut body, "");
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    push_line(&mut body, &format!("--{}--", boundary));

    body
}

fn push_line(body: &mut Vec<u8>, line: &str) {
    body.extend_from_slice(line.as_bytes());
    body.extend_from_slice(b"\r\n");
}
