use std::borrow::Cow;
use std::sync::Arc;

use http::StatusCode;
use serde_json::Value;
use tracing::debug;

use super::request::HeaderVec;

/// Canonical reason phrase for a status code.
pub fn status_reason(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

/// A finished response, ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderVec,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            body: Vec::new(),
        }
    }

    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("content-type", "text/plain; charset=utf-8")
            .with_body(body.into())
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        set_header(&mut self.headers, name, value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        get_header(&self.headers, name)
    }

    #[must_use]
    pub fn body_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Parse the body as JSON.
    pub fn body_json(&self) -> serde_json::Result<Value> {
        serde_json::from_slice(&self.body)
    }
}

fn set_header(headers: &mut HeaderVec, name: &str, value: String) {
    let name = name.to_ascii_lowercase();
    match headers.iter_mut().find(|(k, _)| k.as_ref() == name) {
        Some(entry) => entry.1 = value,
        None => headers.push((Arc::from(name), value)),
    }
}

fn get_header<'a>(headers: &'a HeaderVec, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Per-request response channel.
///
/// Headers may be changed at any time; the status and body are written at most once.
/// Later writes are discarded, so a response is never flushed twice.
#[derive(Debug)]
pub struct ResponseWriter {
    status: u16,
    headers: HeaderVec,
    body: Vec<u8>,
    written: bool,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: HeaderVec::new(),
            body: Vec::new(),
            written: false,
        }
    }

    /// Set (or replace) a header.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        set_header(&mut self.headers, name, value.into());
    }

    /// Append a header even if one with the same name exists (`Set-Cookie`).
    pub fn append_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers
            .push((Arc::from(name.to_ascii_lowercase()), value.into()));
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        get_header(&self.headers, name)
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn is_written(&self) -> bool {
        self.written
    }

    /// Write status, content type and body. Returns `false` if a response was
    /// already written, in which case nothing changes.
    pub fn write(&mut self, status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> bool {
        if !self.claim(status) {
            return false;
        }
        self.set_header("content-type", content_type);
        self.body = body.into();
        true
    }

    /// Write a status with no body.
    pub fn write_empty(&mut self, status: u16) -> bool {
        self.claim(status)
    }

    /// Write a prepared response, merging its headers over the current ones.
    pub fn write_response(&mut self, response: HttpResponse) -> bool {
        if !self.claim(response.status) {
            return false;
        }
        for (name, value) in response.headers {
            set_header(&mut self.headers, &name, value);
        }
        self.body = response.body;
        true
    }

    fn claim(&mut self, status: u16) -> bool {
        if self.written {
            debug!(
                status = self.status,
                discarded_status = status,
                "Response already written, discarding write"
            );
            return false;
        }
        self.written = true;
        self.status = status;
        true
    }

    /// Finish the exchange. An unwritten response is an empty 200.
    pub fn into_response(self) -> HttpResponse {
        HttpResponse {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}
