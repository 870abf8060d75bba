use std::io::{self, Read};
use std::sync::Arc;

use http::{Extensions, Method};
use may_minihttp::Request;
use smallvec::SmallVec;
use tracing::debug;

use crate::ids::{RequestId, REQUEST_ID_HEADER};

/// Maximum number of path/query parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Maximum number of headers/cookies before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Name/value pairs for path and query parameters. Names are shared `Arc<str>`.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Name/value pairs for headers and cookies. Header names are stored lowercase.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// An inbound request, detached from the transport.
///
/// Built by [`parse_request`] from `may_minihttp`, or directly with [`HttpRequest::new`]
/// when driving [`Server::handle`](crate::Server::handle) in-process.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub request_id: RequestId,
    pub method: Method,
    /// Path without the query string.
    pub path: String,
    pub headers: HeaderVec,
    pub cookies: HeaderVec,
    pub query_params: ParamVec,
    /// Filled by the mux once a route matched.
    pub path_params: ParamVec,
    pub body: Vec<u8>,
    /// Typed values attached by middleware (claims, tenant, ...).
    pub extensions: Extensions,
}

impl HttpRequest {
    /// Build a request for `uri`, which may carry a query string.
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, query),
            None => (uri, ""),
        };
        Self {
            request_id: RequestId::new(),
            method,
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            headers: HeaderVec::new(),
            cookies: HeaderVec::new(),
            query_params: parse_query_params(query),
            path_params: ParamVec::new(),
            body: Vec::new(),
            extensions: Extensions::new(),
        }
    }

    /// Add a header. `Cookie` headers are parsed into [`cookies`](Self::cookies) and
    /// `X-Request-ID` replaces the generated id when it is a valid ULID.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.push_header(name, value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize `value` as the body and declare `application/json`.
    pub fn with_json(self, value: &serde_json::Value) -> Self {
        self.with_header("content-type", "application/json")
            .with_body(value.to_string())
    }

    fn push_header(&mut self, name: &str, value: String) {
        let name = name.to_ascii_lowercase();
        if name == "cookie" {
            self.cookies.extend(parse_cookies(&value));
        }
        if name == REQUEST_ID_HEADER {
            self.request_id = RequestId::from_header_or_new(Some(&value));
        }
        self.headers.push((Arc::from(name), value));
    }

    /// Case-insensitive header lookup; the first occurrence wins.
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Query parameter lookup; the last occurrence wins (`?limit=10&limit=20` → `20`).
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Declared media type without parameters, e.g. `application/json`.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.get_header("content-type")
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
            .filter(|ct| !ct.is_empty())
    }
}

/// Split a `Cookie` header into name/value pairs.
pub fn parse_cookies(raw: &str) -> HeaderVec {
    raw.split(';')
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim().to_string();
            Some((Arc::from(name), value))
        })
        .collect()
}

/// URL-decode a query string (without the leading `?`).
pub fn parse_query_params(query: &str) -> ParamVec {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
        .collect()
}

/// Convert a `may_minihttp` request into an [`HttpRequest`].
///
/// At most `max_body + 1` bytes are read so an oversized body is detectable without
/// buffering all of it.
pub fn parse_request(req: Request, max_body: Option<usize>) -> io::Result<HttpRequest> {
    let method = Method::from_bytes(req.method().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mut parsed = HttpRequest::new(method, req.path());
    for header in req.headers().iter() {
        parsed.push_header(header.name, String::from_utf8_lossy(header.value).into_owned());
    }

    let mut body = Vec::new();
    match max_body {
        Some(limit) => {
            let limit = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
            req.body().take(limit).read_to_end(&mut body)?;
        }
        None => {
            req.body().read_to_end(&mut body)?;
        }
    }
    parsed.body = body;

    debug!(
        request_id = %parsed.request_id,
        method = %parsed.method,
        path = %parsed.path,
        header_count = parsed.headers.len(),
        cookie_count = parsed.cookies.len(),
        query_count = parsed.query_params.len(),
        body_bytes = parsed.body.len(),
        "Request parsed"
    );
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_splits_query() {
        let req = HttpRequest::new(Method::GET, "/items?limit=10&limit=20&q=a%20b");
        assert_eq!(req.path, "/items");
        assert_eq!(req.get_query_param("limit"), Some("20"));
        assert_eq!(req.get_query_param("q"), Some("a b"));
    }

    #[test]
    fn test_headers_are_case_insensitive_and_cookies_parsed() {
        let req = HttpRequest::new(Method::GET, "/")
            .with_header("Content-Type", "application/json; charset=utf-8")
            .with_header("Cookie", "session=abc; theme=dark");
        assert_eq!(req.content_type(), Some("application/json"));
        assert_eq!(req.get_header("CONTENT-TYPE"), Some("application/json; charset=utf-8"));
        assert_eq!(req.get_cookie("theme"), Some("dark"));
        assert_eq!(req.get_cookie("missing"), None);
    }

    #[test]
    fn test_request_id_header_is_adopted() {
        let id = RequestId::new();
        let req = HttpRequest::new(Method::GET, "/").with_header("X-Request-ID", id.to_string());
        assert_eq!(req.request_id, id);
    }
}
