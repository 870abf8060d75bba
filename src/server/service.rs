use std::io;
use std::sync::Arc;

use dashmap::DashMap;
use may_minihttp::{HttpService, Request, Response};
use once_cell::sync::Lazy;
use tracing::warn;

use super::request::parse_request;
use super::response::{status_reason, HttpResponse};
use crate::app::dispatch;
use crate::registry::Core;

/// `may_minihttp` service backed by a server's registry. Cheap to clone; every
/// connection coroutine gets its own copy.
#[derive(Clone)]
pub struct AppService {
    core: Arc<Core>,
}

impl AppService {
    pub(crate) fn new(core: Arc<Core>) -> Self {
        Self { core }
    }
}

/// Distinct dynamic header lines kept for the life of the process.
const MAX_HEADER_LINES: usize = 1024;

/// Interned header lines for `may_minihttp`, which only takes `&'static str`.
///
/// Each distinct line is allocated once. Once `cap` lines exist, new ones are
/// refused instead of allocated, so per-request values cannot grow memory.
struct HeaderLines {
    lines: DashMap<String, &'static str>,
    cap: usize,
}

impl HeaderLines {
    fn new(cap: usize) -> Self {
        Self {
            lines: DashMap::new(),
            cap,
        }
    }

    fn get(&self, name: &str, value: &str) -> Option<&'static str> {
        match (name, value) {
            ("content-type", "application/json") => return Some("Content-Type: application/json"),
            ("content-type", "application/xml") => return Some("Content-Type: application/xml"),
            ("content-type", "text/plain; charset=utf-8") => return Some("Content-Type: text/plain; charset=utf-8"),
            ("content-type", "text/html; charset=utf-8") => return Some("Content-Type: text/html; charset=utf-8"),
            _ => {}
        }
        let line = format!("{name}: {value}");
        if let Some(interned) = self.lines.get(&line) {
            return Some(*interned.value());
        }
        if self.lines.len() >= self.cap {
            return None;
        }
        let interned = *self
            .lines
            .entry(line)
            .or_insert_with_key(|line| {
                let leaked: &'static str = Box::leak(line.clone().into_boxed_str());
                leaked
            })
            .value();
        Some(interned)
    }
}

static HEADER_LINES: Lazy<HeaderLines> = Lazy::new(|| HeaderLines::new(MAX_HEADER_LINES));

/// Headers the transport never forwards: it writes the first two itself, and the
/// request id is unique per request so it would never intern.
fn transport_skips(name: &str) -> bool {
    matches!(name, "content-length" | "date" | crate::ids::REQUEST_ID_HEADER)
}

fn write_headers(res: &mut Response, response: &HttpResponse, lines: &HeaderLines) {
    for (name, value) in &response.headers {
        if transport_skips(name) {
            continue;
        }
        match lines.get(name, value) {
            Some(line) => {
                res.header(line);
            }
            None => warn!(header = %name, "Too many distinct header values; header dropped"),
        }
    }
}

fn write_response(res: &mut Response, response: HttpResponse) {
    res.status_code(usize::from(response.status), status_reason(response.status));
    write_headers(res, &response, &HEADER_LINES);
    res.body_vec(response.body);
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let response = match parse_request(req, self.core.config.max_body_size) {
            Ok(parsed) => dispatch(&self.core, parsed),
            Err(e) => {
                warn!(error = %e, "Malformed request");
                HttpResponse::json(400, &serde_json::json!({ "error": format!("malformed request: {e}") }))
            }
        };
        write_response(res, response);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lines_are_interned_once() {
        let lines = HeaderLines::new(2);
        assert_eq!(lines.get("content-type", "application/json"), Some("Content-Type: application/json"));
        assert_eq!(lines.lines.len(), 0);

        let first = lines.get("location", "/items/1").unwrap();
        let again = lines.get("location", "/items/1").unwrap();
        assert_eq!(first, "location: /items/1");
        assert!(std::ptr::eq(first, again));
        assert_eq!(lines.lines.len(), 1);
    }

    #[test]
    fn test_header_lines_stop_at_cap() {
        let lines = HeaderLines::new(2);
        for i in 0..100 {
            let _ = lines.get("etag", &format!("\"v{i}\""));
        }
        assert_eq!(lines.lines.len(), 2);
        assert_eq!(lines.get("etag", "\"v0\""), Some("etag: \"v0\""));
        assert_eq!(lines.get("etag", "\"v99\""), None);
    }

    #[test]
    fn test_request_id_is_not_forwarded() {
        assert!(transport_skips(crate::ids::REQUEST_ID_HEADER));
        assert!(transport_skips("content-length"));
        assert!(!transport_skips("location"));
    }
}
