#![allow(dead_code)]

use ember::{HttpRequest, HttpResponse, Server};
use http::Method;
use serde_json::Value;

pub fn get(server: &Server, uri: &str) -> HttpResponse {
    server.handle(HttpRequest::new(Method::GET, uri))
}

pub fn send_json(server: &Server, method: Method, uri: &str, body: &str) -> HttpResponse {
    server.handle(
        HttpRequest::new(method, uri)
            .with_header("content-type", "application/json")
            .with_body(body),
    )
}

pub fn post_json(server: &Server, uri: &str, body: &str) -> HttpResponse {
    send_json(server, Method::POST, uri, body)
}

/// Parse a response body as JSON, panicking with the raw body on failure.
pub fn json(response: &HttpResponse) -> Value {
    response
        .body_json()
        .unwrap_or_else(|e| panic!("body is not JSON ({e}): {}", response.body_str()))
}

/// Operation JSON for `method` on `path` in the server's current document.
pub fn operation(server: &Server, method: &str, path: &str) -> Value {
    let doc = serde_json::to_value(server.openapi_spec()).unwrap();
    doc["paths"][path][method.to_ascii_lowercase()].clone()
}

pub fn tags(operation: &Value) -> Vec<String> {
    operation["tags"]
        .as_array()
        .map(|tags| tags.iter().filter_map(|t| t.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}
