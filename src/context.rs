use std::str::FromStr;

use serde_json::Value;
use tracing::warn;

use crate::error::HttpError;
use crate::ids::RequestId;
use crate::security::Claims;
use crate::server::{HttpRequest, ResponseWriter};

/// What a typed handler sees: the validated body, parameter accessors and
/// status/header control over the response.
///
/// The response body itself is produced from the handler's return value; writing
/// through [`response`](Self::response) directly takes precedence over it.
pub struct Context<'a, B> {
    request: &'a HttpRequest,
    writer: &'a mut ResponseWriter,
    body: B,
    status: Option<u16>,
    declared_query: &'a [String],
}

impl<'a, B> Context<'a, B> {
    pub(crate) fn new(
        request: &'a HttpRequest,
        writer: &'a mut ResponseWriter,
        body: B,
        declared_query: &'a [String],
    ) -> Self {
        Self {
            request,
            writer,
            body,
            status: None,
            declared_query,
        }
    }

    /// The decoded, transformed and validated request body.
    pub fn body(&self) -> &B {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut B {
        &mut self.body
    }

    /// Move the body out, leaving `B::default()` behind.
    pub fn take_body(&mut self) -> B
    where
        B: Default,
    {
        std::mem::take(&mut self.body)
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.request.get_path_param(name)
    }

    /// Path parameter parsed as an integer; a malformed value is a 400.
    pub fn path_param_int(&self, name: &str) -> Result<i64, HttpError> {
        let raw = self
            .path_param(name)
            .ok_or_else(|| HttpError::bad_request(format!("missing path parameter {name}")))?;
        raw.parse()
            .map_err(|_| HttpError::bad_request(format!("path parameter {name} must be an integer, got {raw}")))
    }

    /// Query parameter value. Reading a parameter the route does not declare still
    /// works but is logged, since the document will not mention it.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        if !self.declared_query.iter().any(|d| d == name) {
            warn!(
                request_id = %self.request.request_id,
                path = %self.request.path,
                param = %name,
                "Query parameter read but not declared on the route"
            );
        }
        self.request.get_query_param(name)
    }

    pub fn query_param_int(&self, name: &str) -> Result<Option<i64>, HttpError> {
        self.parse_query(name, "an integer")
    }

    pub fn query_param_bool(&self, name: &str) -> Result<Option<bool>, HttpError> {
        self.parse_query(name, "a boolean")
    }

    fn parse_query<T: FromStr>(&self, name: &str, expected: &str) -> Result<Option<T>, HttpError> {
        self.query_param(name)
            .map(|raw| {
                raw.parse::<T>().map_err(|_| {
                    HttpError::bad_request(format!("query parameter {name} must be {expected}, got {raw}"))
                })
            })
            .transpose()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.get_header(name)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.request.get_cookie(name)
    }

    pub fn request(&self) -> &HttpRequest {
        self.request
    }

    pub fn request_id(&self) -> RequestId {
        self.request.request_id
    }

    /// Raw response channel.
    pub fn response(&mut self) -> &mut ResponseWriter {
        &mut *self.writer
    }

    /// Status for the success response (default 200).
    pub fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    pub(crate) fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.writer.set_header(name, value);
    }

    pub fn append_header(&mut self, name: &str, value: impl Into<String>) {
        self.writer.append_header(name, value);
    }

    /// Value stored in the request extensions by a middleware.
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.request.extensions.get::<T>()
    }

    /// Token claims attached by the auth middleware.
    pub fn claims(&self) -> Option<&Value> {
        self.extension::<Claims>().map(|c| &c.0)
    }
}
