//! # Server Configuration
//!
//! [`ServerConfig`] is the read-only, server-level state shared by every request:
//! body policy, serializers, error mapping, spec export settings, the template set
//! and the validator. It is assembled by [`ServerBuilder`] and frozen once the
//! [`Server`](crate::Server) is built.
//!
//! ```
//! use ember::ServerBuilder;
//!
//! let server = ServerBuilder::new()
//!     .addr("localhost:8088")
//!     .max_body_size(1024 * 1024)
//!     .with_xml()
//!     .build();
//! assert_eq!(server.config().addr, "localhost:8088");
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::app::Server;
use crate::error::{HttpError, PipelineError};
use crate::openapi::{Info, OpenApiParam};
use crate::registry::RouteOption;
use crate::security::SecurityProvider;
use crate::server::{HttpRequest, ResponseWriter};
use crate::templates::TemplateRenderer;
use crate::validator::Validator;

/// Custom success serializer: replaces the negotiated JSON/XML output.
pub type SerializeFn =
    Arc<dyn Fn(&HttpRequest, &mut ResponseWriter, u16, &Value) -> anyhow::Result<()> + Send + Sync>;

/// Custom error serializer.
pub type ErrorSerializeFn = Arc<dyn Fn(&HttpRequest, &mut ResponseWriter, &HttpError) + Send + Sync>;

/// Maps any handler or pipeline error to the unified error shape.
pub type ErrorHandler = Arc<dyn Fn(anyhow::Error) -> HttpError + Send + Sync>;

/// Renders the documentation page given the spec JSON URL.
pub type UiHandler = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// The default error handler.
///
/// [`HttpError`]s keep their status, [`PipelineError`]s map to their stage status and
/// everything else becomes a 500 carrying the error's message.
pub fn default_error_handler(err: anyhow::Error) -> HttpError {
    let err = match err.downcast::<HttpError>() {
        Ok(http) => return http,
        Err(err) => err,
    };
    match err.downcast::<PipelineError>() {
        Ok(stage) => stage.into(),
        Err(err) => HttpError::internal(err.to_string()),
    }
}

/// Response added to every documented operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalResponse {
    pub status: u16,
    pub description: String,
}

impl GlobalResponse {
    pub fn new(status: u16, description: impl Into<String>) -> Self {
        Self {
            status,
            description: description.into(),
        }
    }
}

fn default_global_responses() -> Vec<GlobalResponse> {
    vec![
        GlobalResponse::new(400, "Bad Request _(validation or deserialization error)_"),
        GlobalResponse::new(500, "Internal Server Error _(panics)_"),
    ]
}

/// Spec serving and persistence settings.
#[derive(Clone)]
pub struct OpenApiConfig {
    /// Serve neither the JSON nor the UI.
    pub disable_swagger: bool,
    pub disable_swagger_ui: bool,
    pub disable_local_save: bool,
    pub swagger_url: String,
    pub json_url: String,
    pub json_file_path: String,
    pub pretty_json: bool,
    pub ui_handler: Option<UiHandler>,
}

impl Default for OpenApiConfig {
    fn default() -> Self {
        Self {
            disable_swagger: false,
            disable_swagger_ui: false,
            disable_local_save: false,
            swagger_url: "/swagger".to_string(),
            json_url: "/swagger/openapi.json".to_string(),
            json_file_path: "doc/openapi.json".to_string(),
            pretty_json: false,
            ui_handler: None,
        }
    }
}

impl OpenApiConfig {
    /// Overlay `other`; empty strings keep the current values.
    fn merge(&mut self, other: OpenApiConfig) {
        if !other.swagger_url.is_empty() {
            self.swagger_url = other.swagger_url;
        }
        if !other.json_url.is_empty() {
            self.json_url = other.json_url;
        }
        if !other.json_file_path.is_empty() {
            self.json_file_path = other.json_file_path;
        }
        if other.ui_handler.is_some() {
            self.ui_handler = other.ui_handler;
        }
        self.disable_swagger = other.disable_swagger;
        self.disable_swagger_ui = other.disable_swagger_ui;
        self.disable_local_save = other.disable_local_save;
        self.pretty_json = other.pretty_json;
    }
}

impl fmt::Debug for OpenApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenApiConfig")
            .field("disable_swagger", &self.disable_swagger)
            .field("disable_swagger_ui", &self.disable_swagger_ui)
            .field("disable_local_save", &self.disable_local_save)
            .field("swagger_url", &self.swagger_url)
            .field("json_url", &self.json_url)
            .field("json_file_path", &self.json_file_path)
            .field("pretty_json", &self.pretty_json)
            .field("ui_handler", &self.ui_handler.is_some())
            .finish()
    }
}

/// Server-level settings, read-only once the server is built.
#[derive(Clone)]
pub struct ServerConfig {
    pub addr: String,
    /// Prefix for every registered route.
    pub base_path: String,
    pub max_body_size: Option<usize>,
    /// Reject unknown JSON fields instead of dropping them.
    pub strict_fields: bool,
    /// Accept XML bodies and negotiate XML responses.
    pub xml: bool,
    pub serializer: Option<SerializeFn>,
    pub error_serializer: Option<ErrorSerializeFn>,
    pub error_handler: ErrorHandler,
    /// Default accepted request content types; empty accepts anything.
    pub request_content_types: Vec<String>,
    pub global_responses: Vec<GlobalResponse>,
    pub global_params: Vec<OpenApiParam>,
    /// Applied to every route before its own options.
    pub route_options: Vec<RouteOption>,
    /// Tag routes with their response shape name.
    pub auto_tags: bool,
    /// Tag group routes with the group's last path segment.
    pub auto_group_tags: bool,
    pub info: Info,
    pub openapi: OpenApiConfig,
    pub templates: Option<Arc<dyn TemplateRenderer>>,
    pub validator: Validator,
    pub security: Option<Arc<dyn SecurityProvider>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "localhost:9999".to_string(),
            base_path: String::new(),
            max_body_size: None,
            strict_fields: true,
            xml: false,
            serializer: None,
            error_serializer: None,
            error_handler: Arc::new(default_error_handler),
            request_content_types: Vec::new(),
            global_responses: default_global_responses(),
            global_params: Vec::new(),
            route_options: Vec::new(),
            auto_tags: true,
            auto_group_tags: true,
            info: Info::default(),
            openapi: OpenApiConfig::default(),
            templates: None,
            validator: Validator::new(),
            security: None,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("addr", &self.addr)
            .field("base_path", &self.base_path)
            .field("max_body_size", &self.max_body_size)
            .field("strict_fields", &self.strict_fields)
            .field("xml", &self.xml)
            .field("request_content_types", &self.request_content_types)
            .field("global_responses", &self.global_responses)
            .field("auto_tags", &self.auto_tags)
            .field("auto_group_tags", &self.auto_group_tags)
            .field("openapi", &self.openapi)
            .field("templates", &self.templates.is_some())
            .field("auth", &self.security.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Server`].
#[derive(Default)]
pub struct ServerBuilder {
    config: ServerConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.config.addr = addr.into();
        self
    }

    /// Shorthand for `localhost:<port>`.
    pub fn port(self, port: u16) -> Self {
        self.addr(format!("localhost:{port}"))
    }

    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.config.base_path = base_path.into().trim_end_matches('/').to_string();
        self
    }

    pub fn max_body_size(mut self, limit: usize) -> Self {
        self.config.max_body_size = Some(limit);
        self
    }

    /// Unknown JSON fields are rejected by default; `false` drops them silently.
    pub fn strict_fields(mut self, strict: bool) -> Self {
        self.config.strict_fields = strict;
        self
    }

    pub fn with_xml(mut self) -> Self {
        self.config.xml = true;
        self
    }

    pub fn serializer<F>(mut self, serializer: F) -> Self
    where
        F: Fn(&HttpRequest, &mut ResponseWriter, u16, &Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.config.serializer = Some(Arc::new(serializer));
        self
    }

    pub fn error_serializer<F>(mut self, serializer: F) -> Self
    where
        F: Fn(&HttpRequest, &mut ResponseWriter, &HttpError) + Send + Sync + 'static,
    {
        self.config.error_serializer = Some(Arc::new(serializer));
        self
    }

    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(anyhow::Error) -> HttpError + Send + Sync + 'static,
    {
        self.config.error_handler = Arc::new(handler);
        self
    }

    pub fn request_content_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.request_content_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Add (or replace, by status) a response documented on every operation.
    pub fn global_response(mut self, status: u16, description: impl Into<String>) -> Self {
        let response = GlobalResponse::new(status, description);
        self.config.global_responses.retain(|r| r.status != status);
        self.config.global_responses.push(response);
        self
    }

    pub fn global_param(mut self, param: OpenApiParam) -> Self {
        self.config.global_params.push(param);
        self
    }

    pub fn route_option(mut self, option: RouteOption) -> Self {
        self.config.route_options.push(option);
        self
    }

    pub fn disable_auto_tags(mut self) -> Self {
        self.config.auto_tags = false;
        self
    }

    pub fn disable_auto_group_tags(mut self) -> Self {
        self.config.auto_group_tags = false;
        self
    }

    pub fn info(mut self, title: impl Into<String>, version: impl Into<String>) -> Self {
        self.config.info.title = title.into();
        self.config.info.version = version.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.config.info.description = description.into();
        self
    }

    pub fn openapi_config(mut self, openapi: OpenApiConfig) -> Self {
        self.config.openapi.merge(openapi);
        self
    }

    pub fn templates<T: TemplateRenderer + 'static>(mut self, templates: T) -> Self {
        self.config.templates = Some(Arc::new(templates));
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.config.validator = validator;
        self
    }

    /// Register the auth routes and the token middleware backed by `provider`.
    pub fn with_auto_auth<P: SecurityProvider + 'static>(mut self, provider: P) -> Self {
        self.config.security = Some(Arc::new(provider));
        self
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn build(self) -> Server {
        Server::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.addr, "localhost:9999");
        assert!(config.strict_fields);
        assert!(!config.xml);
        let statuses: Vec<u16> = config.global_responses.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![400, 500]);
        assert_eq!(config.openapi.json_url, "/swagger/openapi.json");
    }

    #[test]
    fn test_empty_openapi_strings_keep_defaults() {
        let builder = ServerBuilder::new().openapi_config(OpenApiConfig {
            swagger_url: String::new(),
            json_url: "/api/spec.json".to_string(),
            json_file_path: String::new(),
            pretty_json: true,
            ..OpenApiConfig::default()
        });
        let openapi = &builder.config().openapi;
        assert_eq!(openapi.swagger_url, "/swagger");
        assert_eq!(openapi.json_url, "/api/spec.json");
        assert_eq!(openapi.json_file_path, "doc/openapi.json");
        assert!(openapi.pretty_json);
    }

    #[test]
    fn test_global_response_replaces_by_status() {
        let builder = ServerBuilder::new().global_response(400, "Nope").global_response(409, "Conflict");
        let responses = &builder.config().global_responses;
        assert_eq!(responses.len(), 3);
        assert!(responses.contains(&GlobalResponse::new(400, "Nope")));
    }

    #[test]
    fn test_default_error_handler() {
        let err = default_error_handler(anyhow::Error::new(HttpError::conflict("taken")));
        assert_eq!(err.status, 409);

        let err = default_error_handler(anyhow::Error::new(PipelineError::BodyTooLarge { limit: 8 }));
        assert_eq!(err.status, 413);

        let err = default_error_handler(anyhow::anyhow!("boom"));
        assert_eq!((err.status, err.message.as_str()), (500, "boom"));
    }
}
