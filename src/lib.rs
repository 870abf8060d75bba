//! # Ember
//!
//! Typed route registration for the `may` coroutine runtime, with request and
//! response pipelines and an OpenAPI 3.1 document generated from handler types.
//!
//! ## Overview
//!
//! A handler is a function from a typed [`Context`] to `anyhow::Result<Res>`. Its
//! request body shape `Req` and response shape `Res` drive everything else:
//!
//! - the **request pipeline** checks content type and size, decodes JSON (or XML),
//!   rejects unknown fields, runs [`InTransform`] and validates `#[schema]`
//!   constraints before the handler sees the body;
//! - the **response pipeline** negotiates JSON or XML from `Accept`, renders
//!   templates for template-bound shapes, and maps every failure to one
//!   [`HttpError`] shape;
//! - the **document** gets an operation per route, with parameters, body and
//!   response schemas, tags and error responses, exported as JSON and browsable
//!   through Swagger UI.
//!
//! ```
//! use ember::{Context, Registrar, ServerBuilder, ToSchema};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, ToSchema)]
//! struct Recipe {
//!     #[schema(required, min_length = 1)]
//!     name: String,
//! }
//!
//! let server = ServerBuilder::new().base_path("/api").build();
//! let recipes = server.group("/recipes");
//! recipes.post("/", |ctx: &mut Context<'_, Recipe>| {
//!     Ok(Recipe { name: ctx.body().name.to_uppercase() })
//! });
//!
//! let doc = server.openapi_spec();
//! assert!(doc.paths.contains_key("/api/recipes/"));
//! ```
//!
//! ## Modules
//!
//! - **[`config`]** - `ServerBuilder` and server-wide settings
//! - **[`schema`]** - `ToSchema` shapes and the derive
//! - **[`openapi`]** - document model and export
//! - **[`middleware`]** - before/after hooks around routes
//! - **[`security`]** - optional login/logout/refresh wiring
//! - **[`server`]** - request/response types and the `may_minihttp` adapter
//! - **[`telemetry`]** - `tracing` subscriber setup
//!
//! ## Runtime
//!
//! [`Server::run`] exports the document and serves on the configured address, one
//! coroutine per connection. [`Server::handle`] serves a single request in-process,
//! which is how the tests drive it.

extern crate self as ember;

mod app;
pub mod config;
mod context;
pub mod docs;
pub mod error;
pub mod ids;
pub mod middleware;
pub mod openapi;
mod pipeline;
mod registry;
pub(crate) mod router;
pub mod runtime_config;
pub mod schema;
pub mod security;
pub mod server;
pub mod telemetry;
pub mod templates;
pub(crate) mod typed;
pub mod validator;

pub use app::Server;
pub use config::{OpenApiConfig, ServerBuilder, ServerConfig};
pub use context::Context;
pub use error::{FieldError, HttpError, PipelineError, RouteError};
pub use middleware::Middleware;
pub use openapi::OpenApiParam;
pub use pipeline::{negotiate, Format, InTransform, RequestBody, ResponseBody};
pub use registry::{option, Group, Registrar, Route, RouteOption};
pub use schema::{Schema, ToSchema};
pub use server::{HttpRequest, HttpResponse, ResponseWriter};
pub use typed::Endpoint;
pub use validator::Validator;
