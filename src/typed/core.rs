use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::ServerConfig;
use crate::context::Context;
use crate::pipeline::request::read_body;
use crate::pipeline::response::{send_error, send_success};
use crate::pipeline::{RequestBody, ResponseBody};
use crate::schema::Schema;
use crate::server::{HttpRequest, ResponseWriter};

/// Query parameter names declared on a route, shared with its [`Route`](crate::Route)
/// handle so parameters added after registration are seen at request time.
pub(crate) type DeclaredQuery = Arc<RwLock<Vec<String>>>;

/// Type-erased route adapter stored in the mux.
pub trait Endpoint: Send + Sync {
    fn call(&self, req: &mut HttpRequest, writer: &mut ResponseWriter, cfg: &ServerConfig);
}

/// Adapter wrapping a typed handler with the request and response pipelines.
pub(crate) struct TypedEndpoint<B, R, F> {
    handler: F,
    schema: Arc<Schema>,
    accepted: Vec<String>,
    declared_query: DeclaredQuery,
    _shapes: PhantomData<fn(B) -> R>,
}

impl<B, R, F> TypedEndpoint<B, R, F>
where
    B: RequestBody,
    R: ResponseBody,
    F: Fn(&mut Context<'_, B>) -> anyhow::Result<R> + Send + Sync + 'static,
{
    pub fn new(handler: F, schema: Arc<Schema>, accepted: Vec<String>, declared_query: DeclaredQuery) -> Self {
        Self {
            handler,
            schema,
            accepted,
            declared_query,
            _shapes: PhantomData,
        }
    }
}

impl<B, R, F> Endpoint for TypedEndpoint<B, R, F>
where
    B: RequestBody,
    R: ResponseBody,
    F: Fn(&mut Context<'_, B>) -> anyhow::Result<R> + Send + Sync + 'static,
{
    fn call(&self, req: &mut HttpRequest, writer: &mut ResponseWriter, cfg: &ServerConfig) {
        let req: &HttpRequest = req;
        let body = match read_body::<B>(req, &self.schema, &self.accepted, cfg) {
            Ok(body) => body,
            Err(e) => {
                send_error(req, writer, (cfg.error_handler)(e), cfg);
                return;
            }
        };

        let declared = self
            .declared_query
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut ctx = Context::new(req, writer, body, &declared);
        let result = (self.handler)(&mut ctx);
        let status = ctx.status().unwrap_or(200);
        drop(ctx);

        match result {
            Ok(value) => send_success(req, writer, status, &value, cfg),
            Err(e) => send_error(req, writer, (cfg.error_handler)(e), cfg),
        }
    }
}

/// Adapter for handlers that work on the raw request and writer.
pub(crate) struct StdEndpoint<F> {
    handler: F,
}

impl<F> StdEndpoint<F>
where
    F: Fn(&HttpRequest, &mut ResponseWriter) + Send + Sync + 'static,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> Endpoint for StdEndpoint<F>
where
    F: Fn(&HttpRequest, &mut ResponseWriter) + Send + Sync + 'static,
{
    fn call(&self, req: &mut HttpRequest, writer: &mut ResponseWriter, _cfg: &ServerConfig) {
        (self.handler)(req, writer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;
    use crate::schema::ToSchema;
    use http::Method;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, ToSchema)]
    struct Greeting {
        #[schema(required)]
        name: String,
    }

    fn endpoint<F>(handler: F) -> TypedEndpoint<Greeting, String, F>
    where
        F: Fn(&mut Context<'_, Greeting>) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        TypedEndpoint::new(handler, Arc::new(Greeting::schema()), Vec::new(), DeclaredQuery::default())
    }

    fn post(body: &str) -> HttpRequest {
        HttpRequest::new(Method::POST, "/hello")
            .with_header("content-type", "application/json")
            .with_body(body)
    }

    #[test]
    fn test_handler_sees_validated_body_and_sets_status() {
        let endpoint = endpoint(|ctx| {
            ctx.set_status(201);
            Ok(format!("hello {}", ctx.body().name))
        });
        let mut req = post(r#"{"name":"ada"}"#);
        let mut writer = ResponseWriter::new();
        endpoint.call(&mut req, &mut writer, &ServerConfig::default());
        let response = writer.into_response();
        assert_eq!(response.status, 201);
        assert_eq!(response.body_str(), "hello ada");
    }

    #[test]
    fn test_stage_failure_skips_handler() {
        let endpoint = endpoint(|_| panic!("handler must not run"));
        let mut req = post(r#"{"name":""}"#);
        let mut writer = ResponseWriter::new();
        endpoint.call(&mut req, &mut writer, &ServerConfig::default());
        assert_eq!(writer.status(), 400);
    }

    #[test]
    fn test_handler_error_keeps_its_status() {
        let endpoint = endpoint(|_| Err(HttpError::forbidden("no").into()));
        let mut req = post(r#"{"name":"ada"}"#);
        let mut writer = ResponseWriter::new();
        endpoint.call(&mut req, &mut writer, &ServerConfig::default());
        let response = writer.into_response();
        assert_eq!(response.status, 403);
        assert_eq!(response.body_json().unwrap()["error"], "no");
    }
}
