//! The [`Server`]: owns the registry, serves requests and exports the document.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{error, info, info_span};

use crate::config::ServerConfig;
use crate::context::Context;
use crate::error::HttpError;
use crate::ids::REQUEST_ID_HEADER;
use crate::openapi::{self, OpenApiDoc};
use crate::pipeline::response::send_error;
use crate::pipeline::run_chain;
use crate::registry::{Core, Registrar, Scope, Sealed};
use crate::router::RouteLookup;
use crate::runtime_config::RuntimeConfig;
use crate::security::{LoginPayload, SecurityProvider, TokenToContext};
use crate::server::{AppService, HttpRequest, HttpResponse, HttpServer, ResponseWriter, ServerHandle};

/// Route registry, request dispatcher and document exporter in one.
///
/// Build one with [`ServerBuilder`](crate::ServerBuilder), register routes through
/// [`Registrar`], then either [`run`](Self::run) it or drive [`handle`](Self::handle)
/// directly.
///
/// ```
/// use ember::{Context, Registrar, ServerBuilder};
/// use http::Method;
///
/// let server = ServerBuilder::new().build();
/// server.get("/ping", |_ctx: &mut Context<'_, ()>| Ok("pong".to_string()));
///
/// let response = server.handle(ember::HttpRequest::new(Method::GET, "/ping"));
/// assert_eq!(response.status, 200);
/// assert_eq!(response.body_str(), "pong");
/// ```
pub struct Server {
    core: Arc<Core>,
    scope: Scope,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let scope = Scope::root(&config.base_path);
        let security = config.security.clone();
        let mut server = Self {
            core: Arc::new(Core::new(config)),
            scope,
        };
        if let Some(provider) = security {
            server.install_auth(provider);
        }
        server
    }

    /// Token middleware first in the root scope, then the three auth routes.
    fn install_auth(&mut self, provider: Arc<dyn SecurityProvider>) {
        self.scope
            .middlewares
            .insert(0, Arc::new(TokenToContext::new(Arc::clone(&provider))));

        let login = Arc::clone(&provider);
        self.post("/auth/login", move |ctx: &mut Context<'_, LoginPayload>| login.login(ctx))
            .tags(&["Auth"])
            .summary("Login");

        let logout = Arc::clone(&provider);
        self.register_std(
            http::Method::POST,
            "/auth/logout",
            move |req: &HttpRequest, res: &mut ResponseWriter| logout.logout(req, res),
            Vec::new(),
        )
        .tags(&["Auth"])
        .summary("Logout");

        let refresh = provider;
        self.register_std(
            http::Method::POST,
            "/auth/refresh",
            move |req: &HttpRequest, res: &mut ResponseWriter| refresh.refresh(req, res),
            Vec::new(),
        )
        .tags(&["Auth"])
        .summary("Refresh token");
    }

    pub fn config(&self) -> &ServerConfig {
        &self.core.config
    }

    /// Serve one request in-process.
    pub fn handle(&self, req: HttpRequest) -> HttpResponse {
        dispatch(&self.core, req)
    }

    /// The document as it would be exported now. Nothing is written or served.
    pub fn openapi_spec(&self) -> OpenApiDoc {
        openapi::assemble(&self.core)
    }

    /// [`openapi_spec`](Self::openapi_spec) as JSON, honoring `pretty_json`.
    pub fn spec_json(&self) -> anyhow::Result<String> {
        openapi::to_json(&self.openapi_spec(), self.core.config.openapi.pretty_json)
    }

    /// Assemble the document, save it and mount its endpoints as configured.
    /// The endpoints are mounted once; later calls re-save and refresh the served document.
    pub fn export_openapi(&self) -> anyhow::Result<OpenApiDoc> {
        openapi::export(&self.core)
    }

    /// Export the document and start listening on the configured address.
    pub fn start(&self) -> anyhow::Result<ServerHandle> {
        RuntimeConfig::from_env().apply();
        self.export_openapi()?;
        let addr = self.core.config.addr.as_str();
        let handle = HttpServer(AppService::new(Arc::clone(&self.core))).start(addr)?;
        info!(addr = %addr, routes = self.core.mux_read().len(), "Server listening");
        Ok(handle)
    }

    /// [`start`](Self::start), then block until the listener exits.
    pub fn run(&self) -> anyhow::Result<()> {
        let handle = self.start()?;
        handle
            .join()
            .map_err(|panic| anyhow::anyhow!("server thread panicked: {}", panic_message(panic.as_ref())))
    }
}

impl Sealed for Server {
    fn core(&self) -> &Arc<Core> {
        &self.core
    }

    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }
}

impl Registrar for Server {}

/// Route, run the middleware chain and endpoint, and turn a panic into a 500.
pub(crate) fn dispatch(core: &Core, mut req: HttpRequest) -> HttpResponse {
    let span = info_span!(
        "request",
        request_id = %req.request_id,
        method = %req.method,
        path = %req.path
    );
    let _entered = span.enter();
    let cfg: &ServerConfig = &core.config;
    let mut writer = ResponseWriter::new();

    let lookup = core.mux_read().lookup(&req.method, &req.path);
    match lookup {
        RouteLookup::Found(entry, params) => {
            req.path_params = params;
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                run_chain(&entry.middlewares, &mut req, &mut writer, |r, w| {
                    entry.endpoint.call(r, w, cfg);
                });
            }));
            if let Err(panic) = outcome {
                error!(
                    route = %entry.pattern,
                    panic_message = %panic_message(panic.as_ref()),
                    "Handler panicked"
                );
                send_error(&req, &mut writer, HttpError::internal("internal server error"), cfg);
            }
        }
        RouteLookup::MethodNotAllowed => {
            let err = HttpError::new(405, format!("method {} not allowed on {}", req.method, req.path));
            send_error(&req, &mut writer, err, cfg);
        }
        RouteLookup::NotFound => {
            let err = HttpError::not_found(format!("no route for {} {}", req.method, req.path));
            send_error(&req, &mut writer, err, cfg);
        }
    }

    writer.set_header(REQUEST_ID_HEADER, req.request_id.to_string());
    writer.into_response()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
