//! # Route Registry
//!
//! Registration turns `(method, path, handler, options)` into two things:
//!
//! 1. an endpoint in the mux, wrapping the handler with the request and response
//!    pipelines and the middleware stack in scope;
//! 2. an [`Operation`] in the spec store, seeded from the handler's response and
//!    request shapes and then shaped by the options.
//!
//! Registration goes through the sealed [`Registrar`] trait, implemented by the
//! [`Server`](crate::Server) and by [`Group`]s. Each carries a [`Scope`] (base path,
//! tags, parameters, middleware) that new routes and groups copy at creation time,
//! so changing a scope later never rewrites what was already registered.

use std::hash::{Hash, Hasher};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, PoisonError, RwLock};

use http::Method;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::context::Context;
use crate::error::{HttpError, RouteError};
use crate::middleware::Middleware;
use crate::openapi::{MediaType, OpenApiParam, Operation, RequestBody, ResponseEntry, SchemaRef};
use crate::pipeline::{RequestBody as RequestShape, ResponseBody as ResponseShape};
use crate::router::{path_params, Mux};
use crate::schema::{Schema, SchemaCache, ToSchema};
use crate::server::{HttpRequest, ResponseWriter};
use crate::typed::{DeclaredQuery, Endpoint, StdEndpoint, TypedEndpoint};

mod group;
mod option;
mod route;

pub use self::group::Group;
pub use self::option::{option, RouteOption};
pub use self::route::Route;
pub(crate) use self::option::RouteRuntime;

/// Identity of an operation in the document.
#[derive(Debug, Clone)]
pub(crate) struct OperationKey {
    pub path: String,
    pub method: Method,
}

impl PartialEq for OperationKey {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.method == other.method
    }
}

impl Eq for OperationKey {}

impl Hash for OperationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.method.as_str().hash(state);
    }
}

/// Operations and named schemas collected at registration.
#[derive(Debug, Default)]
pub(crate) struct SpecStore {
    pub operations: IndexMap<OperationKey, Operation>,
    pub components: IndexMap<String, Arc<Schema>>,
}

/// State shared by a server and all of its groups and route handles.
pub struct Core {
    pub(crate) config: Arc<ServerConfig>,
    pub(crate) mux: RwLock<Mux>,
    pub(crate) spec: RwLock<SpecStore>,
    pub(crate) schemas: SchemaCache,
    /// Set once the spec endpoints are registered.
    pub(crate) exported: AtomicBool,
    /// JSON served by the spec endpoint; replaced on every export.
    pub(crate) served_json: Arc<RwLock<Arc<String>>>,
}

impl Core {
    pub(crate) fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            mux: RwLock::new(Mux::default()),
            spec: RwLock::new(SpecStore::default()),
            schemas: SchemaCache::new(),
            exported: AtomicBool::new(false),
            served_json: Arc::new(RwLock::new(Arc::new(String::new()))),
        }
    }

    pub(crate) fn spec_read(&self) -> std::sync::RwLockReadGuard<'_, SpecStore> {
        self.spec.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn spec_write(&self) -> std::sync::RwLockWriteGuard<'_, SpecStore> {
        self.spec.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn mux_read(&self) -> std::sync::RwLockReadGuard<'_, Mux> {
        self.mux.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reference to `T`'s schema; named shapes become components.
    pub(crate) fn schema_ref<T: ToSchema + ?Sized + 'static>(&self) -> SchemaRef {
        let schema = self.schemas.get_or_insert::<T>();
        match T::schema_name() {
            Some(name) => {
                let mut spec = self.spec_write();
                let existing = spec.components.entry(name.to_string()).or_insert_with(|| Arc::clone(&schema));
                if **existing != *schema {
                    warn!(
                        component = %name,
                        rust_type = %std::any::type_name::<T>(),
                        "Component name already used by a different shape; keeping the first"
                    );
                }
                SchemaRef::component(name)
            }
            None => SchemaRef::Inline(schema),
        }
    }

    pub(crate) fn error_response(&self, description: &str) -> ResponseEntry {
        ResponseEntry::new(description).with_schema("application/json", self.schema_ref::<HttpError>())
    }

    fn media_types(&self) -> Vec<String> {
        let mut types = vec!["application/json".to_string()];
        if self.config.xml {
            types.push("application/xml".to_string());
        }
        types
    }

    fn seed_operation(&self, method: &Method, path: &str, scope: &Scope) -> Operation {
        let mut op = Operation {
            operation_id: format!("{method}_{path}"),
            tags: scope.tags.clone(),
            ..Operation::default()
        };
        for name in path_params(path) {
            op.upsert_param(OpenApiParam::path(name));
        }
        for param in scope.params.values() {
            op.upsert_param(param.clone());
        }
        op
    }

    fn typed_operation<Res, Req>(&self, method: &Method, path: &str, scope: &Scope) -> Operation
    where
        Res: ResponseShape,
        Req: RequestShape,
    {
        let mut op = self.seed_operation(method, path, scope);
        if self.config.auto_tags {
            if let Some(tag) = Res::tag_name() {
                if !op.tags.iter().any(|t| t == tag) {
                    op.tags.insert(0, tag.to_string());
                }
            }
        }

        let mut ok = ResponseEntry::new("OK");
        if !Res::is_unit() {
            let schema = self.schema_ref::<Res>();
            if Res::template_name().is_some() {
                ok = ok.with_schema("text/html", schema.clone());
            }
            for media in self.media_types() {
                ok = ok.with_schema(&media, schema.clone());
            }
        }
        op.responses.insert("200".to_string(), ok);

        if !Req::is_unit() {
            let schema = self.schema_ref::<Req>();
            let types = if self.config.request_content_types.is_empty() {
                self.media_types()
            } else {
                self.config.request_content_types.clone()
            };
            op.request_body = Some(RequestBody {
                required: true,
                content: types
                    .into_iter()
                    .map(|t| (t, MediaType { schema: schema.clone() }))
                    .collect(),
            });
        }
        op
    }

    /// Apply server-wide then route options. Returns the runtime state for the route.
    fn apply_options(&self, op: &mut Operation, scope: &Scope, options: &[RouteOption]) -> RouteRuntime {
        let mut runtime = RouteRuntime {
            accepted: self.config.request_content_types.clone(),
            middlewares: scope.middlewares.clone(),
        };
        for option in self.config.route_options.iter().chain(options) {
            if let RouteOption::AddError { status, description } = option {
                op.responses
                    .insert(status.to_string(), self.error_response(description));
            }
            option.apply(op, &mut runtime);
        }
        runtime
    }

    fn install(
        &self,
        key: &OperationKey,
        operation: Operation,
        endpoint: Arc<dyn Endpoint>,
        middlewares: Vec<Arc<dyn Middleware>>,
    ) -> Result<(), RouteError> {
        self.mux
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.method.clone(), &key.path, endpoint, middlewares)?;
        debug!(
            method = %key.method,
            path = %key.path,
            operation_id = %operation.operation_id,
            hidden = operation.hidden,
            "Operation recorded"
        );
        self.spec_write().operations.insert(key.clone(), operation);
        Ok(())
    }

    pub(crate) fn update_operation<F: FnOnce(&mut Operation)>(&self, key: &OperationKey, f: F) {
        if let Some(op) = self.spec_write().operations.get_mut(key) {
            f(op);
        }
    }

    pub(crate) fn operation(&self, key: &OperationKey) -> Option<Operation> {
        self.spec_read().operations.get(key).cloned()
    }
}

/// Inherited registration context: base path, tags, parameters and middleware.
#[derive(Clone, Default)]
pub struct Scope {
    pub(crate) base_path: String,
    pub(crate) tags: Vec<String>,
    pub(crate) params: IndexMap<String, OpenApiParam>,
    pub(crate) middlewares: Vec<Arc<dyn Middleware>>,
}

impl Scope {
    pub(crate) fn root(base_path: &str) -> Self {
        Self {
            base_path: base_path.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Child scope for a group mounted at `path`.
    fn child(&self, path: &str, auto_tag: bool) -> Self {
        let mut child = self.clone();
        child.base_path = join_path(&self.base_path, path)
            .trim_end_matches('/')
            .to_string();
        if auto_tag {
            if let Some(tag) = group_tag(path) {
                if !child.tags.contains(&tag) {
                    child.tags.push(tag);
                }
            }
        }
        child
    }
}

fn join_path(base: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Last literal segment of a group path (`/api/v1/{org}/recipes` -> `recipes`).
fn group_tag(path: &str) -> Option<String> {
    path.split('/')
        .rev()
        .find(|s| !s.is_empty() && !s.starts_with('{'))
        .map(str::to_string)
}

mod sealed {
    use std::sync::Arc;

    pub trait Sealed {
        fn core(&self) -> &Arc<super::Core>;
        fn scope(&self) -> &super::Scope;
        fn scope_mut(&mut self) -> &mut super::Scope;
    }
}

pub(crate) use self::sealed::Sealed;

/// Route registration, shared by the server and its groups.
pub trait Registrar: Sealed {
    /// Register a typed handler.
    ///
    /// # Panics
    ///
    /// Panics when `method` and `path` are already registered or `path` is malformed.
    /// Registration conflicts are configuration bugs; use [`try_register`](Self::try_register)
    /// to get them as a `Result` instead.
    #[allow(clippy::panic)]
    fn register<Res, Req, F>(&self, method: Method, path: &str, handler: F, options: Vec<RouteOption>) -> Route<Res, Req>
    where
        Res: ResponseShape,
        Req: RequestShape,
        F: Fn(&mut Context<'_, Req>) -> anyhow::Result<Res> + Send + Sync + 'static,
    {
        match self.try_register(method, path, handler, options) {
            Ok(route) => route,
            Err(e) => panic!("{e}"),
        }
    }

    fn try_register<Res, Req, F>(
        &self,
        method: Method,
        path: &str,
        handler: F,
        options: Vec<RouteOption>,
    ) -> Result<Route<Res, Req>, RouteError>
    where
        Res: ResponseShape,
        Req: RequestShape,
        F: Fn(&mut Context<'_, Req>) -> anyhow::Result<Res> + Send + Sync + 'static,
    {
        let core = self.core();
        let scope = self.scope();
        let key = OperationKey {
            path: join_path(&scope.base_path, path),
            method,
        };

        let mut operation = core.typed_operation::<Res, Req>(&key.method, &key.path, scope);
        let runtime = core.apply_options(&mut operation, scope, &options);
        let declared: DeclaredQuery = Arc::new(RwLock::new(operation.query_names()));
        let endpoint = TypedEndpoint::new(
            handler,
            core.schemas.get_or_insert::<Req>(),
            runtime.accepted,
            Arc::clone(&declared),
        );
        core.install(&key, operation, Arc::new(endpoint), runtime.middlewares)?;
        Ok(Route::new(Arc::clone(core), key, declared))
    }

    fn get<Res, F>(&self, path: &str, handler: F) -> Route<Res, ()>
    where
        Res: ResponseShape,
        F: Fn(&mut Context<'_, ()>) -> anyhow::Result<Res> + Send + Sync + 'static,
    {
        self.register(Method::GET, path, handler, Vec::new())
    }

    fn post<Res, Req, F>(&self, path: &str, handler: F) -> Route<Res, Req>
    where
        Res: ResponseShape,
        Req: RequestShape,
        F: Fn(&mut Context<'_, Req>) -> anyhow::Result<Res> + Send + Sync + 'static,
    {
        self.register(Method::POST, path, handler, Vec::new())
    }

    fn put<Res, Req, F>(&self, path: &str, handler: F) -> Route<Res, Req>
    where
        Res: ResponseShape,
        Req: RequestShape,
        F: Fn(&mut Context<'_, Req>) -> anyhow::Result<Res> + Send + Sync + 'static,
    {
        self.register(Method::PUT, path, handler, Vec::new())
    }

    fn patch<Res, Req, F>(&self, path: &str, handler: F) -> Route<Res, Req>
    where
        Res: ResponseShape,
        Req: RequestShape,
        F: Fn(&mut Context<'_, Req>) -> anyhow::Result<Res> + Send + Sync + 'static,
    {
        self.register(Method::PATCH, path, handler, Vec::new())
    }

    fn delete<Res, F>(&self, path: &str, handler: F) -> Route<Res, ()>
    where
        Res: ResponseShape,
        F: Fn(&mut Context<'_, ()>) -> anyhow::Result<Res> + Send + Sync + 'static,
    {
        self.register(Method::DELETE, path, handler, Vec::new())
    }

    /// Register an untyped handler working on the raw request and writer. It skips
    /// both pipelines but still runs inside the middleware stack.
    ///
    /// # Panics
    ///
    /// Same conditions as [`register`](Self::register).
    #[allow(clippy::panic)]
    fn register_std<F>(&self, method: Method, path: &str, handler: F, options: Vec<RouteOption>) -> Route<(), ()>
    where
        F: Fn(&HttpRequest, &mut ResponseWriter) + Send + Sync + 'static,
    {
        let core = self.core();
        let scope = self.scope();
        let key = OperationKey {
            path: join_path(&scope.base_path, path),
            method,
        };
        let mut operation = core.seed_operation(&key.method, &key.path, scope);
        operation
            .responses
            .insert("200".to_string(), ResponseEntry::new("OK"));
        let runtime = core.apply_options(&mut operation, scope, &options);
        let declared: DeclaredQuery = Arc::new(RwLock::new(operation.query_names()));
        if let Err(e) = core.install(&key, operation, Arc::new(StdEndpoint::new(handler)), runtime.middlewares) {
            panic!("{e}");
        }
        Route::new(Arc::clone(core), key, declared)
    }

    /// Derive a group mounted at `path`. The group copies this scope now; later
    /// changes here do not reach it.
    fn group(&self, path: &str) -> Group {
        let scope = self
            .scope()
            .child(path, self.core().config.auto_group_tags);
        debug!(base_path = %scope.base_path, tags = ?scope.tags, "Group created");
        Group::new(Arc::clone(self.core()), scope)
    }

    /// Add middleware to this scope. Routes registered afterwards run it after every
    /// middleware added before it.
    fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self
    where
        Self: Sized,
    {
        self.scope_mut().middlewares.push(Arc::new(middleware));
        self
    }

    fn tags(&mut self, tags: &[&str]) -> &mut Self
    where
        Self: Sized,
    {
        self.scope_mut().tags = tags.iter().map(|t| (*t).to_string()).collect();
        self
    }

    fn add_tags(&mut self, tags: &[&str]) -> &mut Self
    where
        Self: Sized,
    {
        let scope = self.scope_mut();
        for tag in tags {
            if !scope.tags.iter().any(|t| t == tag) {
                scope.tags.push((*tag).to_string());
            }
        }
        self
    }

    fn remove_tags(&mut self, tags: &[&str]) -> &mut Self
    where
        Self: Sized,
    {
        self.scope_mut().tags.retain(|t| !tags.contains(&t.as_str()));
        self
    }

    /// Declare a parameter on every route registered afterwards in this scope.
    /// A later parameter with the same name replaces the earlier one.
    fn param(&mut self, param: OpenApiParam) -> &mut Self
    where
        Self: Sized,
    {
        self.scope_mut().params.insert(param.name.clone(), param);
        self
    }

    fn header(&mut self, name: &str, description: &str) -> &mut Self
    where
        Self: Sized,
    {
        self.param(OpenApiParam::header(name, description))
    }

    fn cookie(&mut self, name: &str, description: &str) -> &mut Self
    where
        Self: Sized,
    {
        self.param(OpenApiParam::cookie(name, description))
    }

    fn query_param(&mut self, name: &str, description: &str) -> &mut Self
    where
        Self: Sized,
    {
        self.param(OpenApiParam::query(name, description))
    }

    /// Path prefix of routes registered here.
    fn base_path(&self) -> &str {
        &self.scope().base_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_tag_skips_placeholders() {
        assert_eq!(group_tag("/api/{org}/recipes"), Some("recipes".to_string()));
        assert_eq!(group_tag("/users/{id}"), Some("users".to_string()));
        assert_eq!(group_tag("/"), None);
    }

    #[test]
    fn test_child_scope_snapshot() {
        let mut parent = Scope::root("/api/");
        parent.tags.push("root".to_string());
        let child = parent.child("/items", true);
        parent.tags.clear();
        assert_eq!(child.base_path, "/api/items");
        assert_eq!(child.tags, vec!["root", "items"]);
        assert_eq!(parent.child("items", false).base_path, "/api/items");
    }
}
