use std::marker::PhantomData;
use std::sync::{Arc, PoisonError};

use http::Method;

use super::{Core, OperationKey};
use crate::openapi::{OpenApiParam, Operation, ParamKind};
use crate::typed::DeclaredQuery;

/// Handle to a registered route, typed by its response and request shapes.
///
/// Path and method are fixed. The fluent methods edit the route's operation in the
/// document until it is exported; serving behaviour (middleware, accepted content
/// types) is set through [`RouteOption`](super::RouteOption)s at registration.
pub struct Route<Res, Req> {
    core: Arc<Core>,
    key: OperationKey,
    declared_query: DeclaredQuery,
    _shapes: PhantomData<fn(Req) -> Res>,
}

impl<Res, Req> Route<Res, Req> {
    pub(crate) fn new(core: Arc<Core>, key: OperationKey, declared_query: DeclaredQuery) -> Self {
        Self {
            core,
            key,
            declared_query,
            _shapes: PhantomData,
        }
    }

    fn edit<F: FnOnce(&mut Operation)>(self, f: F) -> Self {
        self.core.update_operation(&self.key, f);
        self
    }

    /// Full path, base paths included.
    pub fn path(&self) -> &str {
        &self.key.path
    }

    pub fn method(&self) -> &Method {
        &self.key.method
    }

    /// Snapshot of the route's operation.
    pub fn operation(&self) -> Option<Operation> {
        self.core.operation(&self.key)
    }

    pub fn summary(self, summary: &str) -> Self {
        self.edit(|op| op.summary = summary.to_string())
    }

    pub fn description(self, description: &str) -> Self {
        self.edit(|op| op.description = description.to_string())
    }

    pub fn operation_id(self, id: &str) -> Self {
        self.edit(|op| op.operation_id = id.to_string())
    }

    /// Replace the tags. By default a route is tagged with its response shape name.
    pub fn tags(self, tags: &[&str]) -> Self {
        self.edit(|op| op.tags = tags.iter().map(|t| (*t).to_string()).collect())
    }

    pub fn add_tags(self, tags: &[&str]) -> Self {
        self.edit(|op| op.add_tags(tags.iter().copied()))
    }

    pub fn remove_tags(self, tags: &[&str]) -> Self {
        self.edit(|op| op.remove_tags(tags))
    }

    pub fn deprecated(self) -> Self {
        self.edit(|op| op.deprecated = true)
    }

    /// Leave the route out of the document. It is still served.
    pub fn hide(self) -> Self {
        self.edit(|op| op.hidden = true)
    }

    pub fn param(self, param: OpenApiParam) -> Self {
        if param.kind == ParamKind::Query {
            let mut declared = self
                .declared_query
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if !declared.contains(&param.name) {
                declared.push(param.name.clone());
            }
        }
        self.edit(|op| op.upsert_param(param))
    }

    pub fn header(self, name: &str, description: &str) -> Self {
        self.param(OpenApiParam::header(name, description))
    }

    pub fn cookie(self, name: &str, description: &str) -> Self {
        self.param(OpenApiParam::cookie(name, description))
    }

    pub fn query_param(self, name: &str, description: &str) -> Self {
        self.param(OpenApiParam::query(name, description))
    }

    /// Document an error response using the unified error schema.
    pub fn add_error(self, status: u16, description: &str) -> Self {
        let response = self.core.error_response(description);
        self.edit(|op| {
            op.responses.insert(status.to_string(), response);
        })
    }
}

impl<Res, Req> Clone for Route<Res, Req> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.core), self.key.clone(), Arc::clone(&self.declared_query))
    }
}

impl<Res, Req> std::fmt::Debug for Route<Res, Req> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.key.method)
            .field("path", &self.key.path)
            .finish()
    }
}
