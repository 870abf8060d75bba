use std::fmt;
use std::sync::Arc;

use crate::middleware::Middleware;
use crate::openapi::{Operation, OpenApiParam, RequestBody};

/// Per-route configuration, applied in order at registration.
///
/// Documentation options only touch the route's [`Operation`]; `RequestContentType`
/// and `Middleware` also change how requests are served.
#[derive(Clone)]
pub enum RouteOption {
    /// Replace the tags.
    Tags(Vec<String>),
    AddTags(Vec<String>),
    RemoveTags(Vec<String>),
    Summary(String),
    Description(String),
    OperationId(String),
    Deprecated,
    /// Keep the route out of the document; it is still served.
    Hide,
    Param(OpenApiParam),
    /// Restrict the accepted request content types (415 otherwise).
    RequestContentType(Vec<String>),
    /// Document an extra error response.
    AddError { status: u16, description: String },
    /// Innermost middleware, closest to the handler.
    Middleware(Arc<dyn Middleware>),
}

impl fmt::Debug for RouteOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tags(t) => f.debug_tuple("Tags").field(t).finish(),
            Self::AddTags(t) => f.debug_tuple("AddTags").field(t).finish(),
            Self::RemoveTags(t) => f.debug_tuple("RemoveTags").field(t).finish(),
            Self::Summary(s) => f.debug_tuple("Summary").field(s).finish(),
            Self::Description(d) => f.debug_tuple("Description").field(d).finish(),
            Self::OperationId(id) => f.debug_tuple("OperationId").field(id).finish(),
            Self::Deprecated => f.write_str("Deprecated"),
            Self::Hide => f.write_str("Hide"),
            Self::Param(p) => f.debug_tuple("Param").field(&p.name).finish(),
            Self::RequestContentType(c) => f.debug_tuple("RequestContentType").field(c).finish(),
            Self::AddError { status, description } => f
                .debug_struct("AddError")
                .field("status", status)
                .field("description", description)
                .finish(),
            Self::Middleware(_) => f.write_str("Middleware(..)"),
        }
    }
}

/// Serving-side state a route's options can change.
pub(crate) struct RouteRuntime {
    pub accepted: Vec<String>,
    pub middlewares: Vec<Arc<dyn Middleware>>,
}

impl RouteOption {
    /// Apply to the operation and, for serving options, to the runtime state.
    /// `AddError` is resolved by the caller since it needs the schema registry.
    pub(crate) fn apply(&self, op: &mut Operation, runtime: &mut RouteRuntime) {
        match self {
            Self::Tags(tags) => op.tags = tags.clone(),
            Self::AddTags(tags) => op.add_tags(tags.iter().cloned()),
            Self::RemoveTags(tags) => op.remove_tags(tags.as_slice()),
            Self::Summary(summary) => op.summary = summary.clone(),
            Self::Description(description) => op.description = description.clone(),
            Self::OperationId(id) => op.operation_id = id.clone(),
            Self::Deprecated => op.deprecated = true,
            Self::Hide => op.hidden = true,
            Self::Param(param) => op.upsert_param(param.clone()),
            Self::RequestContentType(types) => {
                runtime.accepted = types.clone();
                if let Some(body) = op.request_body.as_mut() {
                    retarget_content(body, types);
                }
            }
            Self::AddError { .. } => {}
            Self::Middleware(middleware) => runtime.middlewares.push(Arc::clone(middleware)),
        }
    }
}

/// Re-key a request body's media types, keeping its schema.
fn retarget_content(body: &mut RequestBody, types: &[String]) {
    let Some(media) = body.content.values().next().cloned() else {
        return;
    };
    body.content = types
        .iter()
        .map(|t| (t.clone(), media.clone()))
        .collect();
}

/// Option constructors, for `register(.., vec![option::summary("..")])`.
pub mod option {
    use super::RouteOption;
    use crate::middleware::Middleware;
    use crate::openapi::OpenApiParam;
    use std::sync::Arc;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    pub fn tags(tags: &[&str]) -> RouteOption {
        RouteOption::Tags(strings(tags))
    }

    pub fn add_tags(tags: &[&str]) -> RouteOption {
        RouteOption::AddTags(strings(tags))
    }

    pub fn remove_tags(tags: &[&str]) -> RouteOption {
        RouteOption::RemoveTags(strings(tags))
    }

    pub fn summary(summary: &str) -> RouteOption {
        RouteOption::Summary(summary.to_string())
    }

    pub fn description(description: &str) -> RouteOption {
        RouteOption::Description(description.to_string())
    }

    pub fn operation_id(id: &str) -> RouteOption {
        RouteOption::OperationId(id.to_string())
    }

    pub fn deprecated() -> RouteOption {
        RouteOption::Deprecated
    }

    pub fn hide() -> RouteOption {
        RouteOption::Hide
    }

    pub fn param(param: OpenApiParam) -> RouteOption {
        RouteOption::Param(param)
    }

    pub fn header(name: &str, description: &str) -> RouteOption {
        RouteOption::Param(OpenApiParam::header(name, description))
    }

    pub fn cookie(name: &str, description: &str) -> RouteOption {
        RouteOption::Param(OpenApiParam::cookie(name, description))
    }

    pub fn query(name: &str, description: &str) -> RouteOption {
        RouteOption::Param(OpenApiParam::query(name, description))
    }

    pub fn request_content_type(types: &[&str]) -> RouteOption {
        RouteOption::RequestContentType(strings(types))
    }

    pub fn add_error(status: u16, description: &str) -> RouteOption {
        RouteOption::AddError {
            status,
            description: description.to_string(),
        }
    }

    pub fn middleware<M: Middleware + 'static>(middleware: M) -> RouteOption {
        RouteOption::Middleware(Arc::new(middleware))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openapi::{MediaType, SchemaRef};
    use indexmap::IndexMap;

    fn runtime() -> RouteRuntime {
        RouteRuntime {
            accepted: Vec::new(),
            middlewares: Vec::new(),
        }
    }

    #[test]
    fn test_options_apply_in_order() {
        let mut op = Operation::default();
        let mut rt = runtime();
        for opt in [
            option::tags(&["a", "b"]),
            option::add_tags(&["c"]),
            option::remove_tags(&["a"]),
            option::summary("first"),
            option::summary("second"),
            option::hide(),
        ] {
            opt.apply(&mut op, &mut rt);
        }
        assert_eq!(op.tags, vec!["b", "c"]);
        assert_eq!(op.summary, "second");
        assert!(op.hidden);
    }

    #[test]
    fn test_request_content_type_rewrites_body() {
        let mut content = IndexMap::new();
        content.insert(
            "application/json".to_string(),
            MediaType {
                schema: SchemaRef::component("Item"),
            },
        );
        let mut op = Operation {
            request_body: Some(RequestBody {
                required: true,
                content,
            }),
            ..Operation::default()
        };
        let mut rt = runtime();
        option::request_content_type(&["application/xml", "text/csv"]).apply(&mut op, &mut rt);
        assert_eq!(rt.accepted, vec!["application/xml", "text/csv"]);
        let keys: Vec<&String> = op.request_body.as_ref().unwrap().content.keys().collect();
        assert_eq!(keys, vec!["application/xml", "text/csv"]);
    }

    #[test]
    fn test_param_replaces_same_name() {
        let mut op = Operation::default();
        let mut rt = runtime();
        option::header("X-Tenant", "old").apply(&mut op, &mut rt);
        option::param(OpenApiParam::header("X-Tenant", "new").required()).apply(&mut op, &mut rt);
        assert_eq!(op.parameters.len(), 1);
        assert!(op.parameters[0].required);
    }
}
