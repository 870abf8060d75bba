use std::sync::Arc;

use http::Method;
use regex::Regex;
use tracing::{debug, info};

use crate::error::RouteError;
use crate::middleware::Middleware;
use crate::server::request::ParamVec;
use crate::typed::Endpoint;

/// One registered route: the compiled pattern, its endpoint and the middleware
/// stack wrapped around it (outermost first).
pub(crate) struct RouteEntry {
    pub method: Method,
    pub pattern: String,
    regex: Regex,
    param_names: Vec<Arc<str>>,
    pub endpoint: Arc<dyn Endpoint>,
    pub middlewares: Vec<Arc<dyn Middleware>>,
}

impl RouteEntry {
    fn captures(&self, path: &str) -> Option<ParamVec> {
        let caps = self.regex.captures(path)?;
        Some(
            self.param_names
                .iter()
                .enumerate()
                .filter_map(|(i, name)| {
                    caps.get(i + 1)
                        .map(|m| (Arc::clone(name), decode_segment(m.as_str())))
                })
                .collect(),
        )
    }
}

/// Outcome of a mux lookup.
pub(crate) enum RouteLookup {
    Found(Arc<RouteEntry>, ParamVec),
    /// The path exists under another method.
    MethodNotAllowed,
    NotFound,
}

/// Method + path multiplexer.
///
/// Routes are matched in registration order; when several patterns match, the one
/// with the fewest placeholders wins, so `/items/new` beats `/items/{id}`.
#[derive(Default)]
pub(crate) struct Mux {
    routes: Vec<Arc<RouteEntry>>,
}

impl Mux {
    pub fn insert(
        &mut self,
        method: Method,
        pattern: &str,
        endpoint: Arc<dyn Endpoint>,
        middlewares: Vec<Arc<dyn Middleware>>,
    ) -> Result<(), RouteError> {
        let shape = pattern_shape(pattern);
        if self
            .routes
            .iter()
            .any(|r| r.method == method && pattern_shape(&r.pattern) == shape)
        {
            return Err(RouteError::Conflict {
                method: method.to_string(),
                path: pattern.to_string(),
            });
        }

        let (regex, param_names) = path_to_regex(pattern)?;
        info!(
            method = %method,
            pattern = %pattern,
            params = ?param_names,
            middleware_count = middlewares.len(),
            "Route registered"
        );
        self.routes.push(Arc::new(RouteEntry {
            method,
            pattern: pattern.to_string(),
            regex,
            param_names,
            endpoint,
            middlewares,
        }));
        Ok(())
    }

    pub fn lookup(&self, method: &Method, path: &str) -> RouteLookup {
        let mut best: Option<(&Arc<RouteEntry>, ParamVec)> = None;
        let mut path_exists = false;
        for entry in &self.routes {
            let Some(params) = entry.captures(path) else {
                continue;
            };
            if entry.method != *method {
                path_exists = true;
                continue;
            }
            let better = best
                .as_ref()
                .map_or(true, |(current, _)| entry.param_names.len() < current.param_names.len());
            if better {
                best = Some((entry, params));
            }
        }

        match best {
            Some((entry, params)) => {
                debug!(method = %method, path = %path, pattern = %entry.pattern, "Route matched");
                RouteLookup::Found(Arc::clone(entry), params)
            }
            None if path_exists => RouteLookup::MethodNotAllowed,
            None => {
                debug!(method = %method, path = %path, "No route matched");
                RouteLookup::NotFound
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }
}

/// Pattern with placeholder names erased, so `/items/{id}` and `/items/{key}` collide.
fn pattern_shape(pattern: &str) -> String {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| if is_placeholder(s) { "{}" } else { s })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_placeholder(segment: &str) -> bool {
    segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}')
}

/// Placeholder names of a path template, in order.
pub(crate) fn path_params(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| is_placeholder(s))
        .map(|s| s[1..s.len() - 1].to_string())
        .collect()
}

/// Compile `/users/{id}` into `^/users/([^/]+)/?$` and the name list `["id"]`.
pub(crate) fn path_to_regex(path: &str) -> Result<(Regex, Vec<Arc<str>>), RouteError> {
    let invalid = |reason: &str| RouteError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };
    if !path.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }

    let mut pattern = String::with_capacity(path.len() + 8);
    pattern.push('^');
    let mut param_names: Vec<Arc<str>> = Vec::with_capacity(path.matches('{').count());

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        pattern.push('/');
        if is_placeholder(segment) {
            let name = &segment[1..segment.len() - 1];
            if name.contains(['{', '}']) {
                return Err(invalid("malformed placeholder"));
            }
            pattern.push_str("([^/]+)");
            param_names.push(Arc::from(name));
        } else if segment.contains(['{', '}']) {
            return Err(invalid("placeholders must span a whole segment"));
        } else {
            pattern.push_str(&regex::escape(segment));
        }
    }

    if pattern.len() == 1 {
        pattern.push('/');
    } else {
        pattern.push_str("/?");
    }
    pattern.push('$');
    let regex = Regex::new(&pattern).map_err(|e| invalid(&e.to_string()))?;
    Ok((regex, param_names))
}

/// Percent-decode a captured segment. `+` stays literal in paths.
fn decode_segment(raw: &str) -> String {
    if !raw.contains('%') {
        return raw.to_string();
    }
    let escaped = raw.replace('+', "%2B").replace('&', "%26");
    url::form_urlencoded::parse(format!("v={escaped}").as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| raw.to_string())
}
