use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use http::Method;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use super::types::{Components, OpenApiDoc, ServerEntry, TagEntry};
use crate::config::{OpenApiConfig, ServerConfig};
use crate::error::{HttpError, SpecConfigError};
use crate::registry::Core;
use crate::schema::ToSchema;
use crate::server::ResponseWriter;
use crate::typed::StdEndpoint;

#[allow(clippy::expect_used)]
static JSON_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/[/a-zA-Z0-9\-_]+\.json$").expect("valid JSON url pattern"));
#[allow(clippy::expect_used)]
static UI_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/[/a-zA-Z0-9\-_]+[a-zA-Z0-9\-_]$").expect("valid UI url pattern"));
#[allow(clippy::expect_used)]
static LOCAL_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\./|/)?([a-zA-Z0-9_\-.]+/)*[a-zA-Z0-9_\-]+\.json$").expect("valid local path pattern")
});

pub fn validate_json_url(url: &str) -> Result<(), SpecConfigError> {
    if JSON_URL.is_match(url) {
        Ok(())
    } else {
        Err(SpecConfigError::InvalidJsonUrl(url.to_string()))
    }
}

pub fn validate_ui_url(url: &str) -> Result<(), SpecConfigError> {
    if UI_URL.is_match(url) {
        Ok(())
    } else {
        Err(SpecConfigError::InvalidUiUrl(url.to_string()))
    }
}

pub fn validate_local_path(path: &str) -> Result<(), SpecConfigError> {
    if LOCAL_PATH.is_match(path) {
        Ok(())
    } else {
        Err(SpecConfigError::InvalidLocalPath(path.to_string()))
    }
}

/// Which export features survived URL/path validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportPlan {
    pub serve_json: bool,
    pub serve_ui: bool,
    pub save_local: bool,
}

impl ExportPlan {
    /// Resolve the plan from config. Invalid settings are logged and switch their
    /// feature off; they never fail startup.
    pub fn from_config(cfg: &OpenApiConfig) -> Self {
        let check = |result: Result<(), SpecConfigError>| match result {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Spec export setting rejected");
                false
            }
        };

        let serve_json = !cfg.disable_swagger && check(validate_json_url(&cfg.json_url));
        let serve_ui = serve_json && !cfg.disable_swagger_ui && check(validate_ui_url(&cfg.swagger_url));
        let save_local = !cfg.disable_local_save && check(validate_local_path(&cfg.json_file_path));
        Self {
            serve_json,
            serve_ui,
            save_local,
        }
    }
}

/// Merge registered operations with server-level settings into one document.
///
/// Hidden operations are skipped. Global parameters and responses are added to every
/// operation that does not already define them.
pub(crate) fn assemble(core: &Core) -> OpenApiDoc {
    let cfg = &core.config;
    let error_ref = core.schema_ref::<HttpError>();
    let error_schema = core.schemas.get_or_insert::<HttpError>();

    let spec = core.spec_read();
    let mut paths: indexmap::IndexMap<String, indexmap::IndexMap<String, super::Operation>> =
        indexmap::IndexMap::new();
    let mut tags: Vec<TagEntry> = Vec::new();

    for (key, operation) in &spec.operations {
        if operation.hidden {
            continue;
        }
        let mut operation = operation.clone();
        for param in &cfg.global_params {
            if !operation
                .parameters
                .iter()
                .any(|p| p.name == param.name && p.kind == param.kind)
            {
                operation.parameters.push(param.clone());
            }
        }
        for global in &cfg.global_responses {
            operation
                .responses
                .entry(global.status.to_string())
                .or_insert_with(|| {
                    super::ResponseEntry::new(global.description.as_str())
                        .with_schema("application/json", error_ref.clone())
                });
        }
        operation.responses.sort_keys();

        for tag in &operation.tags {
            if !tags.iter().any(|t| &t.name == tag) {
                tags.push(TagEntry { name: tag.clone() });
            }
        }
        paths
            .entry(key.path.clone())
            .or_default()
            .insert(key.method.as_str().to_ascii_lowercase(), operation);
    }

    let mut components = Components {
        schemas: spec.components.clone(),
    };
    if let Some(name) = HttpError::schema_name() {
        components
            .schemas
            .entry(name.to_string())
            .or_insert(error_schema);
    }
    tags.sort_by(|a, b| a.name.cmp(&b.name));

    OpenApiDoc {
        openapi: "3.1.0".to_string(),
        info: cfg.info.clone(),
        servers: vec![ServerEntry {
            url: format!("http://{}", cfg.addr),
            description: "local server".to_string(),
        }],
        paths,
        components,
        tags,
    }
}

pub(crate) fn to_json(doc: &OpenApiDoc, pretty: bool) -> anyhow::Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(doc)?
    } else {
        serde_json::to_string(doc)?
    };
    Ok(json)
}

/// Parse the document through the `oas3` model. Mismatches are only logged.
fn check_document(json: &str) {
    match serde_json::from_str::<oas3::OpenApiV3Spec>(json) {
        Ok(parsed) => debug!(paths = parsed.paths.as_ref().map_or(0, |p| p.len()), "Spec document parsed"),
        Err(e) => warn!(error = %e, "Spec document does not match the OpenAPI model"),
    }
}

fn persist(path: &str, json: &str) {
    let path = Path::new(path);
    let written = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| fs::write(path, json));
    match written {
        Ok(()) => info!(path = %path.display(), bytes = json.len(), "Spec document saved"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to save spec document"),
    }
}

fn register_doc_endpoints(core: &Core, plan: ExportPlan) {
    if core.exported.swap(true, Ordering::SeqCst) {
        debug!("Spec endpoints already registered");
        return;
    }
    let cfg: &ServerConfig = &core.config;
    let mut mux = core.mux.write().unwrap_or_else(std::sync::PoisonError::into_inner);

    if plan.serve_json {
        let served = Arc::clone(&core.served_json);
        let endpoint = StdEndpoint::new(move |_req: &crate::HttpRequest, w: &mut ResponseWriter| {
            let body = Arc::clone(&served.read().unwrap_or_else(std::sync::PoisonError::into_inner));
            w.write(200, "application/json", body.as_bytes());
        });
        if let Err(e) = mux.insert(Method::GET, &cfg.openapi.json_url, Arc::new(endpoint), Vec::new()) {
            warn!(error = %e, "Spec JSON endpoint not registered");
        }
    }

    if plan.serve_ui {
        let spec_url = cfg.openapi.json_url.clone();
        let page = match &cfg.openapi.ui_handler {
            Some(handler) => handler(&spec_url),
            None => crate::docs::swagger_ui(&spec_url),
        };
        let endpoint = StdEndpoint::new(move |_req: &crate::HttpRequest, w: &mut ResponseWriter| {
            w.write(200, "text/html; charset=utf-8", page.as_bytes());
        });
        if let Err(e) = mux.insert(Method::GET, &cfg.openapi.swagger_url, Arc::new(endpoint), Vec::new()) {
            warn!(error = %e, "Documentation UI endpoint not registered");
        }
    }
}

/// Assemble, check, persist and serve the document according to config.
///
/// Endpoints are registered once; every call replaces the document they serve.
pub(crate) fn export(core: &Core) -> anyhow::Result<OpenApiDoc> {
    let plan = ExportPlan::from_config(&core.config.openapi);
    let doc = assemble(core);
    let json = to_json(&doc, core.config.openapi.pretty_json)?;
    check_document(&json);

    if plan.save_local {
        persist(&core.config.openapi.json_file_path, &json);
    }
    *core.served_json.write().unwrap_or_else(std::sync::PoisonError::into_inner) = Arc::new(json);
    register_doc_endpoints(core, plan);
    info!(
        operations = doc.paths.values().map(|p| p.len()).sum::<usize>(),
        serve_json = plan.serve_json,
        serve_ui = plan.serve_ui,
        save_local = plan.save_local,
        "Spec exported"
    );
    Ok(doc)
}
