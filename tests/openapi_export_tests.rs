mod common;

use std::sync::Arc;

use common::{get, json};
use ember::{Context, OpenApiConfig, Registrar, ServerBuilder, ToSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
struct Recipe {
    #[schema(required, example = "Soup")]
    name: String,
    servings: Option<u32>,
}

fn file_in(dir: &tempfile::TempDir) -> std::path::PathBuf {
    dir.path().join("doc").join("openapi.json")
}

#[test]
fn test_export_saves_and_serves_document() {
    let dir = tempfile::tempdir().unwrap();
    let server = ServerBuilder::new()
        .info("Recipes", "1.2.3")
        .openapi_config(OpenApiConfig {
            pretty_json: true,
            json_file_path: file_in(&dir).to_string_lossy().into_owned(),
            ..OpenApiConfig::default()
        })
        .build();
    server.get("/recipes", |_ctx: &mut Context<'_, ()>| Ok(Vec::<Recipe>::new()));

    let doc = server.export_openapi().unwrap();
    assert_eq!(doc.info.title, "Recipes");
    assert!(doc.operation("GET", "/recipes").is_some());

    let response = get(&server, "/swagger/openapi.json");
    assert_eq!(response.status, 200);
    assert_eq!(response.get_header("content-type"), Some("application/json"));
    let served = json(&response);
    assert_eq!(served["openapi"], "3.1.0");
    assert_eq!(served["info"]["version"], "1.2.3");
    assert_eq!(served["servers"][0]["url"], "http://localhost:9999");
    assert!(served["components"]["schemas"]["Recipe"].is_object());
    assert!(served["components"]["schemas"]["HttpError"].is_object());
    assert!(response.body_str().contains("\n  "), "pretty JSON expected");

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(file_in(&dir)).unwrap()).unwrap();
    assert_eq!(saved, served);

    let ui = get(&server, "/swagger");
    assert_eq!(ui.status, 200);
    assert!(ui.body_str().contains("/swagger/openapi.json"));
}

#[test]
fn test_local_save_without_serving() {
    let dir = tempfile::tempdir().unwrap();
    let server = ServerBuilder::new()
        .openapi_config(OpenApiConfig {
            json_file_path: file_in(&dir).to_string_lossy().into_owned(),
            disable_swagger: true,
            ..OpenApiConfig::default()
        })
        .build();
    server.get("/recipes", |_ctx: &mut Context<'_, ()>| Ok(Vec::<Recipe>::new()));
    server.export_openapi().unwrap();

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(file_in(&dir)).unwrap()).unwrap();
    assert!(saved["paths"]["/recipes"]["get"].is_object());
    assert_eq!(get(&server, "/swagger/openapi.json").status, 404);
    assert_eq!(get(&server, "/swagger").status, 404);
}

#[test]
fn test_invalid_settings_disable_features_without_failing() {
    let server = ServerBuilder::new()
        .openapi_config(OpenApiConfig {
            json_url: "/p   i".to_string(),
            json_file_path: "path/to/jsonSpec".to_string(),
            ..OpenApiConfig::default()
        })
        .build();
    server.get("/recipes", |_ctx: &mut Context<'_, ()>| Ok(Vec::<Recipe>::new()));

    let doc = server.export_openapi().unwrap();
    assert!(doc.operation("GET", "/recipes").is_some());
    assert_eq!(get(&server, "/p   i").status, 404);
    // the UI needs the JSON endpoint
    assert_eq!(get(&server, "/swagger").status, 404);
    assert!(!std::path::Path::new("path/to/jsonSpec").exists());
}

#[test]
fn test_custom_ui_handler_and_urls() {
    let server = ServerBuilder::new()
        .openapi_config(OpenApiConfig {
            swagger_url: "/docs".to_string(),
            json_url: "/docs/spec.json".to_string(),
            disable_local_save: true,
            ui_handler: Some(Arc::new(|url: &str| format!("<html>{url}</html>"))),
            ..OpenApiConfig::default()
        })
        .build();
    server.export_openapi().unwrap();
    // a second export does not try to mount the endpoints again
    server.export_openapi().unwrap();

    assert_eq!(get(&server, "/docs").body_str(), "<html>/docs/spec.json</html>");
    assert_eq!(get(&server, "/docs/spec.json").status, 200);
}

#[test]
fn test_reexport_refreshes_served_document() {
    let server = ServerBuilder::new()
        .openapi_config(OpenApiConfig {
            disable_local_save: true,
            ..OpenApiConfig::default()
        })
        .build();
    server.get("/recipes", |_ctx: &mut Context<'_, ()>| Ok(Vec::<Recipe>::new()));
    server.export_openapi().unwrap();
    let served = json(&get(&server, "/swagger/openapi.json"));
    assert!(served["paths"]["/recipes"]["get"].is_object());
    assert!(served["paths"]["/menus"].is_null());

    server.get("/menus", |_ctx: &mut Context<'_, ()>| Ok(Vec::<Recipe>::new()));
    server.export_openapi().unwrap();
    let served = json(&get(&server, "/swagger/openapi.json"));
    assert!(served["paths"]["/menus"]["get"].is_object());
    assert!(served["paths"]["/recipes"]["get"].is_object());
}

#[test]
fn test_disabled_ui_keeps_json() {
    let server = ServerBuilder::new()
        .openapi_config(OpenApiConfig {
            disable_swagger_ui: true,
            disable_local_save: true,
            ..OpenApiConfig::default()
        })
        .build();
    server.export_openapi().unwrap();

    assert_eq!(get(&server, "/swagger/openapi.json").status, 200);
    assert_eq!(get(&server, "/swagger").status, 404);
}

#[test]
fn test_document_json_shape() {
    let server = ServerBuilder::new().description("Recipe service").build();
    server.post("/recipes", |ctx: &mut Context<'_, Recipe>| Ok(ctx.take_body()));

    let doc: Value = serde_json::from_str(&server.spec_json().unwrap()).unwrap();
    assert_eq!(doc["info"]["title"], "OpenAPI");
    assert_eq!(doc["info"]["description"], "Recipe service");
    assert_eq!(doc["tags"][0]["name"], "Recipe");

    let recipe = &doc["components"]["schemas"]["Recipe"];
    assert_eq!(recipe["type"], "object");
    assert_eq!(recipe["required"], serde_json::json!(["name"]));
    assert_eq!(recipe["properties"]["name"]["example"], "Soup");

    let parsed: oas3::OpenApiV3Spec = serde_json::from_value(doc).unwrap();
    assert!(parsed.paths.unwrap().contains_key("/recipes"));
}
