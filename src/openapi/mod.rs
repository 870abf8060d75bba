//! # OpenAPI Document
//!
//! Operations are recorded at registration and merged into an [`OpenApiDoc`] on
//! export. Export also validates the configured URLs and file path, persists the
//! JSON and mounts two hidden endpoints: the raw document and the documentation UI.
//!
//! | Setting | Default | Invalid value |
//! |---|---|---|
//! | `json_url` | `/swagger/openapi.json` | JSON and UI not served |
//! | `swagger_url` | `/swagger` | UI not served |
//! | `json_file_path` | `doc/openapi.json` | not saved |
//!
//! Invalid values are logged as [`SpecConfigError`](crate::error::SpecConfigError)
//! warnings; startup continues.

mod export;
mod types;

pub(crate) use self::export::{assemble, export, to_json};
pub use self::export::{validate_json_url, validate_local_path, validate_ui_url, ExportPlan};
pub use self::types::{
    Components, Info, MediaType, OpenApiDoc, OpenApiParam, Operation, ParamKind, RequestBody, ResponseEntry,
    SchemaRef, ServerEntry, TagEntry,
};
