use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::schema::Schema;

/// Where a parameter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Path,
    Query,
    Header,
    Cookie,
}

/// Parameter declaration, used both as a route option and as an operation entry.
///
/// ```
/// use ember::OpenApiParam;
///
/// let p = OpenApiParam::header("X-Tenant", "tenant id").required().example("acme");
/// assert!(p.required);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenApiParam {
    pub name: String,
    #[serde(rename = "in")]
    pub kind: ParamKind,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    pub schema: Schema,
}

impl OpenApiParam {
    pub fn new(kind: ParamKind, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: kind == ParamKind::Path,
            example: None,
            schema: Schema::string(),
        }
    }

    pub fn query(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(ParamKind::Query, name, description)
    }

    pub fn header(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(ParamKind::Header, name, description)
    }

    pub fn cookie(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(ParamKind::Cookie, name, description)
    }

    pub fn path(name: impl Into<String>) -> Self {
        Self::new(ParamKind::Path, name, "")
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn example(mut self, example: impl Into<Value>) -> Self {
        self.example = Some(example.into());
        self
    }

    /// Replace the default `string` schema, e.g. with [`Schema::integer`].
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }
}

/// Schema position in a document: a component reference or an inline schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SchemaRef {
    Ref {
        #[serde(rename = "$ref")]
        reference: String,
    },
    Inline(Arc<Schema>),
}

impl SchemaRef {
    pub fn component(name: &str) -> Self {
        Self::Ref {
            reference: format!("#/components/schemas/{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaType {
    pub schema: SchemaRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestBody {
    pub required: bool,
    pub content: IndexMap<String, MediaType>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEntry {
    pub description: String,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub content: IndexMap<String, MediaType>,
}

impl ResponseEntry {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            content: IndexMap::new(),
        }
    }

    pub fn with_schema(mut self, content_type: &str, schema: SchemaRef) -> Self {
        self.content
            .insert(content_type.to_string(), MediaType { schema });
        self
    }
}

/// One method of one path in the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "operationId", skip_serializing_if = "String::is_empty")]
    pub operation_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<OpenApiParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: IndexMap<String, ResponseEntry>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    /// Routable but left out of the document.
    #[serde(skip)]
    pub hidden: bool,
}

impl Operation {
    /// Add or replace a parameter, matching on name and location.
    pub fn upsert_param(&mut self, param: OpenApiParam) {
        match self
            .parameters
            .iter_mut()
            .find(|p| p.name == param.name && p.kind == param.kind)
        {
            Some(existing) => *existing = param,
            None => self.parameters.push(param),
        }
    }

    pub fn add_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
    }

    pub fn remove_tags<S: AsRef<str>>(&mut self, tags: &[S]) {
        self.tags
            .retain(|t| !tags.iter().any(|removed| removed.as_ref() == t));
    }

    /// Query parameter names declared on the operation.
    pub fn query_names(&self) -> Vec<String> {
        self.parameters
            .iter()
            .filter(|p| p.kind == ParamKind::Query)
            .map(|p| p.name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl Default for Info {
    fn default() -> Self {
        Self {
            title: "OpenAPI".to_string(),
            version: "0.0.1".to_string(),
            description: "Autogenerated OpenAPI documentation".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerEntry {
    pub url: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagEntry {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Components {
    pub schemas: IndexMap<String, Arc<Schema>>,
}

/// The assembled OpenAPI 3.1 document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenApiDoc {
    pub openapi: String,
    pub info: Info,
    pub servers: Vec<ServerEntry>,
    pub paths: IndexMap<String, IndexMap<String, Operation>>,
    pub components: Components,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagEntry>,
}

impl OpenApiDoc {
    /// Operation for `method` (any case) on `path`, if present in the document.
    pub fn operation(&self, method: &str, path: &str) -> Option<&Operation> {
        self.paths
            .get(path)?
            .get(method.to_ascii_lowercase().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_serialization() {
        let param = OpenApiParam::header("X-Tenant", "tenant").required();
        assert_eq!(
            serde_json::to_value(&param).unwrap(),
            json!({
                "name": "X-Tenant",
                "in": "header",
                "description": "tenant",
                "required": true,
                "schema": {"type": "string"}
            })
        );
        assert!(OpenApiParam::path("id").required);
    }

    #[test]
    fn test_schema_ref_forms() {
        assert_eq!(
            serde_json::to_value(SchemaRef::component("Item")).unwrap(),
            json!({"$ref": "#/components/schemas/Item"})
        );
        assert_eq!(
            serde_json::to_value(SchemaRef::Inline(Arc::new(Schema::string()))).unwrap(),
            json!({"type": "string"})
        );
    }

    #[test]
    fn test_tag_mutators() {
        let mut op = Operation::default();
        op.add_tags(["a", "b", "a"]);
        op.remove_tags(&["a"]);
        assert_eq!(op.tags, vec!["b"]);
    }

    #[test]
    fn test_hidden_is_not_serialized() {
        let op = Operation {
            hidden: true,
            ..Operation::default()
        };
        assert_eq!(serde_json::to_value(&op).unwrap(), json!({"responses": {}}));
    }
}
