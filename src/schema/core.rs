use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// JSON Schema primitive type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Object,
    Array,
    String,
    Integer,
    Number,
    Boolean,
}

/// Structural description of a data shape, serialized as an OpenAPI 3.1 schema object.
///
/// Properties keep declaration order. Only the keywords the synthesizer produces are
/// modelled; this is not a general JSON Schema representation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Schema>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

/// Field-level hints written by `#[derive(ToSchema)]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldMeta {
    pub format: Option<&'static str>,
    pub example: Option<&'static str>,
    pub description: Option<&'static str>,
    pub pattern: Option<&'static str>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

impl Schema {
    fn typed(schema_type: SchemaType) -> Self {
        Self {
            schema_type: Some(schema_type),
            ..Self::default()
        }
    }

    pub fn object() -> Self {
        Self::typed(SchemaType::Object)
    }

    pub fn array(items: Schema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::typed(SchemaType::Array)
        }
    }

    pub fn string() -> Self {
        Self::typed(SchemaType::String)
    }

    pub fn integer() -> Self {
        Self::typed(SchemaType::Integer)
    }

    pub fn number() -> Self {
        Self::typed(SchemaType::Number)
    }

    pub fn boolean() -> Self {
        Self::typed(SchemaType::Boolean)
    }

    /// Object whose values all share one schema (`HashMap<String, V>`).
    pub fn map(values: Schema) -> Self {
        Self {
            additional_properties: Some(Box::new(values)),
            ..Self::object()
        }
    }

    pub fn string_enum(variants: &[&str]) -> Self {
        Self {
            enum_values: variants.iter().map(|v| Value::from(*v)).collect(),
            ..Self::string()
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_example(mut self, example: Value) -> Self {
        self.example = Some(example);
        self
    }

    #[must_use]
    pub fn is_object(&self) -> bool {
        self.schema_type == Some(SchemaType::Object)
    }

    /// Add a property, keeping declaration order. Re-inserting a name replaces it in place.
    pub fn insert_property(&mut self, name: &str, schema: Schema, required: bool) {
        self.properties.insert(name.to_string(), schema);
        if required && !self.required.iter().any(|r| r == name) {
            self.required.push(name.to_string());
        }
    }

    /// Apply field hints from the derive macro.
    pub fn apply_meta(&mut self, meta: &FieldMeta) {
        if let Some(format) = meta.format {
            self.format = Some(format.to_string());
        }
        if let Some(example) = meta.example {
            self.example = Some(self.typed_example(example));
        }
        if let Some(description) = meta.description {
            self.description = Some(description.to_string());
        }
        if let Some(pattern) = meta.pattern {
            self.pattern = Some(pattern.to_string());
        }
        self.min_length = meta.min_length.or(self.min_length);
        self.max_length = meta.max_length.or(self.max_length);
        self.minimum = meta.minimum.or(self.minimum);
        self.maximum = meta.maximum.or(self.maximum);
    }

    /// Examples are written as strings in attributes; numbers and booleans are
    /// parsed so the document carries the right JSON type.
    fn typed_example(&self, raw: &str) -> Value {
        let parsed = match self.schema_type {
            Some(SchemaType::Integer) => raw.parse::<i64>().ok().map(Value::from),
            Some(SchemaType::Number) => raw.parse::<f64>().ok().map(Value::from),
            Some(SchemaType::Boolean) => raw.parse::<bool>().ok().map(Value::from),
            Some(SchemaType::Array) | Some(SchemaType::Object) => serde_json::from_str(raw).ok(),
            _ => None,
        };
        parsed.unwrap_or_else(|| Value::String(raw.to_string()))
    }
}

/// A data shape with a statically known schema.
///
/// Implemented for primitives, strings, sequences, maps, `Option`, smart pointers,
/// `chrono` date/times, `serde_json::Value` and `()`. User types derive it.
pub trait ToSchema {
    /// Build the schema for this shape. Called once per shape by [`SchemaCache`](super::SchemaCache).
    fn schema() -> Schema;

    /// Component name. Named shapes are emitted under `components.schemas` and referenced
    /// by `$ref`; unnamed shapes are inlined.
    fn schema_name() -> Option<&'static str> {
        None
    }

    /// Name used for automatic route tags. Sequences report their element's name.
    fn tag_name() -> Option<&'static str> {
        Self::schema_name()
    }

    /// Template used to render this shape instead of serializing it.
    fn template_name() -> Option<&'static str> {
        None
    }

    /// `()` marks routes without a request body.
    fn is_unit() -> bool {
        false
    }
}
