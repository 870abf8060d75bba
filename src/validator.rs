//! # Request Body Validation
//!
//! The [`Validator`] is owned by the server and injected into every route adapter.
//! It checks a decoded body against the synthesized schema of its shape:
//!
//! - fields in the schema's `required` list must be present and non-empty
//!   (`null`, `""` and `[]` count as missing);
//! - present fields must satisfy their keywords (`type`, `minLength`, `maxLength`,
//!   `minimum`, `maximum`, `pattern`, nested `required`), checked by `jsonschema`;
//! - optional custom rules registered per shape run last.
//!
//! The body is the serialized form of a typed value, so a `null` anywhere in it can
//! only come from an `Option` that is `None`. Nulls are dropped before the keyword
//! checks, which makes an absent optional field valid at any depth.
//!
//! Failures are reported per top-level field so clients get a field list rather than
//! a single message. Compiled `jsonschema` validators are cached per concrete Rust
//! type and field.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, error};

use crate::error::FieldError;
use crate::schema::{Schema, ToSchema};

/// Custom validation rule run against the decoded body of one shape.
pub type CustomRule = Arc<dyn Fn(&Value) -> Vec<FieldError> + Send + Sync>;

#[derive(Clone, Default)]
struct ValidatorCache {
    cache: Arc<RwLock<HashMap<String, Arc<jsonschema::Validator>>>>,
}

impl ValidatorCache {
    fn get_or_compile(&self, key: &str, schema: &Schema) -> Option<Arc<jsonschema::Validator>> {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(validator) = cache.get(key) {
                return Some(Arc::clone(validator));
            }
        }

        let raw = match serde_json::to_value(schema) {
            Ok(raw) => raw,
            Err(e) => {
                error!(cache_key = %key, error = %e, "Failed to serialize schema");
                return None;
            }
        };
        match jsonschema::validator_for(&raw) {
            Ok(compiled) => {
                let compiled = Arc::new(compiled);
                let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
                let entry = cache
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::clone(&compiled));
                debug!(cache_key = %key, cache_size = cache.len(), "Schema validator compiled");
                Some(Arc::clone(entry))
            }
            Err(e) => {
                error!(cache_key = %key, error = %e, "Failed to compile JSON Schema");
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Declarative body validator.
#[derive(Clone)]
pub struct Validator {
    enabled: bool,
    cache: ValidatorCache,
    rules: HashMap<&'static str, Vec<CustomRule>>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    pub fn new() -> Self {
        Self {
            enabled: true,
            cache: ValidatorCache::default(),
            rules: HashMap::new(),
        }
    }

    /// A validator that accepts everything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    /// Register an extra rule for shape `T`. Rules run after the schema checks.
    pub fn with_rule<T, F>(mut self, rule: F) -> Self
    where
        T: ToSchema + ?Sized,
        F: Fn(&Value) -> Vec<FieldError> + Send + Sync + 'static,
    {
        let name = T::schema_name().unwrap_or("<inline>");
        self.rules.entry(name).or_default().push(Arc::new(rule));
        self
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of compiled field validators currently cached.
    #[must_use]
    pub fn cached_validators(&self) -> usize {
        self.cache.len()
    }

    /// Validate `value`, the serialized body of `T` described by `schema`.
    ///
    /// Compiled validators are keyed by the Rust type name, so two shapes sharing a
    /// component name never share a validator.
    pub fn validate_shape<T: ToSchema + ?Sized>(&self, schema: &Schema, value: &Value) -> Result<(), Vec<FieldError>> {
        self.run(std::any::type_name::<T>(), T::schema_name(), schema, value)
    }

    /// Validate `value` against `schema`, caching compiled validators under `shape`.
    pub fn validate(&self, shape: &str, schema: &Schema, value: &Value) -> Result<(), Vec<FieldError>> {
        self.run(shape, Some(shape), schema, value)
    }

    fn run(
        &self,
        shape: &str,
        rule_key: Option<&str>,
        schema: &Schema,
        original: &Value,
    ) -> Result<(), Vec<FieldError>> {
        if !self.enabled {
            return Ok(());
        }

        let value = without_nulls(original);
        let mut errors = Vec::new();
        match value.as_object() {
            Some(object) if schema.is_object() => {
                for (name, property) in &schema.properties {
                    let field = object.get(name);
                    let required = schema.required.iter().any(|r| r == name);
                    if is_missing(field) {
                        if required {
                            errors.push(FieldError::new(name.as_str(), "is required"));
                        }
                        continue;
                    }
                    if let Some(field) = field {
                        let key = format!("{shape}.{name}");
                        self.check(&key, name, property, field, &mut errors);
                    }
                }
            }
            _ => self.check(shape, "body", schema, &value, &mut errors),
        }

        if let Some(rules) = rule_key.and_then(|key| self.rules.get(key)) {
            for rule in rules {
                errors.extend(rule(original));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            debug!(shape = %shape, error_count = errors.len(), "Validation failed");
            Err(errors)
        }
    }

    fn check(&self, key: &str, name: &str, schema: &Schema, value: &Value, errors: &mut Vec<FieldError>) {
        let Some(compiled) = self.cache.get_or_compile(key, schema) else {
            return;
        };
        errors.extend(
            compiled
                .iter_errors(value)
                .map(|e| FieldError::new(name, e.to_string())),
        );
    }
}

/// Copy of `value` with every `null` object entry and array element removed.
fn without_nulls(value: &Value) -> Value {
    match value {
        Value::Object(object) => Value::Object(
            object
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), without_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().filter(|v| !v.is_null()).map(without_nulls).collect()),
        other => other.clone(),
    }
}

fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person() -> Schema {
        let mut name = Schema::string();
        name.min_length = Some(2);
        let mut age = Schema::integer();
        age.minimum = Some(0.0);
        let mut schema = Schema::object();
        schema.insert_property("Name", name, true);
        schema.insert_property("Age", age, false);
        schema
    }

    #[test]
    fn test_valid_body() {
        let validator = Validator::new();
        assert!(validator
            .validate("Person", &person(), &json!({"Name": "Ewen", "Age": 23}))
            .is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let validator = Validator::new();
        let errors = validator
            .validate("Person", &person(), &json!({"Name": "", "Age": 3}))
            .unwrap_err();
        assert_eq!(errors, vec![FieldError::new("Name", "is required")]);
    }

    #[test]
    fn test_bounds_are_reported_per_field() {
        let validator = Validator::new();
        let errors = validator
            .validate("Person", &person(), &json!({"Name": "E", "Age": -1}))
            .unwrap_err();
        let names: Vec<&str> = errors.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Name", "Age"]);
        assert!(validator.cached_validators() >= 2);
    }

    fn member() -> Schema {
        let mut profile = Schema::object();
        profile.insert_property("nickname", Schema::string(), true);
        profile.insert_property("age", Schema::integer(), false);
        let mut schema = Schema::object();
        schema.insert_property("profile", profile.clone(), false);
        schema.insert_property("history", Schema::array(profile), false);
        schema
    }

    #[test]
    fn test_nested_nulls_count_as_absent() {
        let validator = Validator::new();
        let body = json!({
            "profile": {"nickname": "ew", "age": null},
            "history": [{"nickname": "old", "age": null}, null],
        });
        assert!(validator.validate("Member", &member(), &body).is_ok());

        let errors = validator
            .validate("Member", &member(), &json!({"profile": {"nickname": null, "age": 3}}))
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].name, "profile");
        assert!(errors[0].reason.contains("nickname"));
    }

    #[test]
    fn test_validators_are_keyed_by_rust_type() {
        struct Wide;
        struct Narrow;
        impl ToSchema for Wide {
            fn schema() -> Schema {
                let mut schema = Schema::object();
                schema.insert_property("n", Schema::integer(), true);
                schema
            }
            fn schema_name() -> Option<&'static str> {
                Some("Shared")
            }
        }
        impl ToSchema for Narrow {
            fn schema() -> Schema {
                let mut schema = Schema::object();
                schema.insert_property("n", Schema::string(), true);
                schema
            }
            fn schema_name() -> Option<&'static str> {
                Some("Shared")
            }
        }

        let validator = Validator::new();
        assert!(validator.validate_shape::<Wide>(&Wide::schema(), &json!({"n": 1})).is_ok());
        assert!(validator.validate_shape::<Narrow>(&Narrow::schema(), &json!({"n": "x"})).is_ok());
        assert!(validator.validate_shape::<Wide>(&Wide::schema(), &json!({"n": "x"})).is_err());
        assert_eq!(validator.cached_validators(), 2);
    }

    #[test]
    fn test_disabled_accepts_everything() {
        let validator = Validator::disabled();
        assert!(validator.validate("Person", &person(), &json!({})).is_ok());
    }

    #[test]
    fn test_custom_rule() {
        struct Person;
        impl ToSchema for Person {
            fn schema() -> Schema {
                person()
            }
            fn schema_name() -> Option<&'static str> {
                Some("Person")
            }
        }

        let validator = Validator::new().with_rule::<Person, _>(|value| {
            if value.get("Name") == Some(&json!("root")) {
                vec![FieldError::new("Name", "is reserved")]
            } else {
                Vec::new()
            }
        });
        let errors = validator
            .validate("Person", &person(), &json!({"Name": "root"}))
            .unwrap_err();
        assert_eq!(errors[0].reason, "is reserved");
    }
}
