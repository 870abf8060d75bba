use serde_json::Value;
use tracing::debug;

use super::RequestBody;
use crate::config::ServerConfig;
use crate::error::PipelineError;
use crate::schema::Schema;
use crate::server::HttpRequest;

fn is_xml(content_type: &str) -> bool {
    content_type.eq_ignore_ascii_case("application/xml") || content_type.eq_ignore_ascii_case("text/xml")
}

/// Run the request stages and produce the handler's body.
///
/// Stage failures come back as [`PipelineError`]; a failing [`InTransform`](super::InTransform)
/// hook returns its own error untouched.
pub(crate) fn read_body<B: RequestBody>(
    req: &HttpRequest,
    schema: &Schema,
    accepted: &[String],
    cfg: &ServerConfig,
) -> anyhow::Result<B> {
    if B::is_unit() {
        return decode_json::<B>(b"null", schema, false).map_err(Into::into);
    }

    let content_type = req.content_type();
    check_content_type(content_type, accepted, cfg.xml)?;
    check_size(req, cfg.max_body_size)?;

    let mut body: B = match content_type {
        Some(ct) if is_xml(ct) => decode_xml(&req.body)?,
        _ => {
            if req.body.iter().all(u8::is_ascii_whitespace) {
                return Err(PipelineError::DecodeFailure("request body is empty".to_string()).into());
            }
            decode_json(&req.body, schema, cfg.strict_fields)?
        }
    };

    body.in_transform()?;

    let shape = B::schema_name().unwrap_or_else(std::any::type_name::<B>);
    let value = serde_json::to_value(&body).map_err(|e| PipelineError::DecodeFailure(e.to_string()))?;
    cfg.validator
        .validate_shape::<B>(schema, &value)
        .map_err(PipelineError::ValidationFailure)?;

    debug!(request_id = %req.request_id, shape = %shape, "Request body accepted");
    Ok(body)
}

fn check_content_type(content_type: Option<&str>, accepted: &[String], xml: bool) -> Result<(), PipelineError> {
    let Some(content_type) = content_type else {
        return Ok(());
    };
    let rejected = if accepted.is_empty() {
        is_xml(content_type) && !xml
    } else {
        !accepted.iter().any(|a| a.eq_ignore_ascii_case(content_type))
    };
    if rejected {
        return Err(PipelineError::ContentTypeRejected {
            content_type: content_type.to_string(),
        });
    }
    Ok(())
}

fn check_size(req: &HttpRequest, limit: Option<usize>) -> Result<(), PipelineError> {
    let Some(limit) = limit else {
        return Ok(());
    };
    let declared = req
        .get_header("content-length")
        .and_then(|v| v.trim().parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) || req.body.len() > limit {
        return Err(PipelineError::BodyTooLarge { limit });
    }
    Ok(())
}

fn decode_json<B: RequestBody>(raw: &[u8], schema: &Schema, strict: bool) -> Result<B, PipelineError> {
    let value: Value = serde_json::from_slice(raw).map_err(|e| PipelineError::DecodeFailure(e.to_string()))?;
    if strict {
        if let Some(field) = find_unknown_field(schema, &value, "") {
            return Err(PipelineError::UnknownField(field));
        }
    }
    serde_json::from_value(value).map_err(|e| PipelineError::DecodeFailure(e.to_string()))
}

fn decode_xml<B: RequestBody>(raw: &[u8]) -> Result<B, PipelineError> {
    let text = std::str::from_utf8(raw).map_err(|e| PipelineError::DecodeFailure(e.to_string()))?;
    if text.trim().is_empty() {
        return Err(PipelineError::DecodeFailure("request body is empty".to_string()));
    }
    quick_xml::de::from_str(text).map_err(|e| PipelineError::DecodeFailure(e.to_string()))
}

/// First field of `value` the schema does not declare, as a dotted path (`a.b[1].c`).
///
/// Only closed objects are checked: objects with `additionalProperties` and schemas
/// without a type (free-form values) accept anything.
pub(crate) fn find_unknown_field(schema: &Schema, value: &Value, prefix: &str) -> Option<String> {
    match value {
        Value::Object(object) if schema.is_object() => {
            for (key, field) in object {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                match (schema.properties.get(key), schema.additional_properties.as_deref()) {
                    (Some(property), _) | (None, Some(property)) => {
                        if let Some(found) = find_unknown_field(property, field, &path) {
                            return Some(found);
                        }
                    }
                    (None, None) => return Some(path),
                }
            }
            None
        }
        Value::Array(items) => {
            let item_schema = schema.items.as_deref()?;
            items
                .iter()
                .enumerate()
                .find_map(|(i, item)| find_unknown_field(item_schema, item, &format!("{prefix}[{i}]")))
        }
        _ => None,
    }
}
