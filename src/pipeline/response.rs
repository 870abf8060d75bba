use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use super::ResponseBody;
use crate::config::ServerConfig;
use crate::error::HttpError;
use crate::server::{HttpRequest, ResponseWriter};

const JSON: &str = "application/json";
const XML: &str = "application/xml";
const TEXT: &str = "text/plain; charset=utf-8";
const HTML: &str = "text/html; charset=utf-8";

/// Wire format picked for a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Xml,
}

/// Pick the output format from an `Accept` header.
///
/// Media ranges are ranked by `q` (ties keep header order); the first one the server
/// can produce wins. Without XML support, or when nothing matches, the answer is JSON.
///
/// ```
/// use ember::{negotiate, Format};
///
/// assert_eq!(negotiate(Some("application/xml"), true), Format::Xml);
/// assert_eq!(negotiate(Some("application/xml"), false), Format::Json);
/// assert_eq!(negotiate(Some("application/xml;q=0.5, application/json"), true), Format::Json);
/// ```
pub fn negotiate(accept: Option<&str>, xml_enabled: bool) -> Format {
    let Some(accept) = accept.filter(|_| xml_enabled) else {
        return Format::Json;
    };

    let mut ranges: Vec<(&str, f32)> = accept
        .split(',')
        .filter_map(|range| {
            let mut parts = range.split(';');
            let media = parts.next()?.trim();
            let q = parts
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            (!media.is_empty() && q > 0.0).then_some((media, q))
        })
        .collect();
    ranges.sort_by(|a, b| b.1.total_cmp(&a.1));

    ranges
        .iter()
        .find_map(|(media, _)| match media.to_ascii_lowercase().as_str() {
            "application/xml" | "text/xml" => Some(Format::Xml),
            "application/json" | "application/*" | "*/*" => Some(Format::Json),
            _ => None,
        })
        .unwrap_or(Format::Json)
}

fn format_for(req: &HttpRequest, cfg: &ServerConfig) -> Format {
    negotiate(req.get_header("accept"), cfg.xml)
}

/// Write a handler's successful result.
pub(crate) fn send_success<R: ResponseBody>(
    req: &HttpRequest,
    writer: &mut ResponseWriter,
    status: u16,
    result: &R,
    cfg: &ServerConfig,
) {
    if writer.is_written() {
        debug!(request_id = %req.request_id, "Handler wrote its own response");
        return;
    }

    if let (Some(template), Some(renderer)) = (R::template_name(), cfg.templates.as_ref()) {
        let rendered = serde_json::to_value(result)
            .map_err(anyhow::Error::from)
            .and_then(|data| renderer.render(template, &data));
        match rendered {
            Ok(html) => {
                writer.write(status, HTML, html);
            }
            Err(e) => send_error(req, writer, (cfg.error_handler)(e), cfg),
        }
        return;
    }

    if R::is_unit() {
        writer.write_empty(status);
        return;
    }

    let value = match serde_json::to_value(result) {
        Ok(value) => value,
        Err(e) => {
            error!(request_id = %req.request_id, error = %e, "Failed to serialize response");
            send_error(req, writer, HttpError::internal("cannot serialize response"), cfg);
            return;
        }
    };

    if let Some(serializer) = &cfg.serializer {
        if let Err(e) = serializer(req, writer, status, &value) {
            send_error(req, writer, (cfg.error_handler)(e), cfg);
        }
        return;
    }

    if let Value::String(text) = &value {
        writer.write(status, TEXT, text.as_str());
        return;
    }

    match format_for(req, cfg) {
        Format::Xml => {
            let root = R::schema_name().unwrap_or("response");
            match to_xml(result, Some(root)) {
                Some(xml) => {
                    writer.write(status, XML, xml);
                }
                None => {
                    writer.write(status, JSON, value.to_string());
                }
            }
        }
        Format::Json => {
            writer.write(status, JSON, value.to_string());
        }
    }
}

/// Write a normalized error using the request's negotiated format.
pub(crate) fn send_error(req: &HttpRequest, writer: &mut ResponseWriter, err: HttpError, cfg: &ServerConfig) {
    if err.status >= 500 {
        error!(request_id = %req.request_id, status = err.status, error = %err.message, "Request failed");
    } else {
        debug!(request_id = %req.request_id, status = err.status, error = %err.message, "Request rejected");
    }

    if let Some(serializer) = &cfg.error_serializer {
        serializer(req, writer, &err);
        return;
    }

    if format_for(req, cfg) == Format::Xml {
        if let Some(xml) = to_xml(&err, None) {
            writer.write(err.status, XML, xml);
            return;
        }
    }
    match serde_json::to_vec(&err) {
        Ok(body) => {
            writer.write(err.status, JSON, body);
        }
        Err(e) => {
            error!(error = %e, "Failed to serialize error response");
            writer.write(err.status, TEXT, err.message);
        }
    }
}

fn to_xml<T: Serialize + ?Sized>(value: &T, root: Option<&str>) -> Option<String> {
    let encoded = match root {
        Some(root) => quick_xml::se::to_string_with_root(root, value),
        None => quick_xml::se::to_string(value),
    };
    encoded
        .map_err(|e| warn!(error = %e, "XML encoding failed, falling back to JSON"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldError;
    use crate::schema::ToSchema;
    use http::Method;
    use serde_json::json;

    #[derive(Serialize, ToSchema)]
    struct Item {
        name: String,
    }

    fn xml_config() -> ServerConfig {
        ServerConfig {
            xml: true,
            ..ServerConfig::default()
        }
    }

    fn get(accept: &str) -> HttpRequest {
        HttpRequest::new(Method::GET, "/").with_header("accept", accept)
    }

    #[test]
    fn test_negotiate() {
        assert_eq!(negotiate(None, true), Format::Json);
        assert_eq!(negotiate(Some("*/*"), true), Format::Json);
        assert_eq!(negotiate(Some("text/html, text/xml;q=0.9"), true), Format::Xml);
        assert_eq!(negotiate(Some("application/xml;q=0"), true), Format::Json);
        assert_eq!(negotiate(Some("image/png"), true), Format::Json);
    }

    #[test]
    fn test_json_success() {
        let mut writer = ResponseWriter::new();
        let item = Item { name: "salt".into() };
        send_success(&get("application/json"), &mut writer, 201, &item, &xml_config());
        let response = writer.into_response();
        assert_eq!(response.status, 201);
        assert_eq!(response.get_header("content-type"), Some(JSON));
        assert_eq!(response.body_json().unwrap(), json!({"name": "salt"}));
    }

    #[test]
    fn test_xml_success_uses_shape_name_as_root() {
        let mut writer = ResponseWriter::new();
        let item = Item { name: "salt".into() };
        send_success(&get("application/xml"), &mut writer, 200, &item, &xml_config());
        let response = writer.into_response();
        assert_eq!(response.get_header("content-type"), Some(XML));
        assert_eq!(response.body_str(), "<Item><name>salt</name></Item>");
    }

    #[test]
    fn test_strings_are_plain_text() {
        let mut writer = ResponseWriter::new();
        send_success(&get("*/*"), &mut writer, 200, &"hello".to_string(), &ServerConfig::default());
        let response = writer.into_response();
        assert_eq!(response.get_header("content-type"), Some(TEXT));
        assert_eq!(response.body_str(), "hello");
    }

    #[test]
    fn test_existing_write_wins() {
        let mut writer = ResponseWriter::new();
        writer.write(202, TEXT, "mine");
        send_success(&get("*/*"), &mut writer, 200, &Item { name: "x".into() }, &ServerConfig::default());
        assert_eq!(writer.into_response().body_str(), "mine");
    }

    #[test]
    fn test_xml_error_shape() {
        let mut writer = ResponseWriter::new();
        send_error(&get("application/xml"), &mut writer, HttpError::not_found("gone"), &xml_config());
        let response = writer.into_response();
        assert_eq!(response.status, 404);
        assert_eq!(response.body_str(), "<HttpError><error>gone</error></HttpError>");
    }

    #[test]
    fn test_json_error_lists_fields() {
        let mut writer = ResponseWriter::new();
        let err = HttpError::bad_request("validation failed").with_errors(vec![FieldError::new("Name", "is required")]);
        send_error(&get("application/json"), &mut writer, err, &ServerConfig::default());
        assert_eq!(
            writer.into_response().body_json().unwrap(),
            json!({"error": "validation failed", "errors": [{"name": "Name", "reason": "is required"}]})
        );
    }

    #[test]
    fn test_custom_serializer_overrides() {
        let cfg = ServerConfig {
            serializer: Some(std::sync::Arc::new(|_req: &HttpRequest, w: &mut ResponseWriter, status: u16, v: &Value| {
                w.write(status, "application/vnd.custom", format!("custom:{v}"));
                Ok::<(), anyhow::Error>(())
            })),
            ..ServerConfig::default()
        };
        let mut writer = ResponseWriter::new();
        send_success(&get("*/*"), &mut writer, 200, &Item { name: "x".into() }, &cfg);
        assert_eq!(writer.into_response().body_str(), r#"custom:{"name":"x"}"#);
    }
}
