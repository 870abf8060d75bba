use std::time::Duration;

use tracing::{debug, info};

use super::Middleware;
use crate::server::{HttpRequest, HttpResponse, ResponseWriter};

/// Logs every request on the way in and its status and latency on the way out.
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn before(&self, req: &mut HttpRequest) -> Option<HttpResponse> {
        debug!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.path,
            "Request received"
        );
        None
    }

    fn after(&self, req: &HttpRequest, res: &mut ResponseWriter, latency: Duration) {
        info!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.path,
            status = res.status(),
            latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
            "Request completed"
        );
    }
}
