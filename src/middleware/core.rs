use std::time::Duration;

use crate::server::{HttpRequest, HttpResponse, ResponseWriter};

/// Hook pair wrapped around a route.
///
/// `before` hooks run in registration order; returning a response short-circuits the
/// chain and the handler never runs. `after` hooks run in reverse order for every
/// layer whose `before` ran, so the first registered middleware sees the request
/// first and the response last.
pub trait Middleware: Send + Sync {
    fn before(&self, _req: &mut HttpRequest) -> Option<HttpResponse> {
        None
    }

    fn after(&self, _req: &HttpRequest, _res: &mut ResponseWriter, _latency: Duration) {}
}
