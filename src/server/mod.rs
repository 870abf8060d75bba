//! Transport layer: transport-independent request/response types and the
//! `may_minihttp` adapter that feeds them to a [`Server`](crate::Server).

pub mod request;
pub mod response;

mod http_server;
mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_request, HttpRequest};
pub use response::{status_reason, HttpResponse, ResponseWriter};
pub use service::AppService;
