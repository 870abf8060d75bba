//! # Authentication Hooks
//!
//! The server does not issue or verify tokens itself. A [`SecurityProvider`] supplies
//! the login/logout/refresh handlers and turns a token into claims; with
//! [`ServerBuilder::with_auto_auth`](crate::ServerBuilder::with_auto_auth) the server
//! registers:
//!
//! | Route | Handler |
//! |---|---|
//! | `POST /auth/login` | [`SecurityProvider::login`] (typed, [`LoginPayload`] → [`TokenResponse`]) |
//! | `POST /auth/logout` | [`SecurityProvider::logout`] |
//! | `POST /auth/refresh` | [`SecurityProvider::refresh`] |
//!
//! all tagged `Auth`, and installs [`TokenToContext`] as the outermost middleware.
//! Handlers read the claims with [`Context::claims`](crate::Context::claims).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::context::Context;
use crate::middleware::Middleware;
use crate::schema::ToSchema;
use crate::server::{HttpRequest, HttpResponse, ResponseWriter};

/// Cookie carrying the session token.
pub const TOKEN_COOKIE: &str = "jwt_token";

/// Verified token claims, stored in the request extensions.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims(pub Value);

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LoginPayload {
    #[schema(required, example = "admin")]
    pub user: String,
    #[schema(required, format = "password")]
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

/// Token issuance and verification, supplied by the application.
pub trait SecurityProvider: Send + Sync {
    /// Check credentials and issue a token. Failures should be
    /// [`HttpError::unauthorized`](crate::HttpError::unauthorized).
    fn login(&self, ctx: &mut Context<'_, LoginPayload>) -> anyhow::Result<TokenResponse>;

    /// Default: expire the token cookie.
    fn logout(&self, _req: &HttpRequest, res: &mut ResponseWriter) {
        res.append_header(
            "set-cookie",
            format!("{TOKEN_COOKIE}=; Path=/; Max-Age=0; HttpOnly; SameSite=Strict"),
        );
        res.write_empty(200);
    }

    /// Issue a fresh token for the token carried by `req`.
    fn refresh(&self, req: &HttpRequest, res: &mut ResponseWriter);

    /// Verify `token` and return its claims.
    fn claims(&self, token: &str) -> anyhow::Result<Value>;
}

/// Token from the session cookie, else from `Authorization: Bearer`.
pub fn token_from_request(req: &HttpRequest) -> Option<&str> {
    req.get_cookie(TOKEN_COOKIE)
        .filter(|t| !t.is_empty())
        .or_else(|| {
            req.get_header("authorization")
                .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
                .map(str::trim)
                .filter(|t| !t.is_empty())
        })
}

/// Attaches [`Claims`] to requests carrying a valid token. Requests without one
/// continue unauthenticated; handlers decide whether that is acceptable.
pub struct TokenToContext {
    provider: Arc<dyn SecurityProvider>,
}

impl TokenToContext {
    pub fn new(provider: Arc<dyn SecurityProvider>) -> Self {
        Self { provider }
    }
}

impl Middleware for TokenToContext {
    fn before(&self, req: &mut HttpRequest) -> Option<HttpResponse> {
        let claims = token_from_request(req).map(|token| self.provider.claims(token));
        match claims {
            Some(Ok(claims)) => {
                req.extensions.insert(Claims(claims));
            }
            Some(Err(e)) => {
                debug!(request_id = %req.request_id, error = %e, "Token rejected");
            }
            None => {}
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use serde_json::json;

    struct Fixed;

    impl SecurityProvider for Fixed {
        fn login(&self, _ctx: &mut Context<'_, LoginPayload>) -> anyhow::Result<TokenResponse> {
            Ok(TokenResponse { token: "t".into() })
        }

        fn refresh(&self, _req: &HttpRequest, res: &mut ResponseWriter) {
            res.write_empty(200);
        }

        fn claims(&self, token: &str) -> anyhow::Result<Value> {
            if token == "good" {
                Ok(json!({"sub": "ada"}))
            } else {
                anyhow::bail!("bad token")
            }
        }
    }

    #[test]
    fn test_token_sources() {
        let req = HttpRequest::new(Method::GET, "/").with_header("Authorization", "Bearer abc");
        assert_eq!(token_from_request(&req), Some("abc"));

        let req = HttpRequest::new(Method::GET, "/")
            .with_header("Authorization", "Bearer abc")
            .with_header("Cookie", "jwt_token=xyz");
        assert_eq!(token_from_request(&req), Some("xyz"));

        assert_eq!(token_from_request(&HttpRequest::new(Method::GET, "/")), None);
    }

    #[test]
    fn test_middleware_attaches_claims_only_for_valid_tokens() {
        let middleware = TokenToContext::new(Arc::new(Fixed));
        let mut req = HttpRequest::new(Method::GET, "/").with_header("Authorization", "Bearer good");
        assert!(middleware.before(&mut req).is_none());
        assert_eq!(req.extensions.get::<Claims>(), Some(&Claims(json!({"sub": "ada"}))));

        let mut req = HttpRequest::new(Method::GET, "/").with_header("Authorization", "Bearer bad");
        assert!(middleware.before(&mut req).is_none());
        assert!(req.extensions.get::<Claims>().is_none());
    }

    #[test]
    fn test_default_logout_expires_cookie() {
        let mut res = ResponseWriter::new();
        Fixed.logout(&HttpRequest::new(Method::POST, "/auth/logout"), &mut res);
        assert!(res.header("set-cookie").unwrap().contains("Max-Age=0"));
    }
}
