mod common;

use common::{json, operation, post_json, tags};
use ember::security::{LoginPayload, SecurityProvider, TokenResponse};
use ember::{Context, HttpError, HttpRequest, Registrar, ResponseWriter, ServerBuilder};
use http::Method;
use serde_json::{json, Value};

struct DemoAuth;

impl SecurityProvider for DemoAuth {
    fn login(&self, ctx: &mut Context<'_, LoginPayload>) -> anyhow::Result<TokenResponse> {
        let body = ctx.body();
        if body.user == "ada" && body.password == "lovelace" {
            ctx.append_header("set-cookie", "jwt_token=token-ada; Path=/; HttpOnly");
            Ok(TokenResponse {
                token: "token-ada".to_string(),
            })
        } else {
            Err(HttpError::unauthorized("invalid credentials").into())
        }
    }

    fn refresh(&self, req: &HttpRequest, res: &mut ResponseWriter) {
        match ember::security::token_from_request(req) {
            Some(token) => {
                res.write(200, "application/json", json!({ "token": format!("{token}-refreshed") }).to_string());
            }
            None => {
                res.write(401, "application/json", r#"{"error":"missing token"}"#);
            }
        }
    }

    fn claims(&self, token: &str) -> anyhow::Result<Value> {
        match token.strip_prefix("token-") {
            Some(user) => Ok(json!({ "sub": user })),
            None => Err(HttpError::unauthorized("bad token").into()),
        }
    }
}

fn server() -> ember::Server {
    let server = ServerBuilder::new().with_auto_auth(DemoAuth).build();
    server.get("/me", |ctx: &mut Context<'_, ()>| {
        let claims = ctx
            .claims()
            .cloned()
            .ok_or_else(|| HttpError::unauthorized("login required"))?;
        Ok(claims)
    });
    server
}

#[test]
fn test_auth_routes_are_documented() {
    let server = server();
    for (method, path, summary) in [
        ("POST", "/auth/login", "Login"),
        ("POST", "/auth/logout", "Logout"),
        ("POST", "/auth/refresh", "Refresh token"),
    ] {
        let op = operation(&server, method, path);
        assert_eq!(tags(&op), vec!["Auth"], "{path}");
        assert_eq!(op["summary"], summary, "{path}");
    }
}

#[test]
fn test_login() {
    let server = server();
    let response = post_json(&server, "/auth/login", r#"{"user":"ada","password":"lovelace"}"#);
    assert_eq!(response.status, 200);
    assert_eq!(json(&response), json!({"token": "token-ada"}));
    assert!(response.get_header("set-cookie").unwrap().starts_with("jwt_token=token-ada"));

    let response = post_json(&server, "/auth/login", r#"{"user":"ada","password":"nope"}"#);
    assert_eq!(response.status, 401);

    let response = post_json(&server, "/auth/login", r#"{"user":"ada"}"#);
    assert_eq!(response.status, 400);
}

#[test]
fn test_claims_from_header_or_cookie() {
    let server = server();

    let response = server.handle(HttpRequest::new(Method::GET, "/me").with_header("Authorization", "Bearer token-ada"));
    assert_eq!(response.status, 200);
    assert_eq!(json(&response), json!({"sub": "ada"}));

    let response = server.handle(HttpRequest::new(Method::GET, "/me").with_header("Cookie", "jwt_token=token-bob"));
    assert_eq!(json(&response), json!({"sub": "bob"}));

    let response = server.handle(HttpRequest::new(Method::GET, "/me").with_header("Authorization", "Bearer forged"));
    assert_eq!(response.status, 401);

    let response = server.handle(HttpRequest::new(Method::GET, "/me"));
    assert_eq!(response.status, 401);
}

#[test]
fn test_logout_and_refresh() {
    let server = server();

    let response = server.handle(HttpRequest::new(Method::POST, "/auth/logout"));
    assert_eq!(response.status, 200);
    assert!(response.get_header("set-cookie").unwrap().contains("Max-Age=0"));

    let response = server.handle(
        HttpRequest::new(Method::POST, "/auth/refresh").with_header("Authorization", "Bearer token-ada"),
    );
    assert_eq!(json(&response), json!({"token": "token-ada-refreshed"}));

    let response = server.handle(HttpRequest::new(Method::POST, "/auth/refresh"));
    assert_eq!(response.status, 401);
}

#[test]
fn test_no_auth_routes_without_provider() {
    let server = ServerBuilder::new().build();
    assert!(server.openapi_spec().operation("POST", "/auth/login").is_none());
}
