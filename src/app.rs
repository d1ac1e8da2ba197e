use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, expenses};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(expenses::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn login(app: &Router, username: &str) -> String {
        let creds = json!({ "username": username, "password": "correct horse" });
        let (status, _) = call(app, Method::POST, "/api/v1/auth/signup", None, Some(creds.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = call(app, Method::POST, "/api/v1/auth/login", None, Some(creds)).await;
        assert_eq!(status, StatusCode::OK);
        body["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake().await);
        let res = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn expense_flow_ends_with_logout() {
        let app = build_app(AppState::fake().await);
        let token = login(&app, "alice").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/expenses",
            Some(&token),
            Some(json!({ "date": "2025-01-15", "category": "Transport", "amount": 50.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_i64().unwrap();

        let (status, body) = call(&app, Method::GET, "/api/v1/expenses", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["id"], id);
        assert_eq!(body[0]["date"], "2025-01-15");

        let (status, body) = call(
            &app,
            Method::GET,
            "/api/v1/expenses/summary?year=2025&month=1",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 50.0);
        assert_eq!(body["by_category"]["Transport"]["percentage"], 100.0);

        let (status, _) = call(&app, Method::GET, "/api/v1/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&app, Method::POST, "/api/v1/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = call(&app, Method::GET, "/api/v1/expenses", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "authentication required");
    }

    #[tokio::test]
    async fn anonymous_requests_are_unauthorized() {
        let app = build_app(AppState::fake().await);
        let (status, _) = call(&app, Method::GET, "/api/v1/dashboard", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(&app, Method::GET, "/api/v1/categories", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "fixed");
    }

    #[tokio::test]
    async fn other_users_rows_look_missing() {
        let app = build_app(AppState::fake().await);
        let alice = login(&app, "alice").await;
        let bob = login(&app, "bob").await;

        let (_, body) = call(
            &app,
            Method::POST,
            "/api/v1/expenses",
            Some(&alice),
            Some(json!({ "date": "2025-01-01", "category": "Food", "amount": 20.0 })),
        )
        .await;
        let uri = format!("/api/v1/expenses/{}", body["id"]);

        let (status, _) = call(&app, Method::DELETE, &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, Method::DELETE, &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn signup_conflicts_and_bad_input() {
        let app = build_app(AppState::fake().await);
        let token = login(&app, "alice").await;

        let creds = json!({ "username": "alice", "password": "another pass" });
        let (status, _) = call(&app, Method::POST, "/api/v1/auth/signup", None, Some(creds)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/expenses",
            Some(&token),
            Some(json!({ "date": "2025-01-01", "category": "Food", "amount": -3.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let wrong = json!({ "username": "alice", "password": "wrong password" });
        let (status, _) = call(&app, Method::POST, "/api/v1/auth/login", None, Some(wrong)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refresh_follows_the_session() {
        let app = build_app(AppState::fake().await);
        let creds = json!({ "username": "alice", "password": "correct horse" });
        call(&app, Method::POST, "/api/v1/auth/signup", None, Some(creds.clone())).await;
        let (_, body) = call(&app, Method::POST, "/api/v1/auth/login", None, Some(creds)).await;
        let access = body["access_token"].as_str().unwrap().to_string();
        let refresh = body["refresh_token"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], "alice");
        let renewed = body["access_token"].as_str().unwrap().to_string();
        let (status, _) = call(&app, Method::GET, "/api/v1/me", Some(&renewed), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": access })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&app, Method::POST, "/api/v1/auth/logout", Some(&renewed), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "authentication required");
    }

    #[tokio::test]
    async fn session_is_checked_before_input() {
        let app = build_app(AppState::fake().await);

        for uri in [
            "/api/v1/expenses/summary?from=garbage",
            "/api/v1/expenses/top?to=2025-13-40",
            "/api/v1/expenses?days=abc",
            "/api/v1/reports/monthly",
        ] {
            let (status, body) = call(&app, Method::GET, uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body["error"], "authentication required", "{uri}");
        }

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/expenses",
            None,
            Some(json!({ "date": "2025-01-01" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&app, Method::DELETE, "/api/v1/expenses/abc", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_input_gets_a_json_error() {
        let app = build_app(AppState::fake().await);
        let token = login(&app, "alice").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/expenses",
            Some(&token),
            Some(json!({ "date": "2025-01-01" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("category"));

        let (status, body) =
            call(&app, Method::GET, "/api/v1/expenses?days=abc", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) =
            call(&app, Method::GET, "/api/v1/reports/monthly", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = call(
            &app,
            Method::GET,
            "/api/v1/expenses/summary?from=garbage",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "invalid date `garbage`, expected YYYY-MM-DD");

        let (status, body) =
            call(&app, Method::DELETE, "/api/v1/expenses/abc", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "alice" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}
