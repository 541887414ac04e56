// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{FromRequest, FromRequestParts},
    http::HeaderName,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::AuthenticatedUser,
    error::{ApiError, ErrorBody},
    models::{
        Amount, BalanceResponse, BalanceTransactionRequest, BalanceTransactionResponse,
        CreateTransactionRequest, LoginRequest, LoginResponse, MessageResponse, RefreshRequest,
        RegisterRequest, TokenResponse, TransactionResponse, UpdateTransactionStatusRequest,
        UpdateTransactionStatusResponse, UserResponse, WalletTransactionResponse,
    },
    state::AppState,
    storage::{Direction, TransactionStatus, TransactionType},
};

pub mod auth;
pub mod balance;
pub mod health;
pub mod transactions;

/// JSON body extractor whose rejections render as [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejections render as [`ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

pub fn router(state: AppState) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");

    let user_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/balance", get(balance::get_balance))
        .route("/balance/history", get(balance::history))
        .route("/topup", post(balance::process_balance_transaction))
        .route(
            "/transactions",
            get(transactions::list_transactions).post(transactions::create_transaction),
        )
        .route(
            "/transactions/status",
            put(transactions::update_transaction_status),
        )
        .route(
            "/transactions/{reference}",
            get(transactions::get_transaction),
        );

    Router::new()
        .route("/health", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/user/v1", user_routes)
        .fallback(|| async { ApiError::not_found("Route not found") })
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::liveness,
        health::readiness,
        auth::register,
        auth::login,
        auth::refresh,
        auth::logout,
        auth::me,
        balance::get_balance,
        balance::process_balance_transaction,
        balance::history,
        transactions::create_transaction,
        transactions::list_transactions,
        transactions::update_transaction_status,
        transactions::get_transaction
    ),
    components(
        schemas(
            Amount,
            AuthenticatedUser,
            BalanceResponse,
            BalanceTransactionRequest,
            BalanceTransactionResponse,
            CreateTransactionRequest,
            Direction,
            ErrorBody,
            LoginRequest,
            LoginResponse,
            MessageResponse,
            RefreshRequest,
            RegisterRequest,
            TokenResponse,
            TransactionResponse,
            TransactionStatus,
            TransactionType,
            UpdateTransactionStatusRequest,
            UpdateTransactionStatusResponse,
            UserResponse,
            WalletTransactionResponse,
            health::HealthResponse,
            health::ReadyResponse
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Users", description = "Registration, login and token sessions"),
        (name = "Balance", description = "Wallet balance and direct CREDIT/DEBIT"),
        (name = "Transactions", description = "Top-up, purchase and refund lifecycle")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn register_and_login(app: &Router) -> (u64, String, String) {
        let (status, user) = send(
            app,
            Method::POST,
            "/user/v1/register",
            None,
            Some(json!({
                "username": "alice",
                "password": "secret1",
                "email": "a@x.com",
                "phone_number": "0811",
                "address": "Jl. A",
                "dob": "1990-01-01"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(user.get("password").is_none());
        assert!(user.get("password_hash").is_none());

        let (status, login) = send(
            app,
            Method::POST,
            "/user/v1/login",
            None,
            Some(json!({"username": "alice", "password": "secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        (
            login["user"]["id"].as_u64().unwrap(),
            login["access_token"].as_str().unwrap().to_string(),
            login["refresh_token"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn wallet_scenario_end_to_end() {
        let (state, _dir) = test_state();
        let app = router(state);
        let (user_id, token, _) = register_and_login(&app).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/user/v1/topup",
            Some(&token),
            Some(json!({"amount": 100, "wallet_transaction_type": "CREDIT", "reference": "topup-1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"], "100");

        let (status, body) = send(
            &app,
            Method::POST,
            "/user/v1/topup",
            Some(&token),
            Some(json!({"amount": "150", "wallet_transaction_type": "DEBIT", "reference": "buy-1"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error_code"], "insufficient_funds");

        let (_, body) = send(&app, Method::GET, "/user/v1/balance", Some(&token), None).await;
        assert_eq!(body["balance"], "100");

        let (status, body) = send(
            &app,
            Method::POST,
            "/user/v1/transactions",
            Some(&token),
            Some(json!({
                "amount": 50,
                "transaction_type": "PURCHASE",
                "reference": "ref-1",
                "description": "coffee beans",
                "metadata": {"order_id": 77, "items": ["beans"]}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "PENDING");
        assert_eq!(body["user_id"], user_id);
        assert_eq!(body["metadata"]["order_id"], 77);

        let (status, body) = send(
            &app,
            Method::PUT,
            "/user/v1/transactions/status",
            Some(&token),
            Some(json!({"reference": "ref-1", "status": "SUCCESS"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["changed"], true);
        assert_eq!(body["transaction"]["status"], "SUCCESS");
        assert_eq!(body["wallet_transaction"]["direction"], "DEBIT");
        assert_eq!(body["wallet_transaction"]["amount"], "50");
        assert_eq!(body["wallet_transaction"]["reference"], "ref-1");

        let (_, body) = send(&app, Method::GET, "/user/v1/balance", Some(&token), None).await;
        assert_eq!(body["balance"], "50");

        let (_, history) = send(
            &app,
            Method::GET,
            "/user/v1/balance/history?limit=10",
            Some(&token),
            None,
        )
        .await;
        let history = history.as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["reference"], "ref-1");
        assert_eq!(history[1]["reference"], "topup-1");

        let (status, body) = send(
            &app,
            Method::GET,
            "/user/v1/transactions/ref-1",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "SUCCESS");
    }

    #[tokio::test]
    async fn protected_routes_require_a_live_session() {
        let (state, _dir) = test_state();
        let app = router(state);

        let (status, body) = send(&app, Method::GET, "/user/v1/balance", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "missing_auth_header");

        let (_, token, refresh) = register_and_login(&app).await;
        let (status, _) = send(&app, Method::GET, "/user/v1/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, Method::POST, "/user/v1/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, Method::GET, "/user/v1/balance", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            &app,
            Method::POST,
            "/user/v1/refresh",
            None,
            Some(json!({"refresh_token": refresh})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "invalid_or_expired_token");
    }

    #[tokio::test]
    async fn malformed_input_is_a_bad_request() {
        let (state, _dir) = test_state();
        let app = router(state);
        let (_, token, _) = register_and_login(&app).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/user/v1/topup",
            Some(&token),
            Some(json!({"amount": "ten", "wallet_transaction_type": "CREDIT", "reference": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "invalid_body");

        let (status, body) = send(
            &app,
            Method::POST,
            "/user/v1/topup",
            Some(&token),
            Some(json!({"amount": 0, "wallet_transaction_type": "CREDIT", "reference": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "invalid_amount");

        let (status, body) = send(
            &app,
            Method::POST,
            "/user/v1/topup",
            Some(&token),
            Some(json!({"amount": "1e5000000", "wallet_transaction_type": "CREDIT", "reference": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "invalid_amount");

        let (status, body) = send(
            &app,
            Method::POST,
            "/user/v1/transactions",
            Some(&token),
            Some(json!({
                "amount": "0.000000001",
                "transaction_type": "TOPUP",
                "reference": "tiny",
                "description": "too precise"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "invalid_amount");

        let (status, body) = send(&app, Method::GET, "/user/v1/balance", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"], "0");

        let (status, _) = send(
            &app,
            Method::GET,
            "/user/v1/transactions?limit=lots",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_endpoints_and_docs() {
        let (state, _dir) = test_state();
        let app = router(state);

        let (status, body) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send(&app, Method::GET, "/health/ready", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["store"], "ok");
        assert_eq!(body["checks"]["cache"], "ok");

        let (status, doc) = send(&app, Method::GET, "/api-doc/openapi.json", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(doc["paths"]["/user/v1/topup"].is_object());
        assert!(doc["components"]["securitySchemes"]["bearer"].is_object());

        let (status, body) = send(&app, Method::GET, "/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_code"], "not_found");
    }
}
