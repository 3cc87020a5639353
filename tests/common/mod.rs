// Common test utilities shared across the integration tests
// Everything runs against the in-memory store; no external services needed
#![allow(dead_code)]

use affiliate_backend::{
    app::AppState,
    app_config::{AffiliateConfig, JwtConfig},
    create_router,
    db::MemoryStore,
    models::{AccessTokenClaims, AffiliateProfile, ProductRef},
    services::{
        email::{AffiliateNotification, AffiliateNotifier, EmailError},
        JwtService,
    },
    utils::{CodeSource, RandomCodeSource},
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret-at-least-32-chars";
pub const WEBHOOK_SECRET: &str = "whsec-integration-test";
pub const SITE_URL: &str = "https://shop.test";

pub fn test_affiliate_config() -> AffiliateConfig {
    AffiliateConfig {
        site_url: SITE_URL.to_string(),
        minimum_payout: 5_000,
        order_webhook_secret: WEBHOOK_SECRET.to_string(),
        ..AffiliateConfig::default()
    }
}

pub fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret: JWT_SECRET.to_string(),
        audience: "authenticated".to_string(),
        issuer: "auth".to_string(),
        admin_role: "admin".to_string(),
    }
}

// =============================================================================
// TEST DOUBLES
// =============================================================================

/// Notifier that keeps every notification for assertions
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<AffiliateNotification>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<AffiliateNotification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.sent().iter().map(|n| n.kind()).collect()
    }
}

#[async_trait]
impl AffiliateNotifier for RecordingNotifier {
    async fn notify(&self, notification: AffiliateNotification) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(notification);
        if self.fail {
            return Err(EmailError::ServiceUnavailable);
        }
        Ok(())
    }
}

/// Always hands out the same code, forcing collisions after the first use
pub struct FixedCodeSource(pub String);

impl CodeSource for FixedCodeSource {
    fn next_code(&self, length: usize) -> String {
        self.0.chars().take(length).collect()
    }
}

// =============================================================================
// TEST APP
// =============================================================================

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(test_affiliate_config(), Arc::new(RandomCodeSource), RecordingNotifier::default())
    }

    pub fn with_code_source(code_source: Arc<dyn CodeSource>) -> Self {
        Self::build(test_affiliate_config(), code_source, RecordingNotifier::default())
    }

    pub fn with_notifier(notifier: RecordingNotifier) -> Self {
        Self::build(test_affiliate_config(), Arc::new(RandomCodeSource), notifier)
    }

    pub fn build(
        config: AffiliateConfig,
        code_source: Arc<dyn CodeSource>,
        notifier: RecordingNotifier,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(notifier);

        let state = AppState {
            affiliate_config: Arc::new(config),
            jwt_service: Arc::new(JwtService::new(&test_jwt_config())),
            store: store.clone(),
            catalog: store.clone(),
            notifier: notifier.clone(),
            code_source,
        };

        Self {
            app: create_router(state.clone()),
            state,
            store,
            notifier,
        }
    }

    pub fn post(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "POST", uri)
    }

    pub fn get(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "GET", uri)
    }

    pub fn patch(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "PATCH", uri)
    }

    /// Seed an active product in the catalog
    pub async fn seed_product(&self, id: &str, slug: Option<&str>) -> ProductRef {
        let product = ProductRef {
            id: id.to_string(),
            name: format!("Product {}", id),
            slug: slug.map(str::to_string),
            is_active: true,
        };
        self.store.insert_product(product.clone()).await;
        product
    }

    /// Seed an approved affiliate with the given code and balance
    pub async fn seed_affiliate(&self, code: &str, pending_earnings: i64) -> AffiliateProfile {
        let profile = approved_profile(Uuid::new_v4(), code, pending_earnings);
        self.store.insert_profile(profile.clone()).await;
        profile
    }
}

pub fn approved_profile(user_id: Uuid, code: &str, pending_earnings: i64) -> AffiliateProfile {
    let now = Utc::now();
    AffiliateProfile {
        user_id,
        email: format!("{}@affiliates.test", code.to_lowercase()),
        full_name: Some(format!("Affiliate {}", code)),
        status: "approved".to_string(),
        affiliate_code: Some(code.to_string()),
        commission_rate: 5,
        total_earnings: pending_earnings,
        pending_earnings,
        payment_method: "bank_transfer".to_string(),
        bank_details: None,
        applied_at: now,
        approved_at: Some(now),
        created_at: now,
        updated_at: now,
    }
}

// =============================================================================
// TOKENS
// =============================================================================

pub fn mint_token(user_id: Uuid, role: Option<&str>) -> String {
    let now = Utc::now().timestamp() as u64;
    let claims = AccessTokenClaims {
        sub: user_id.to_string(),
        email: Some(format!("{}@users.test", user_id.simple())),
        role: role.map(str::to_string),
        aud: "authenticated".to_string(),
        iss: "auth".to_string(),
        iat: now,
        exp: now + 3600,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn user_token(user_id: Uuid) -> String {
    mint_token(user_id, Some("authenticated"))
}

pub fn admin_token() -> String {
    mint_token(Uuid::new_v4(), Some("admin"))
}

// =============================================================================
// REQUESTS
// =============================================================================

pub struct TestRequest<'a> {
    app: &'a TestApp,
    method: &'static str,
    uri: String,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl<'a> TestRequest<'a> {
    fn new(app: &'a TestApp, method: &'static str, uri: &str) -> Self {
        Self {
            app,
            method,
            uri: uri.to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("authorization", &format!("Bearer {}", token))
    }

    pub fn webhook_secret(self) -> Self {
        self.header("x-webhook-secret", WEBHOOK_SECRET)
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = Some(serde_json::to_vec(body).unwrap());
        self.header("content-type", "application/json")
    }

    pub async fn send(self) -> TestResponse {
        let mut builder = Request::builder().method(self.method).uri(&self.uri);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let request = builder
            .body(self.body.map(Body::from).unwrap_or_else(Body::empty))
            .unwrap();

        let response = self.app.app.clone().oneshot(request).await.unwrap();
        TestResponse { response }
    }
}

pub struct TestResponse {
    response: Response<Body>,
}

impl TestResponse {
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub async fn json(self) -> serde_json::Value {
        let body = axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }
}
