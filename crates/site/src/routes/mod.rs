//! HTTP route handlers for the site API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                         - Liveness check
//! GET  /health/ready                   - Readiness check (database ping)
//!
//! # Auth
//! POST /api/auth/signup                - Create an account
//! POST /api/auth/login                 - Password sign-in
//! POST /api/auth/logout                - Sign out and drop the session
//! GET  /api/auth/session               - Current session info
//!
//! # Account (requires auth)
//! GET  /api/account/profile            - Profile
//! PUT  /api/account/profile            - Update profile
//! GET  /api/account/subscriptions      - Cached subscription rows
//! GET  /api/account/access             - Per-category access dashboard
//!
//! # Catalog and purchases
//! GET  /api/products                   - Static product catalog
//! POST /api/checkout                   - Start a hosted checkout
//!
//! # Chat
//! GET  /api/chat                       - Conversation state
//! POST /api/chat/send                  - Send a message
//!
//! # Lookups
//! GET  /api/postal/{cep}               - CEP address lookup
//! GET  /api/tables/{category}/search   - Tax-table search (gated)
//!
//! # Support
//! POST /api/support                    - Contact form ticket
//! ```

pub mod account;
pub mod auth;
pub mod chat;
pub mod checkout;
pub mod postal;
pub mod products;
pub mod support;
pub mod tables;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/session", get(auth::session_info))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(account::profile).put(account::update_profile),
        )
        .route("/subscriptions", get(account::subscriptions))
        .route("/access", get(account::access_overview))
}

/// Create the chat routes router.
pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(chat::conversation))
        .route("/send", post(chat::send))
}

/// Create all routes for the site.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(health_ready))
        .nest("/api/auth", auth_routes())
        .nest("/api/account", account_routes())
        .route("/api/products", get(products::index))
        .route("/api/checkout", post(checkout::create))
        .nest("/api/chat", chat_routes())
        .route("/api/postal/{cep}", get(postal::lookup))
        .route("/api/tables/{category}/search", get(tables::search))
        .route("/api/support", post(support::submit))
}

/// Liveness check.
async fn health() -> &'static str {
    "ok"
}

/// Readiness check: verifies the database pool answers.
async fn health_ready(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").execute(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::error!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
