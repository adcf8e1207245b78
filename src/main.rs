//! Waitlist signup API.
//!
//! A small HTTP service that registers waitlist signups with a hosted
//! contact directory and tracks referral badge milestones:
//!
//! 1. **Signup**: validate the email, upsert a contact with a derived
//!    referral code and link, send a confirmation email.
//!
//! 2. **Referral credit**: when a signup carries a referral code, look up
//!    the referring contact and bump their referral count, awarding badge
//!    tiers (bronze/silver/gold) as milestones are crossed.
//!
//! The directory is the only system of record — this service stores
//! nothing and holds no state between requests.

mod config;
mod directory;
mod referral;
mod signup;

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::WaitlistConfig;
use signup::{SignupError, SignupRequest, SignupService};

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "waitlist-api", version, about = "Waitlist signup and referral badge API")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8080, env = "WAITLIST_PORT")]
    port: u16,

    /// Contact directory API key
    #[arg(long, env = "DIRECTORY_API_KEY")]
    api_key: Option<String>,

    /// Transactional template id for the signup confirmation email
    #[arg(long, env = "CONFIRMATION_TEMPLATE_ID")]
    confirmation_template_id: Option<String>,

    /// Transactional template id for the badge milestone email
    #[arg(long, env = "BADGE_TEMPLATE_ID")]
    badge_template_id: Option<String>,

    /// Contact directory API base URL
    #[arg(
        long,
        default_value = "https://app.loops.so/api/v1",
        env = "DIRECTORY_URL"
    )]
    directory_url: String,

    /// Public site URL that referral links point at
    #[arg(long, default_value = "http://localhost:3000", env = "SITE_URL")]
    site_url: String,
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waitlist_api=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = WaitlistConfig {
        api_key: args.api_key,
        confirmation_template_id: args.confirmation_template_id,
        badge_template_id: args.badge_template_id,
        directory_url: args.directory_url,
        site_url: args.site_url,
    };

    if !config.enabled() {
        tracing::warn!("No directory API key configured — signups will be refused");
    }
    if config.confirmation_template_id.is_none() {
        tracing::warn!("No confirmation template configured — signups won't send email");
    }

    let app = router(SignupService::new(config));

    let addr = format!("0.0.0.0:{}", args.port);
    tracing::info!("Waitlist API starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server error");
}

/// Build the application router.
fn router(service: SignupService) -> Router {
    // The landing page posts directly from the browser, so every response
    // carries permissive CORS headers and preflights answer 200.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route(
            "/api/waitlist",
            post(signup_handler)
                .options(preflight_handler)
                .fallback(method_not_allowed),
        )
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

// ── Route Handlers ────────────────────────────────────────────────────────────

/// Register a waitlist signup.
///
/// POST /api/waitlist
/// Body: { "email": "...", "referredBy": "ABC1234" }
async fn signup_handler(
    State(service): State<SignupService>,
    Json(request): Json<SignupRequest>,
) -> impl IntoResponse {
    match service.signup(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(SignupError::InvalidEmail) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Valid email required" })),
        )
            .into_response(),
        Err(SignupError::NotConfigured) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Waitlist service not configured" })),
        )
            .into_response(),
        Err(SignupError::Upstream(e)) => {
            tracing::error!(error = %e, "Contact create failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to join waitlist. Please try again." })),
            )
                .into_response()
        }
    }
}

/// Bare OPTIONS requests (no preflight headers) bypass the CORS layer and
/// land here; answer 200 with an empty body either way.
async fn preflight_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Any verb other than POST/OPTIONS on the signup route.
async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
}

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "waitlist-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
