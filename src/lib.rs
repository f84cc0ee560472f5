pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod salesforce;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Token-bucket equivalent of 100 requests per 15 minutes: a burst of 100
/// with one slot replenished every 9 seconds.
const RATE_LIMIT_BURST: u32 = 100;
const RATE_LIMIT_REPLENISH: Duration = Duration::from_secs(9);

/// Build the full application router. Lives in the library so integration
/// tests can drive it in-process.
///
/// The auth and org route groups each sit behind their own rate limiter;
/// over-limit requests are answered with 429 before any handler runs.
pub fn app(state: AppState) -> Router {
    let rate_limiter = || {
        let config = GovernorConfigBuilder::default()
            .key_extractor(GlobalKeyExtractor)
            .period(RATE_LIMIT_REPLENISH)
            .burst_size(RATE_LIMIT_BURST)
            .finish()
            .expect("rate limiter configuration");
        GovernorLayer {
            config: Arc::new(config),
        }
    };

    Router::new()
        .merge(home_routes())
        .merge(auth_routes().layer(rate_limiter()))
        .merge(org_routes(state.clone()).layer(rate_limiter()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn home_routes() -> Router<AppState> {
    use handlers::home;

    Router::new()
        .route("/", get(home::home))
        .route("/health", get(home::health))
        .route("/dashboard", get(home::dashboard))
}

fn auth_routes() -> Router<AppState> {
    use handlers::auth;

    Router::new()
        .route("/login", get(auth::login_page).post(auth::login_post))
        .route("/signup", get(auth::signup_page).post(auth::signup_post))
        .route("/login/salesforce", get(auth::login_salesforce))
        .route("/auth/callback", get(auth::salesforce_callback))
        .route("/logout", get(auth::logout))
}

/// Routes behind the session middleware: an unauthenticated request is a
/// 401 before any registry lookup happens.
fn org_routes(state: AppState) -> Router<AppState> {
    use handlers::{accounts, orgs};

    Router::new()
        .route("/orgs", get(orgs::list).post(orgs::create))
        .route("/orgs/:org_id", get(orgs::show).delete(orgs::destroy))
        .route("/orgs/:org_id/connect", post(orgs::connect))
        .route("/accounts", post(accounts::create))
        .route("/accounts/:account_id", get(accounts::show))
        .layer(from_fn_with_state(state, middleware::require_auth))
}
