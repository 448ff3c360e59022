//! Users/posts CRUD API that runs either as a standalone HTTP server or as a
//! serverless function fed by HTTP and queue events.

pub mod config;
pub mod db;
pub mod dispatch;
pub mod dto;
pub mod errors;
pub mod models;
pub mod notify;
pub mod queue;
pub mod routes;
pub mod states;

pub use states::AppState;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use routes::{diagnostics, health, post as posts, user as users};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Builds the full route table with its middleware.
///
/// The same router serves the standalone server and HTTP-shaped function
/// invocations.
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(health::health_check))
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/api/posts", get(posts::list_posts).post(posts::create_post))
        .route(
            "/api/posts/{id}",
            get(posts::get_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/api/posts/user/{user_id}", get(posts::list_posts_by_user))
        .route("/api/tests/send-mail", post(diagnostics::send_mail))
        .route("/api/tests/send-sqs", post(diagnostics::send_sqs))
        .fallback(errors::not_found)
        .method_not_allowed_fallback(errors::not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(errors::handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
}
