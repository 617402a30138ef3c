//! HTTP server and routes.

mod handlers;
mod state;

pub use state::AppState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let max_upload = state.config.storage.max_upload_bytes;

    let auth_routes = Router::new()
        .route("/register", post(handlers::auth_register))
        .route("/login", post(handlers::auth_login))
        .route("/logout", post(handlers::auth_logout))
        .route("/me", get(handlers::auth_me));

    let book_routes = Router::new()
        .route("/", get(handlers::books_list))
        .route("/", post(handlers::books_upload))
        .route("/{id}", get(handlers::book_metadata))
        .route("/{id}", delete(handlers::book_delete))
        .route("/{id}/download", get(handlers::book_download))
        .route("/{id}/page", get(handlers::book_page))
        .route("/{id}/bookmark", get(handlers::bookmark_get))
        .route("/{id}/bookmark", put(handlers::bookmark_set))
        .route("/{id}/bookmark", delete(handlers::bookmark_delete));

    Router::new()
        .route("/", get(handlers::index))
        .nest("/api/auth", auth_routes)
        .nest("/api/books", book_routes)
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
