pub mod execute;
pub mod session;

use axum::{
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::QueryError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/tables/{table}/session", get(session::get_session))
        .route("/api/tables/{table}/window", post(session::validate_window))
        .route("/api/tables/{table}/conditions", post(session::add_condition))
        .route("/api/tables/{table}/conditions/remove", post(session::remove_conditions))
        .route("/api/tables/{table}/options", put(session::set_options))
        .route("/api/tables/{table}/query", get(session::preview_query))
        .route("/api/tables/{table}/execute", post(execute::execute_query))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub(crate) fn error_response(err: QueryError) -> Response {
    (err.status_code(), Json(json!({ "error": err.to_string() }))).into_response()
}
