use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::api::error_response;
use crate::core::session::QuerySession;
use crate::core::validator::parse_timestamp;
use crate::error::ValidationError;
use crate::models::context::{
    ConditionRequest, ConditionView, OptionsRequest, RemoveConditionsRequest, SessionView,
    WindowRequest,
};
use crate::models::filter::Operator;
use crate::models::schema::TableKind;
use crate::state::AppState;

pub fn session_view(session: &QuerySession) -> SessionView {
    let window = session.window();
    let (query, query_error) = match session.build_query() {
        Ok(built) => (Some(built), None),
        Err(e) => (None, Some(e.to_string())),
    };
    SessionView {
        table: session.table().to_string(),
        window_state: window.state(),
        window_label: window.state().label(),
        max_span_days: window.max_span_days(),
        conditions: session
            .conditions()
            .conditions()
            .iter()
            .map(|c| ConditionView {
                id: c.id,
                display: c.display(),
            })
            .collect(),
        columns: session.columns().to_vec(),
        distinct: session.distinct(),
        order_by: session.order_by().cloned(),
        limit: session.limit(),
        in_clause: session.in_clause().cloned(),
        query,
        query_error,
    }
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(table): Path<TableKind>,
) -> impl IntoResponse {
    let session = state.session(table).lock().await;
    Json(session_view(&session))
}

pub async fn validate_window(
    State(state): State<Arc<AppState>>,
    Path(table): Path<TableKind>,
    Json(payload): Json<WindowRequest>,
) -> impl IntoResponse {
    let (start, end) = match (parse_timestamp(&payload.start), parse_timestamp(&payload.end)) {
        (Some(start), Some(end)) => (start, end),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Timestamps must look like 'YYYY-MM-DD HH:MM:SS'" })),
            )
                .into_response()
        }
    };

    let mut session = state.session(table).lock().await;
    session.validate_time_window(start, end);
    Json(session_view(&session)).into_response()
}

pub async fn add_condition(
    State(state): State<Arc<AppState>>,
    Path(table): Path<TableKind>,
    Json(payload): Json<ConditionRequest>,
) -> impl IntoResponse {
    let operator = match payload.operator.parse::<Operator>() {
        Ok(op) => op,
        Err(e) => return error_response(e.into()),
    };

    let mut session = state.session(table).lock().await;
    match session.add_condition(&payload.column, operator, &payload.value) {
        Ok(_) => (StatusCode::CREATED, Json(session_view(&session))).into_response(),
        Err(e) => error_response(e.into()),
    }
}

pub async fn remove_conditions(
    State(state): State<Arc<AppState>>,
    Path(table): Path<TableKind>,
    Json(payload): Json<RemoveConditionsRequest>,
) -> impl IntoResponse {
    let mut session = state.session(table).lock().await;
    let removed = session.remove_conditions(&payload.ids);
    Json(json!({
        "removed": removed,
        "session": session_view(&session),
    }))
}

/// 在副本上应用全部选项，任一项失败时会话保持原样
fn apply_options(session: &QuerySession, options: OptionsRequest) -> Result<QuerySession, ValidationError> {
    let mut next = session.clone();
    next.set_distinct(options.distinct);
    next.set_order_by(options.order_by);
    next.set_limit(options.limit);
    match &options.in_clause {
        Some(in_clause) => next.set_in_clause(in_clause.column.as_deref(), &in_clause.values)?,
        None => next.set_in_clause(None, "")?,
    }
    next.set_columns(options.columns);
    Ok(next)
}

pub async fn set_options(
    State(state): State<Arc<AppState>>,
    Path(table): Path<TableKind>,
    Json(payload): Json<OptionsRequest>,
) -> impl IntoResponse {
    let mut session = state.session(table).lock().await;
    match apply_options(&session, payload) {
        Ok(next) => {
            *session = next;
            Json(session_view(&session)).into_response()
        }
        Err(e) => error_response(e.into()),
    }
}

pub async fn preview_query(
    State(state): State<Arc<AppState>>,
    Path(table): Path<TableKind>,
) -> impl IntoResponse {
    let session = state.session(table).lock().await;
    match session.build_query() {
        Ok(built) => Json(built).into_response(),
        Err(e) => error_response(e),
    }
}
