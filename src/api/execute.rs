use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::core::executor::{ChunkedExecutor, ExecutionResult, ExecutionState, LogProgress};
use crate::core::query_builder::build_query;
use crate::error::QueryError;
use crate::infra::sink::resolve_output_dir;
use crate::models::context::ExecuteRequest;
use crate::models::schema::TableKind;
use crate::state::AppState;

pub async fn execute_query(
    State(state): State<Arc<AppState>>,
    Path(table): Path<TableKind>,
    Json(payload): Json<ExecuteRequest>,
) -> impl IntoResponse {
    let execution_id = Uuid::new_v4();
    let output_dir =
        match resolve_output_dir(&state.settings.output_dir, payload.output_dir.as_deref()) {
            Ok(dir) => dir,
            Err(e) => return failed(execution_id, e.into()),
        };

    // 执行期间持有会话锁，同一张表的修改操作要等执行结束
    let session = state.session(table).lock().await;
    let spec = session.snapshot();
    let sql = build_query(&spec).map(|q| q.sql).ok();
    info!("执行 {} ({}) -> {:?}", table, execution_id, output_dir);

    let executor = ChunkedExecutor::new(&state.backend, &state.probe, state.planner());
    let result = executor.execute(&spec, &output_dir, &mut LogProgress).await;
    drop(session);

    match result {
        Ok(ExecutionResult::InMemory(result_table)) => {
            let row_count = result_table.rows.len();
            Json(json!({
                "status": "success",
                "execution_id": execution_id,
                "state": ExecutionState::Completed,
                "strategy": "InMemory",
                "columns": result_table.columns,
                "data": result_table.rows,
                "meta": {
                    "sql": sql,
                    "row_count": row_count
                }
            }))
            .into_response()
        }
        Ok(ExecutionResult::DiskStream(manifest)) => {
            let (status, exec_state) = if manifest.complete {
                ("success", ExecutionState::Completed)
            } else {
                ("partial", ExecutionState::PartiallyCompleted)
            };
            let row_count = manifest.rows_written;
            Json(json!({
                "status": status,
                "execution_id": execution_id,
                "state": exec_state,
                "strategy": "DiskStream",
                "manifest": manifest,
                "meta": {
                    "sql": sql,
                    "row_count": row_count
                }
            }))
            .into_response()
        }
        Err(e) => failed(execution_id, e),
    }
}

fn failed(execution_id: Uuid, err: QueryError) -> Response {
    (
        err.status_code(),
        Json(json!({
            "error": err.to_string(),
            "execution_id": execution_id,
            "state": ExecutionState::Failed,
        })),
    )
        .into_response()
}
