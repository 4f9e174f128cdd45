use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::query_builder::{BuiltQuery, WILDCARD};
use crate::core::time_window::WindowState;
use crate::models::filter::{ConditionId, InClause, OrderBy};

#[derive(Debug, Deserialize)]
pub struct WindowRequest {
    pub start: String, // 起始时间，如 "2024-01-01 00:00:00"
    pub end: String,
}

#[derive(Debug, Deserialize)]
pub struct ConditionRequest {
    pub column: String,
    pub operator: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoveConditionsRequest {
    pub ids: Vec<ConditionId>,
}

#[derive(Debug, Deserialize)]
pub struct InClauseRequest {
    pub column: Option<String>,
    #[serde(default)]
    pub values: String, // 逗号分隔
}

/// 整体替换查询选项，缺省字段回到默认值
#[derive(Debug, Deserialize)]
pub struct OptionsRequest {
    #[serde(default = "all_columns")]
    pub columns: Vec<String>,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub order_by: Option<OrderBy>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub in_clause: Option<InClauseRequest>,
}

fn all_columns() -> Vec<String> {
    vec![WILDCARD.to_string()]
}

#[derive(Debug, Default, Deserialize)]
pub struct ExecuteRequest {
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct ConditionView {
    pub id: ConditionId,
    pub display: String,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub table: String,
    pub window_state: WindowState,
    pub window_label: &'static str,
    pub max_span_days: i64,
    pub conditions: Vec<ConditionView>,
    pub columns: Vec<String>,
    pub distinct: bool,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u64>,
    pub in_clause: Option<InClause>,
    pub query: Option<BuiltQuery>,
    pub query_error: Option<String>,
}
