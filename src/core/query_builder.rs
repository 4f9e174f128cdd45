use serde::Serialize;

use crate::core::time_window::TimeWindow;
use crate::error::{QueryError, QueryResult};
use crate::models::filter::{Condition, InClause, OrderBy, QueryParam};
use crate::models::schema::TableKind;

pub const PLACEHOLDER: &str = "%s";
pub const WILDCARD: &str = "*";

/// 构建查询时的完整输入快照，每次变化都整体重建
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub table: TableKind,
    pub columns: Vec<String>,
    pub distinct: bool,
    pub conditions: Vec<Condition>,
    pub in_clause: Option<InClause>,
    pub time_window: Option<TimeWindow>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u64>,
}

impl QuerySpec {
    pub fn new(table: TableKind) -> Self {
        Self {
            table,
            columns: vec![WILDCARD.to_string()],
            distinct: false,
            conditions: Vec::new(),
            in_clause: None,
            time_window: None,
            order_by: None,
            limit: None,
        }
    }

    /// 结果集的列名，`*` 展开为整张表
    pub fn selected_columns(&self) -> Vec<String> {
        if self.columns.iter().any(|c| c == WILDCARD) {
            self.table.columns().iter().map(|c| c.to_string()).collect()
        } else {
            self.columns.clone()
        }
    }

    pub fn column_count(&self) -> usize {
        self.selected_columns().len()
    }

    pub fn window_is_valid(&self) -> bool {
        self.time_window.as_ref().is_some_and(TimeWindow::is_valid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

impl BuiltQuery {
    pub fn placeholder_count(&self) -> usize {
        self.sql.matches(PLACEHOLDER).count()
    }
}

fn check_column(table: TableKind, column: &str, role: &str) -> QueryResult<()> {
    if table.has_column(column) {
        Ok(())
    } else {
        Err(QueryError::Schema(format!(
            "{} column '{}' is not part of {}",
            role, column, table
        )))
    }
}

fn check_selection(spec: &QuerySpec) -> QueryResult<()> {
    if spec.columns.is_empty() {
        return Err(QueryError::Schema("no columns selected".to_string()));
    }
    if spec.columns.iter().any(|c| c == WILDCARD) {
        if spec.columns.len() != 1 {
            return Err(QueryError::Schema(
                "'*' cannot be combined with named columns".to_string(),
            ));
        }
    } else {
        for column in &spec.columns {
            check_column(spec.table, column, "selected")?;
        }
    }
    for condition in &spec.conditions {
        check_column(spec.table, &condition.column, "filter")?;
    }
    if let Some(in_clause) = &spec.in_clause {
        check_column(spec.table, &in_clause.column, "IN")?;
    }
    if let Some(order_by) = &spec.order_by {
        check_column(spec.table, &order_by.column, "ORDER BY")?;
    }
    Ok(())
}

/// 纯函数：QuerySpec -> (SQL 文本, 有序参数)，参数顺序与占位符从左到右一一对应
pub fn build_query(spec: &QuerySpec) -> QueryResult<BuiltQuery> {
    // 任何非法列都整体拒绝，不产出半截查询
    check_selection(spec)?;

    let mut sql = format!(
        "SELECT {}{} FROM {}",
        if spec.distinct { "DISTINCT " } else { "" },
        spec.columns.join(", "),
        spec.table.table_name()
    );
    let mut parts: Vec<String> = Vec::new();
    let mut params: Vec<QueryParam> = Vec::new();

    // A. 显式条件，按插入顺序
    for condition in &spec.conditions {
        parts.push(format!("{} {} {}", condition.column, condition.operator, PLACEHOLDER));
        params.push(condition.value.clone());
    }

    // B. 时间窗口，仅在 Valid 时生效
    if let Some((start, end)) = spec.time_window.as_ref().and_then(TimeWindow::bounds) {
        parts.push(format!(
            "{} BETWEEN {} AND {}",
            spec.table.time_column(),
            PLACEHOLDER,
            PLACEHOLDER
        ));
        params.push(QueryParam::Timestamp(start));
        params.push(QueryParam::Timestamp(end));
    }

    // C. IN 列表，空列表不生成子句
    if let Some(in_clause) = spec.in_clause.as_ref().filter(|c| !c.values.is_empty()) {
        let slots = vec![PLACEHOLDER; in_clause.values.len()].join(", ");
        parts.push(format!("{} IN ({})", in_clause.column, slots));
        params.extend(in_clause.values.iter().cloned());
    }

    if !parts.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&parts.join(" AND "));
    }

    if let Some(order_by) = &spec.order_by {
        sql.push_str(&format!(" ORDER BY {} {}", order_by.column, order_by.direction.as_sql()));
    }

    if let Some(limit) = spec.limit.filter(|n| *n > 0) {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    Ok(BuiltQuery { sql, params })
}
