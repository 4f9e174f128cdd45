use chrono::NaiveDateTime;
use tracing::info;

use crate::core::conditions::ConditionStore;
use crate::core::query_builder::{build_query, BuiltQuery, QuerySpec, WILDCARD};
use crate::core::time_window::{TimeWindow, WindowState};
use crate::core::validator::ColumnValueValidator;
use crate::error::{QueryResult, ValidationError};
use crate::models::filter::{split_in_values, Condition, ConditionId, InClause, Operator, OrderBy};
use crate::models::schema::TableKind;

/// 每张表一个查询会话：持有该表的条件集合、时间窗口以及查询选项
#[derive(Debug, Clone)]
pub struct QuerySession {
    table: TableKind,
    window: TimeWindow,
    conditions: ConditionStore,
    validator: ColumnValueValidator,
    columns: Vec<String>,
    distinct: bool,
    in_clause: Option<InClause>,
    order_by: Option<OrderBy>,
    limit: Option<u64>,
}

impl QuerySession {
    pub fn new(table: TableKind, max_span_days: i64) -> Self {
        Self {
            table,
            window: TimeWindow::new(max_span_days),
            conditions: ConditionStore::new(table),
            validator: ColumnValueValidator::new(table),
            columns: vec![WILDCARD.to_string()],
            distinct: false,
            in_clause: None,
            order_by: None,
            limit: None,
        }
    }

    pub fn table(&self) -> TableKind {
        self.table
    }

    pub fn window(&self) -> &TimeWindow {
        &self.window
    }

    pub fn conditions(&self) -> &ConditionStore {
        &self.conditions
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn distinct(&self) -> bool {
        self.distinct
    }

    pub fn in_clause(&self) -> Option<&InClause> {
        self.in_clause.as_ref()
    }

    pub fn order_by(&self) -> Option<&OrderBy> {
        self.order_by.as_ref()
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn validate_time_window(&mut self, start: NaiveDateTime, end: NaiveDateTime) -> WindowState {
        let state = self.window.validate(start, end);
        info!("{} 时间窗口校验结果: {:?}", self.table, state);
        state
    }

    pub fn add_condition(
        &mut self,
        column: &str,
        operator: Operator,
        raw_value: &str,
    ) -> Result<Condition, ValidationError> {
        let condition = self.conditions.add(&self.window, column, operator, raw_value)?;
        info!("{} 新增过滤条件: {}", self.table, condition.display());
        Ok(condition)
    }

    pub fn remove_conditions(&mut self, ids: &[ConditionId]) -> usize {
        self.conditions.remove_many(ids)
    }

    /// 列选择变化后，排序列与 IN 列只能取自已选列
    pub fn set_columns(&mut self, columns: Vec<String>) {
        self.columns = columns;
        if self.columns.iter().any(|c| c == WILDCARD) {
            return;
        }
        let selected = &self.columns;
        if self.order_by.as_ref().is_some_and(|o| !selected.contains(&o.column)) {
            self.order_by = None;
        }
        if self.in_clause.as_ref().is_some_and(|c| !selected.contains(&c.column)) {
            self.in_clause = None;
        }
    }

    pub fn set_distinct(&mut self, distinct: bool) {
        self.distinct = distinct;
    }

    pub fn set_order_by(&mut self, order_by: Option<OrderBy>) {
        self.order_by = order_by;
    }

    /// 0 表示不限制
    pub fn set_limit(&mut self, limit: Option<u64>) {
        self.limit = limit.filter(|n| *n > 0);
    }

    /// 解析逗号分隔的 IN 值；列为空或没有值时清除 IN 子句
    pub fn set_in_clause(&mut self, column: Option<&str>, raw_values: &str) -> Result<(), ValidationError> {
        let Some(column) = column.filter(|c| !c.is_empty()) else {
            self.in_clause = None;
            return Ok(());
        };
        let values = split_in_values(raw_values)
            .iter()
            .map(|v| self.validator.validate(column, v))
            .collect::<Result<Vec<_>, _>>()?;

        self.in_clause = if values.is_empty() {
            None
        } else {
            Some(InClause {
                column: column.to_string(),
                values,
            })
        };
        Ok(())
    }

    pub fn snapshot(&self) -> QuerySpec {
        QuerySpec {
            table: self.table,
            columns: self.columns.clone(),
            distinct: self.distinct,
            conditions: self.conditions.conditions().to_vec(),
            in_clause: self.in_clause.clone(),
            time_window: Some(self.window.clone()),
            order_by: self.order_by.clone(),
            limit: self.limit,
        }
    }

    pub fn build_query(&self) -> QueryResult<BuiltQuery> {
        build_query(&self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::filter::{QueryParam, SortDirection};
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn end_to_end_job_query() {
        let mut session = QuerySession::new(TableKind::JobData, 180);
        assert_eq!(
            session.validate_time_window(at(2024, 1, 1), at(2024, 1, 10)),
            WindowState::Valid
        );
        session.add_condition("account", Operator::Eq, "GROUP12").unwrap();

        let built = session.build_query().unwrap();
        assert_eq!(
            built.sql,
            "SELECT * FROM job_data WHERE account = %s AND start_time BETWEEN %s AND %s"
        );
        let params: Vec<String> = built.params.iter().map(ToString::to_string).collect();
        assert_eq!(params, vec!["GROUP12", "2024-01-01 00:00:00", "2024-01-10 00:00:00"]);
    }

    #[test]
    fn conditions_need_a_valid_window() {
        let mut session = QuerySession::new(TableKind::HostData, 31);
        assert_eq!(
            session.add_condition("host", Operator::Eq, "NODE1").unwrap_err(),
            ValidationError::WindowNotValidated
        );
        session.validate_time_window(at(2024, 1, 1), at(2024, 3, 1));
        assert_eq!(session.window().state(), WindowState::WindowTooLarge);
        assert!(session.add_condition("host", Operator::Eq, "NODE1").is_err());
    }

    #[test]
    fn invalid_window_keeps_conditions_but_drops_between() {
        let mut session = QuerySession::new(TableKind::HostData, 31);
        session.validate_time_window(at(2024, 1, 1), at(2024, 1, 2));
        session.add_condition("event", Operator::Eq, "nfs").unwrap();
        session.validate_time_window(at(2024, 1, 5), at(2024, 1, 2));

        let built = session.build_query().unwrap();
        assert_eq!(built.sql, "SELECT * FROM host_data WHERE event = %s");
        assert_eq!(built.params, vec![QueryParam::Text("nfs".into())]);
    }

    #[test]
    fn in_clause_values_are_validated_per_column() {
        let mut session = QuerySession::new(TableKind::HostData, 31);
        session.set_in_clause(Some("host"), "node1, NODE2,").unwrap();
        let clause = session.in_clause().unwrap();
        assert_eq!(
            clause.values,
            vec![QueryParam::Text("NODE1".into()), QueryParam::Text("NODE2".into())]
        );

        assert!(session.set_in_clause(Some("host"), "NODE1,server9").is_err());
        // 校验失败不改变已有状态
        assert_eq!(session.in_clause().unwrap().values.len(), 2);

        session.set_in_clause(Some("host"), "  ").unwrap();
        assert!(session.in_clause().is_none());
        session.set_in_clause(None, "NODE1").unwrap();
        assert!(session.in_clause().is_none());
    }

    #[test]
    fn narrowing_columns_drops_foreign_order_and_in_columns() {
        let mut session = QuerySession::new(TableKind::JobData, 180);
        session.set_order_by(Some(OrderBy {
            column: "ncores".into(),
            direction: SortDirection::Desc,
        }));
        session.set_in_clause(Some("queue"), "gpu,debug").unwrap();

        session.set_columns(vec!["jid".into(), "queue".into()]);
        assert!(session.order_by().is_none());
        assert_eq!(session.in_clause().unwrap().column, "queue");
    }

    #[test]
    fn zero_limit_means_unlimited() {
        let mut session = QuerySession::new(TableKind::JobData, 180);
        session.set_limit(Some(0));
        assert_eq!(session.limit(), None);
        session.set_limit(Some(25));
        assert!(session.build_query().unwrap().sql.ends_with("LIMIT 25"));
    }

    #[test]
    fn removing_conditions_keeps_params_aligned() {
        let mut session = QuerySession::new(TableKind::JobData, 180);
        session.validate_time_window(at(2024, 1, 1), at(2024, 1, 10));
        let a = session.add_condition("ncores", Operator::Gte, "4").unwrap();
        session.add_condition("queue", Operator::Eq, "gpu").unwrap();
        let c = session.add_condition("username", Operator::Eq, "user3").unwrap();
        session.set_in_clause(Some("jid"), "JOB1,JOB2").unwrap();

        assert_eq!(session.remove_conditions(&[a.id, c.id]), 2);
        let built = session.build_query().unwrap();
        assert_eq!(built.placeholder_count(), built.params.len());
        assert_eq!(built.params[0], QueryParam::Text("gpu".into()));
        assert_eq!(
            built.sql,
            "SELECT * FROM job_data WHERE queue = %s AND start_time BETWEEN %s AND %s AND jid IN (%s, %s)"
        );
    }
}
