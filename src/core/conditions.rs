use std::collections::HashSet;

use crate::core::time_window::TimeWindow;
use crate::core::validator::ColumnValueValidator;
use crate::error::ValidationError;
use crate::models::filter::{Condition, ConditionId, Operator, QueryParam};
use crate::models::schema::TableKind;

/// 有序的过滤条件集合，插入顺序即 WHERE 子句顺序
#[derive(Debug, Clone)]
pub struct ConditionStore {
    validator: ColumnValueValidator,
    conditions: Vec<Condition>,
    next_id: u64,
}

impl ConditionStore {
    pub fn new(table: TableKind) -> Self {
        Self {
            validator: ColumnValueValidator::new(table),
            conditions: Vec::new(),
            next_id: 1,
        }
    }

    /// 时间窗口未通过校验时直接拒绝，不会调用列校验器
    pub fn add(
        &mut self,
        window: &TimeWindow,
        column: &str,
        operator: Operator,
        raw_value: &str,
    ) -> Result<Condition, ValidationError> {
        if !window.is_valid() {
            return Err(ValidationError::WindowNotValidated);
        }
        if !operator.is_condition_operator() {
            return Err(ValidationError::UnsupportedOperator(operator.to_string()));
        }
        let value = self.validator.validate(column, raw_value)?;

        let condition = Condition {
            id: ConditionId(self.next_id),
            column: column.to_string(),
            operator,
            value,
        };
        self.next_id += 1;
        self.conditions.push(condition.clone());
        Ok(condition)
    }

    /// 按稳定 id 删除，返回实际删除的条数；未知 id 忽略
    pub fn remove_many(&mut self, ids: &[ConditionId]) -> usize {
        let targets: HashSet<ConditionId> = ids.iter().copied().collect();
        let before = self.conditions.len();
        self.conditions.retain(|c| !targets.contains(&c.id));
        before - self.conditions.len()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// 每个条件贡献一个占位符和一个绑定值
    pub fn bound_values(&self) -> Vec<QueryParam> {
        self.conditions.iter().map(|c| c.value.clone()).collect()
    }

    pub fn to_display_strings(&self) -> Vec<String> {
        self.conditions.iter().map(Condition::display).collect()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}
