use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::ValidationError;
use crate::models::filter::{QueryParam, TIMESTAMP_FORMAT};
use crate::models::schema::TableKind;

pub const EVENT_VALUES: &[&str] = &[
    "cpuuser",
    "block",
    "memused",
    "memused_minus_diskcache",
    "gpu_usage",
    "nfs",
];

pub const UNIT_VALUES: &[&str] = &[
    "CPU %",
    "GPU %",
    "GB:memused",
    "GB:memused_minus_diskcache",
    "GB/s",
    "MB/s",
];

pub const QUEUE_VALUES: &[&str] = &[
    "standard",
    "wholenode",
    "shared",
    "highmem",
    "gpu",
    "benchmarking",
    "wide",
    "debug",
    "gpu-debug",
];

pub const EXITCODE_VALUES: &[&str] = &["TIMEOUT", "COMPLETED", "CANCELLED", "FAILED", "NODE_FAIL"];

#[derive(Debug, Clone, Copy)]
pub enum ColumnRule {
    /// 逗号分隔的 `PREFIX<digits>` 列表，不区分大小写，统一转大写
    IdentifierList(&'static str),
    Numeric,
    OneOf(&'static [&'static str]),
    Timestamp,
    FreeText,
}

// 列名 -> 校验规则，新增列只需要在这里加一行
static COLUMN_RULES: LazyLock<HashMap<&'static str, ColumnRule>> = LazyLock::new(|| {
    HashMap::from([
        ("jid", ColumnRule::IdentifierList("JOB")),
        ("jobname", ColumnRule::IdentifierList("JOBNAME")),
        ("host", ColumnRule::IdentifierList("NODE")),
        ("host_list", ColumnRule::IdentifierList("NODE")),
        ("username", ColumnRule::IdentifierList("USER")),
        ("account", ColumnRule::IdentifierList("GROUP")),
        ("ncores", ColumnRule::Numeric),
        ("ngpus", ColumnRule::Numeric),
        ("nhosts", ColumnRule::Numeric),
        ("timelimit", ColumnRule::Numeric),
        ("runtime", ColumnRule::Numeric),
        ("node_hrs", ColumnRule::Numeric),
        ("value", ColumnRule::Numeric),
        ("diff", ColumnRule::Numeric),
        ("arc", ColumnRule::Numeric),
        ("event", ColumnRule::OneOf(EVENT_VALUES)),
        ("unit", ColumnRule::OneOf(UNIT_VALUES)),
        ("queue", ColumnRule::OneOf(QUEUE_VALUES)),
        ("exitcode", ColumnRule::OneOf(EXITCODE_VALUES)),
        ("time", ColumnRule::Timestamp),
        ("submit_time", ColumnRule::Timestamp),
        ("start_time", ColumnRule::Timestamp),
        ("end_time", ColumnRule::Timestamp),
    ])
});

static IDENTIFIER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]+)(\d+)$").expect("identifier pattern is valid"));

pub fn rule_for(column: &str) -> ColumnRule {
    COLUMN_RULES.get(column).copied().unwrap_or(ColumnRule::FreeText)
}

/// 按列校验并规范化用户输入，纯函数，无副作用
#[derive(Debug, Clone, Copy)]
pub struct ColumnValueValidator {
    table: TableKind,
}

impl ColumnValueValidator {
    pub fn new(table: TableKind) -> Self {
        Self { table }
    }

    pub fn validate(&self, column: &str, raw: &str) -> Result<QueryParam, ValidationError> {
        if !self.table.has_column(column) {
            return Err(ValidationError::UnknownColumn {
                table: self.table.to_string(),
                column: column.to_string(),
            });
        }
        match rule_for(column) {
            ColumnRule::IdentifierList(prefix) => identifier_list(column, prefix, raw),
            ColumnRule::Numeric => numeric(column, raw),
            ColumnRule::OneOf(allowed) => one_of(column, allowed, raw),
            ColumnRule::Timestamp => timestamp(column, raw),
            ColumnRule::FreeText => free_text(column, raw),
        }
    }
}

fn invalid(column: &str, message: String) -> ValidationError {
    ValidationError::InvalidValue {
        column: column.to_string(),
        message,
    }
}

fn identifier_list(column: &str, prefix: &str, raw: &str) -> Result<QueryParam, ValidationError> {
    let mut tokens = Vec::new();
    for token in raw.split(',') {
        let token = token.trim().to_uppercase();
        let matches_prefix = IDENTIFIER_TOKEN
            .captures(&token)
            .is_some_and(|cap| &cap[1] == prefix);
        if !matches_prefix {
            return Err(invalid(
                column,
                format!(
                    "Error: For '{}', value must be a comma-separated list of strings starting with '{}' followed by one or more digits.",
                    column, prefix
                ),
            ));
        }
        tokens.push(token);
    }
    Ok(QueryParam::Text(tokens.join(",")))
}

fn numeric(column: &str, raw: &str) -> Result<QueryParam, ValidationError> {
    raw.trim().parse::<f64>().map(QueryParam::Number).map_err(|_| {
        invalid(
            column,
            format!("Error: For '{}', value must be a number (including decimals).", column),
        )
    })
}

fn one_of(column: &str, allowed: &[&str], raw: &str) -> Result<QueryParam, ValidationError> {
    if allowed.contains(&raw) {
        Ok(QueryParam::Text(raw.to_string()))
    } else {
        Err(invalid(
            column,
            format!("Error: For '{}', value must be one of: {}.", column, allowed.join(", ")),
        ))
    }
}

fn timestamp(column: &str, raw: &str) -> Result<QueryParam, ValidationError> {
    parse_timestamp(raw).map(QueryParam::Timestamp).ok_or_else(|| {
        invalid(
            column,
            format!(
                "Error: For '{}', value must be a timestamp like '2024-01-01 00:00:00'.",
                column
            ),
        )
    })
}

fn free_text(column: &str, raw: &str) -> Result<QueryParam, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(invalid(column, format!("Error: For '{}', value must not be empty.", column)));
    }
    Ok(QueryParam::Text(value.to_string()))
}

/// 支持 `YYYY-MM-DD HH:MM:SS`、`YYYY-MM-DDTHH:MM:SS` 以及只有日期的写法
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
