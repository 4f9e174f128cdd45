use futures_util::TryStreamExt;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{Connection, MySql, MySqlConnection, PgConnection, Postgres, Row};
use std::ops::ControlFlow;
use tracing::{debug, info};

use crate::core::query_builder::PLACEHOLDER;
use crate::error::{QueryError, QueryResult};
use crate::infra::backend::{BackendSession, RowBatch, TabularQueryBackend};
use crate::infra::config::DatabaseConfig;
use crate::infra::rows::{column_names, mysql_row_to_json, pg_row_to_json};
use crate::models::filter::QueryParam;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Postgres,
    MySql,
}

impl BackendKind {
    pub fn parse(db_type: &str) -> Option<Self> {
        match db_type.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(BackendKind::Postgres),
            "mysql" => Some(BackendKind::MySql),
            _ => None,
        }
    }
}

/// 把构建器输出的 `%s` 占位符翻译成目标数据库的位置参数写法
pub fn render_placeholders(sql: &str, kind: BackendKind) -> String {
    let mut out = String::with_capacity(sql.len() + 16);
    let mut rest = sql;
    let mut index = 0;
    while let Some(pos) = rest.find(PLACEHOLDER) {
        out.push_str(&rest[..pos]);
        index += 1;
        match kind {
            BackendKind::Postgres => out.push_str(&format!("${}", index)),
            BackendKind::MySql => out.push('?'),
        }
        rest = &rest[pos + PLACEHOLDER.len()..];
    }
    out.push_str(rest);
    out
}

/// 按配置选择的关系型后端
#[derive(Debug, Clone)]
pub enum DynamicBackend {
    Postgres { url: String },
    MySql { url: String },
    /// 凭据缺失时仍可启动服务，但每次执行都会以连接错误结束
    Unconfigured { reason: String },
}

impl DynamicBackend {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        match (&config.url, config.kind) {
            (Some(url), BackendKind::Postgres) => DynamicBackend::Postgres { url: url.clone() },
            (Some(url), BackendKind::MySql) => DynamicBackend::MySql { url: url.clone() },
            (None, _) => DynamicBackend::Unconfigured {
                reason: "One or more database credentials are missing from the environment variables."
                    .to_string(),
            },
        }
    }
}

pub enum DynamicSession {
    Postgres(PgConnection),
    MySql(MySqlConnection),
}

impl TabularQueryBackend for DynamicBackend {
    type Session = DynamicSession;

    async fn connect(&self) -> QueryResult<DynamicSession> {
        let connect_err = |e: sqlx::Error| QueryError::Connection(e.to_string());
        match self {
            DynamicBackend::Postgres { url } => {
                let conn = PgConnection::connect(url).await.map_err(connect_err)?;
                info!("已建立 Postgres 连接");
                Ok(DynamicSession::Postgres(conn))
            }
            DynamicBackend::MySql { url } => {
                let conn = MySqlConnection::connect(url).await.map_err(connect_err)?;
                info!("已建立 MySQL 连接");
                Ok(DynamicSession::MySql(conn))
            }
            DynamicBackend::Unconfigured { reason } => Err(QueryError::Connection(reason.clone())),
        }
    }
}

fn bind_pg<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [QueryParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            QueryParam::Text(s) => query.bind(s.as_str()),
            QueryParam::Number(n) => query.bind(*n),
            QueryParam::Timestamp(ts) => query.bind(*ts),
        };
    }
    query
}

fn bind_mysql<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [QueryParam],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            QueryParam::Text(s) => query.bind(s.as_str()),
            QueryParam::Number(n) => query.bind(*n),
            QueryParam::Timestamp(ts) => query.bind(*ts),
        };
    }
    query
}

impl BackendSession for DynamicSession {
    async fn count(&mut self, sql: &str, params: &[QueryParam]) -> QueryResult<u64> {
        let total: i64 = match self {
            DynamicSession::Postgres(conn) => {
                let sql = render_placeholders(sql, BackendKind::Postgres);
                let row = bind_pg(sqlx::query(&sql), params)
                    .fetch_one(&mut *conn)
                    .await
                    .map_err(QueryError::backend)?;
                row.try_get(0).map_err(QueryError::backend)?
            }
            DynamicSession::MySql(conn) => {
                let sql = render_placeholders(sql, BackendKind::MySql);
                let row = bind_mysql(sqlx::query(&sql), params)
                    .fetch_one(&mut *conn)
                    .await
                    .map_err(QueryError::backend)?;
                row.try_get(0).map_err(QueryError::backend)?
            }
        };
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn fetch_batches<F>(
        &mut self,
        sql: &str,
        params: &[QueryParam],
        chunk_size: usize,
        mut on_batch: F,
    ) -> QueryResult<()>
    where
        F: FnMut(RowBatch) -> QueryResult<ControlFlow<()>> + Send,
    {
        let chunk_size = chunk_size.max(1);
        let mut batch = RowBatch::default();

        match self {
            DynamicSession::Postgres(conn) => {
                let sql = render_placeholders(sql, BackendKind::Postgres);
                let mut rows = bind_pg(sqlx::query(&sql), params).fetch(&mut *conn);
                while let Some(row) = rows.try_next().await.map_err(QueryError::backend)? {
                    if batch.columns.is_empty() {
                        batch.columns = column_names(&row);
                    }
                    batch.rows.push(pg_row_to_json(&row));
                    if batch.len() >= chunk_size && on_batch(std::mem::take(&mut batch))?.is_break() {
                        debug!("调用方提前终止拉取");
                        return Ok(());
                    }
                }
            }
            DynamicSession::MySql(conn) => {
                let sql = render_placeholders(sql, BackendKind::MySql);
                let mut rows = bind_mysql(sqlx::query(&sql), params).fetch(&mut *conn);
                while let Some(row) = rows.try_next().await.map_err(QueryError::backend)? {
                    if batch.columns.is_empty() {
                        batch.columns = column_names(&row);
                    }
                    batch.rows.push(mysql_row_to_json(&row));
                    if batch.len() >= chunk_size && on_batch(std::mem::take(&mut batch))?.is_break() {
                        debug!("调用方提前终止拉取");
                        return Ok(());
                    }
                }
            }
        }

        // 最后一批不足 chunk_size 的行
        if !batch.is_empty() {
            on_batch(batch)?;
        }
        Ok(())
    }

    async fn close(self) -> QueryResult<()> {
        let closed = match self {
            DynamicSession::Postgres(conn) => conn.close().await,
            DynamicSession::MySql(conn) => conn.close().await,
        };
        closed.map_err(|e| QueryError::Connection(e.to_string()))
    }
}
