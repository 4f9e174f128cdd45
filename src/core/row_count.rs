use tracing::debug;

use crate::core::query_builder::BuiltQuery;
use crate::error::QueryResult;
use crate::infra::backend::BackendSession;

pub fn wrap_count_query(sql: &str) -> String {
    format!("SELECT COUNT(*) FROM ({}) AS sub_query", sql)
}

/// 用 COUNT(*) 子查询统计总行数，参数列表原样复用主查询构建出的那一份
pub async fn estimate<S: BackendSession>(session: &mut S, query: &BuiltQuery) -> QueryResult<u64> {
    let count_sql = wrap_count_query(&query.sql);
    let total = session.count(&count_sql, &query.params).await?;
    debug!("结果总行数: {}", total);
    Ok(total)
}
