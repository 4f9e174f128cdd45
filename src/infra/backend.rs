use serde_json::Value;
use std::ops::ControlFlow;

use crate::error::QueryResult;
use crate::models::filter::QueryParam;

/// 后端返回的一批行，每行是一个 JSON 对象
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Value>,
}

impl RowBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// 可互换的表格查询后端（Postgres、MySQL、测试用内存实现……）
#[allow(async_fn_in_trait)]
pub trait TabularQueryBackend {
    type Session: BackendSession;

    /// 每次执行建立一条新连接，不做连接池复用
    async fn connect(&self) -> QueryResult<Self::Session>;
}

#[allow(async_fn_in_trait)]
pub trait BackendSession {
    async fn count(&mut self, sql: &str, params: &[QueryParam]) -> QueryResult<u64>;

    /// 按 `chunk_size` 分批拉取结果，回调返回 `Break` 时立即停止
    async fn fetch_batches<F>(
        &mut self,
        sql: &str,
        params: &[QueryParam],
        chunk_size: usize,
        on_batch: F,
    ) -> QueryResult<()>
    where
        F: FnMut(RowBatch) -> QueryResult<ControlFlow<()>> + Send;

    async fn close(self) -> QueryResult<()>;
}
