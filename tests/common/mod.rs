#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use telemetry_query::core::executor::ProgressSink;
use telemetry_query::core::query_builder::QuerySpec;
use telemetry_query::core::session::QuerySession;
use telemetry_query::error::{QueryError, QueryResult};
use telemetry_query::infra::backend::{BackendSession, RowBatch, TabularQueryBackend};
use telemetry_query::infra::probe::ResourceProbe;
use telemetry_query::models::filter::{Operator, QueryParam};
use telemetry_query::models::schema::TableKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    None,
    Connect,
    Fetch,
}

/// 内存表后端：记录连接的打开/关闭次数以及收到的每条 SQL
#[derive(Clone)]
pub struct MemoryBackend {
    columns: Vec<String>,
    rows: Vec<Value>,
    failure: Failure,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    pub statements: Arc<Mutex<Vec<(String, Vec<QueryParam>)>>>,
}

impl MemoryBackend {
    pub fn with_jobs(count: usize) -> Self {
        let rows = (1..=count)
            .map(|i| json!({ "jid": format!("JOB{}", i), "ncores": i as i64, "queue": "gpu" }))
            .collect();
        Self {
            columns: vec!["jid".into(), "ncores".into(), "queue".into()],
            rows,
            failure: Failure::None,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
            statements: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(mut self, failure: Failure) -> Self {
        self.failure = failure;
        self
    }

    pub fn rows(&self) -> &[Value] {
        &self.rows
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn statements(&self) -> Vec<(String, Vec<QueryParam>)> {
        self.statements.lock().unwrap().clone()
    }
}

pub struct MemorySession {
    backend: MemoryBackend,
}

impl MemorySession {
    fn record(&self, sql: &str, params: &[QueryParam]) {
        self.backend
            .statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
    }
}

impl TabularQueryBackend for MemoryBackend {
    type Session = MemorySession;

    async fn connect(&self) -> QueryResult<MemorySession> {
        if self.failure == Failure::Connect {
            return Err(QueryError::Connection("connection refused".into()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySession {
            backend: self.clone(),
        })
    }
}

impl BackendSession for MemorySession {
    async fn count(&mut self, sql: &str, params: &[QueryParam]) -> QueryResult<u64> {
        self.record(sql, params);
        Ok(self.backend.rows.len() as u64)
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
        self.record(sql, params);
        if self.backend.failure == Failure::Fetch {
            return Err(QueryError::BackendQuery("relation \"job_data\" does not exist".into()));
        }
        for chunk in self.backend.rows.chunks(chunk_size.max(1)) {
            let batch = RowBatch {
                columns: self.backend.columns.clone(),
                rows: chunk.to_vec(),
            };
            if on_batch(batch)?.is_break() {
                break;
            }
        }
        Ok(())
    }

    async fn close(self) -> QueryResult<()> {
        self.backend.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedProbe {
    pub memory: u64,
    pub disk: Option<u64>,
}

impl FixedProbe {
    pub fn roomy() -> Self {
        Self {
            memory: 1 << 40,
            disk: Some(1 << 40),
        }
    }

    /// 没有可用内存，强制走磁盘流式
    pub fn no_memory(disk: u64) -> Self {
        Self {
            memory: 0,
            disk: Some(disk),
        }
    }

    /// 找不到输出目录所在磁盘
    pub fn unknown_disk() -> Self {
        Self {
            memory: 0,
            disk: None,
        }
    }
}

impl ResourceProbe for FixedProbe {
    fn available_memory_bytes(&self) -> u64 {
        self.memory
    }

    fn free_disk_space_bytes(&self, _dir: &Path) -> Option<u64> {
        self.disk
    }
}

#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub reports: Vec<(u64, u64)>,
}

impl ProgressSink for RecordingProgress {
    fn report(&mut self, done: u64, total: u64) {
        self.reports.push((done, total));
    }
}

pub fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// job_data 上带有效窗口和一个条件的查询快照
pub fn job_spec() -> QuerySpec {
    let mut session = QuerySession::new(TableKind::JobData, 180);
    session.validate_time_window(at(2024, 1, 1), at(2024, 1, 10));
    session.add_condition("queue", Operator::Eq, "gpu").unwrap();
    session.snapshot()
}
