use serde::Serialize;
use serde_json::Value;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument, warn};

use crate::core::planner::{row_byte_estimate, ChunkPlan, ChunkPlanner, Strategy};
use crate::core::query_builder::{build_query, BuiltQuery, QuerySpec};
use crate::core::row_count;
use crate::error::{QueryError, QueryResult, ValidationError};
use crate::infra::backend::{BackendSession, TabularQueryBackend};
use crate::infra::probe::ResourceProbe;
use crate::infra::sink::{ChunkSink, JsonLinesSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutionState {
    Fetching,
    Completed,
    PartiallyCompleted,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Value>,
}

/// 磁盘流式执行的产物：按批次顺序排列的分块文件
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChunkManifest {
    pub directory: PathBuf,
    pub files: Vec<PathBuf>,
    pub rows_written: u64,
    pub bytes_written: u64,
    /// 因磁盘余量不足提前结束时为 false
    pub complete: bool,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "strategy")]
pub enum ExecutionResult {
    InMemory(ResultTable),
    DiskStream(ChunkManifest),
}

impl ExecutionResult {
    pub fn state(&self) -> ExecutionState {
        match self {
            ExecutionResult::DiskStream(manifest) if !manifest.complete => {
                ExecutionState::PartiallyCompleted
            }
            _ => ExecutionState::Completed,
        }
    }
}

/// 每批结束后接收 (已拉取行数, 总行数)
pub trait ProgressSink {
    fn report(&mut self, done: u64, total: u64);
}

/// 以 debug 日志输出进度
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&mut self, done: u64, total: u64) {
        let percent = if total == 0 {
            100.0
        } else {
            done as f64 * 100.0 / total as f64
        };
        debug!("Fetching rows: {:.1}% ({}/{})", percent, done, total);
    }
}

pub struct ChunkedExecutor<'a, B, P> {
    backend: &'a B,
    probe: &'a P,
    planner: ChunkPlanner,
}

impl<'a, B, P> ChunkedExecutor<'a, B, P>
where
    B: TabularQueryBackend,
    P: ResourceProbe,
{
    pub fn new(backend: &'a B, probe: &'a P, planner: ChunkPlanner) -> Self {
        Self {
            backend,
            probe,
            planner,
        }
    }

    pub async fn execute<R>(
        &self,
        spec: &QuerySpec,
        output_dir: &Path,
        progress: &mut R,
    ) -> QueryResult<ExecutionResult>
    where
        R: ProgressSink + Send,
    {
        let mut sink = JsonLinesSink::new(output_dir);
        self.execute_with_sink(spec, &mut sink, progress).await
    }

    #[instrument(skip_all, fields(table = %spec.table))]
    pub async fn execute_with_sink<K, R>(
        &self,
        spec: &QuerySpec,
        sink: &mut K,
        progress: &mut R,
    ) -> QueryResult<ExecutionResult>
    where
        K: ChunkSink + Send,
        R: ProgressSink + Send,
    {
        if !spec.window_is_valid() {
            return Err(ValidationError::WindowNotValidated.into());
        }
        // 参数只构建一次，计数查询与主查询共用同一份
        let query = build_query(spec)?;
        let columns = spec.selected_columns();
        info!(state = ?ExecutionState::Fetching, sql = %query.sql, "开始执行查询");

        let mut session = match self.backend.connect().await {
            Ok(session) => session,
            Err(e) => {
                error!(state = ?ExecutionState::Failed, "连接失败: {}", e);
                return Err(e);
            }
        };

        let outcome = self.run(&mut session, &query, &columns, sink, progress).await;

        // 成功、失败、提前终止都要释放连接
        if let Err(e) = session.close().await {
            warn!("关闭连接失败: {}", e);
        }

        match &outcome {
            Ok(result) => info!(state = ?result.state(), "查询执行结束"),
            Err(e) => error!(state = ?ExecutionState::Failed, "查询执行失败: {}", e),
        }
        outcome
    }

    async fn run<S, K, R>(
        &self,
        session: &mut S,
        query: &BuiltQuery,
        columns: &[String],
        sink: &mut K,
        progress: &mut R,
    ) -> QueryResult<ExecutionResult>
    where
        S: BackendSession,
        K: ChunkSink + Send,
        R: ProgressSink + Send,
    {
        let total_rows = row_count::estimate(session, query).await?;
        let row_bytes = row_byte_estimate(columns.len());
        let plan = self
            .planner
            .plan(total_rows, self.probe.available_memory_bytes(), row_bytes);
        info!(
            total_rows = plan.total_rows,
            chunk_size = plan.chunk_size,
            strategy = ?plan.strategy,
            "分块计划已确定"
        );

        match plan.strategy {
            Strategy::InMemory => fetch_in_memory(session, query, columns, plan, progress)
                .await
                .map(ExecutionResult::InMemory),
            Strategy::DiskStream => {
                stream_to_disk(session, query, plan, row_bytes, self.probe, sink, progress)
                    .await
                    .map(ExecutionResult::DiskStream)
            }
        }
    }
}

async fn fetch_in_memory<S, R>(
    session: &mut S,
    query: &BuiltQuery,
    columns: &[String],
    plan: ChunkPlan,
    progress: &mut R,
) -> QueryResult<ResultTable>
where
    S: BackendSession,
    R: ProgressSink + Send,
{
    let mut table = ResultTable::default();
    let mut fetched = 0u64;

    session
        .fetch_batches(&query.sql, &query.params, plan.chunk_size as usize, |batch| {
            if table.columns.is_empty() {
                table.columns = batch.columns;
            }
            fetched += batch.rows.len() as u64;
            table.rows.extend(batch.rows);
            progress.report(fetched, plan.total_rows);
            Ok(ControlFlow::Continue(()))
        })
        .await?;

    // 空结果时后端拿不到列名，用查询选择的列补上
    if table.columns.is_empty() {
        table.columns = columns.to_vec();
    }
    Ok(table)
}

async fn stream_to_disk<S, P, K, R>(
    session: &mut S,
    query: &BuiltQuery,
    plan: ChunkPlan,
    row_bytes: u64,
    probe: &P,
    sink: &mut K,
    progress: &mut R,
) -> QueryResult<ChunkManifest>
where
    S: BackendSession,
    P: ResourceProbe,
    K: ChunkSink + Send,
    R: ProgressSink + Send,
{
    // 每次执行只探测一次磁盘余量，写入过程中不再重新探测
    let free_disk = probe.free_disk_space_bytes(sink.location()).ok_or_else(|| {
        QueryError::Io(format!(
            "cannot determine free disk space for {}",
            sink.location().display()
        ))
    })?;
    sink.prepare()?;
    let mut manifest = ChunkManifest {
        directory: sink.location().to_path_buf(),
        ..ChunkManifest::default()
    };
    let mut out_of_space = false;

    session
        .fetch_batches(&query.sql, &query.params, plan.chunk_size as usize, |batch| {
            let chunk_bytes = (batch.rows.len() as u64).saturating_mul(row_bytes);
            if manifest.bytes_written.saturating_add(chunk_bytes) >= free_disk {
                out_of_space = true;
                return Ok(ControlFlow::Break(()));
            }
            let written = sink.write_chunk(manifest.files.len(), &batch)?;
            manifest.bytes_written += written.bytes;
            manifest.rows_written += batch.rows.len() as u64;
            manifest.files.push(written.path);
            progress.report(manifest.rows_written, plan.total_rows);
            Ok(ControlFlow::Continue(()))
        })
        .await?;

    manifest.complete = !out_of_space;
    if out_of_space {
        let message = format!(
            "Insufficient disk space: stopped after {} of {} rows, {} chunk file(s) kept in {}",
            manifest.rows_written,
            plan.total_rows,
            manifest.files.len(),
            manifest.directory.display()
        );
        warn!("{}", message);
        manifest.warning = Some(message);
    }
    Ok(manifest)
}
