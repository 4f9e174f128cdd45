use tokio::sync::Mutex;

use crate::core::planner::ChunkPlanner;
use crate::core::session::QuerySession;
use crate::infra::config::Settings;
use crate::infra::db_external::DynamicBackend;
use crate::infra::probe::SystemProbe;
use crate::models::schema::TableKind;

pub struct AppState {
    pub settings: Settings,
    pub backend: DynamicBackend,
    pub probe: SystemProbe,
    // 每张表一个会话，界面操作与执行在同一把锁下串行
    host_session: Mutex<QuerySession>,
    job_session: Mutex<QuerySession>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let backend = DynamicBackend::from_config(&settings.database);
        Self {
            host_session: Mutex::new(QuerySession::new(
                TableKind::HostData,
                settings.max_span_days(TableKind::HostData),
            )),
            job_session: Mutex::new(QuerySession::new(
                TableKind::JobData,
                settings.max_span_days(TableKind::JobData),
            )),
            backend,
            probe: SystemProbe,
            settings,
        }
    }

    pub fn session(&self, table: TableKind) -> &Mutex<QuerySession> {
        match table {
            TableKind::HostData => &self.host_session,
            TableKind::JobData => &self.job_session,
        }
    }

    pub fn planner(&self) -> ChunkPlanner {
        ChunkPlanner::new(self.settings.target_chunk_count, self.settings.memory_safety_margin)
    }
}
