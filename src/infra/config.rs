use anyhow::Context;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::infra::db_external::BackendKind;
use crate::models::schema::TableKind;

pub const DEFAULT_HOST_MAX_SPAN_DAYS: i64 = 31;
pub const DEFAULT_JOB_MAX_SPAN_DAYS: i64 = 180;
pub const DEFAULT_TARGET_CHUNK_COUNT: u64 = 25_000;
pub const DEFAULT_MEMORY_SAFETY_MARGIN: f64 = 0.8;

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub kind: BackendKind,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub host_max_span_days: i64,
    pub job_max_span_days: i64,
    pub target_chunk_count: u64,
    pub memory_safety_margin: f64,
    pub output_dir: PathBuf,
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                kind: BackendKind::Postgres,
                url: None,
            },
            host_max_span_days: DEFAULT_HOST_MAX_SPAN_DAYS,
            job_max_span_days: DEFAULT_JOB_MAX_SPAN_DAYS,
            target_chunk_count: DEFAULT_TARGET_CHUNK_COUNT,
            memory_safety_margin: DEFAULT_MEMORY_SAFETY_MARGIN,
            output_dir: PathBuf::from("temp_output"),
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Settings {
    /// 从进程环境读取配置（调用前应先执行 `dotenvy::dotenv()`）
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();

        let kind = match lookup("DB_TYPE") {
            Some(db_type) => BackendKind::parse(&db_type)
                .with_context(|| format!("Unsupported DB type: {}", db_type))?,
            None => defaults.database.kind,
        };

        // 优先使用 DATABASE_URL，否则由 DBHOST/DBUSER/DBPW/DBNAME 拼接
        let url = lookup("DATABASE_URL").or_else(|| {
            let host = lookup("DBHOST")?;
            let user = lookup("DBUSER")?;
            let password = lookup("DBPW")?;
            let name = lookup("DBNAME")?;
            let scheme = match kind {
                BackendKind::Postgres => "postgres",
                BackendKind::MySql => "mysql",
            };
            Some(format!("{}://{}:{}@{}/{}", scheme, user, password, host, name))
        });

        Ok(Self {
            database: DatabaseConfig { kind, url },
            host_max_span_days: parse_or(&lookup, "HOST_MAX_SPAN_DAYS", defaults.host_max_span_days)?,
            job_max_span_days: parse_or(&lookup, "JOB_MAX_SPAN_DAYS", defaults.job_max_span_days)?,
            target_chunk_count: parse_or(&lookup, "TARGET_CHUNK_COUNT", defaults.target_chunk_count)?,
            memory_safety_margin: parse_or(
                &lookup,
                "MEMORY_SAFETY_MARGIN",
                defaults.memory_safety_margin,
            )?,
            output_dir: lookup("OUTPUT_DIR").map(PathBuf::from).unwrap_or(defaults.output_dir),
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
        })
    }

    pub fn max_span_days(&self, table: TableKind) -> i64 {
        match table {
            TableKind::HostData => self.host_max_span_days,
            TableKind::JobData => self.job_max_span_days,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}
