use serde::{Deserialize, Serialize};
use std::fmt;

pub const HOST_DATA_COLUMNS: &[&str] = &[
    "host", "jid", "type", "event", "unit", "value", "diff", "arc", "time",
];

pub const JOB_DATA_COLUMNS: &[&str] = &[
    "jid",
    "submit_time",
    "start_time",
    "end_time",
    "runtime",
    "timelimit",
    "node_hrs",
    "nhosts",
    "ncores",
    "ngpus",
    "username",
    "account",
    "queue",
    "state",
    "jobname",
    "exitcode",
    "host_list",
];

/// 两张遥测表：按主机的时序事件表、按作业的记账表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableKind {
    #[serde(rename = "host_data")]
    HostData,
    #[serde(rename = "job_data")]
    JobData,
}

impl TableKind {
    pub fn table_name(self) -> &'static str {
        match self {
            TableKind::HostData => "host_data",
            TableKind::JobData => "job_data",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            TableKind::HostData => HOST_DATA_COLUMNS,
            TableKind::JobData => JOB_DATA_COLUMNS,
        }
    }

    /// BETWEEN 时间窗口作用的列
    pub fn time_column(self) -> &'static str {
        match self {
            TableKind::HostData => "time",
            TableKind::JobData => "start_time",
        }
    }

    pub fn has_column(self, column: &str) -> bool {
        self.columns().contains(&column)
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}
