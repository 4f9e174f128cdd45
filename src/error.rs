use axum::http::StatusCode;
use thiserror::Error;

pub type QueryResult<T> = Result<T, QueryError>;

/// 用户输入校验错误：在调用点就地处理，失败时不改变任何状态
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{message}")]
    InvalidValue { column: String, message: String },

    #[error("Unknown column '{column}' for table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("Operator '{0}' cannot be used in a filter condition")]
    UnsupportedOperator(String),

    #[error("Output directory '{0}' must be a relative path inside the configured output directory")]
    InvalidOutputDir(String),

    #[error("Please enter a valid time window before adding conditions or executing the query.")]
    WindowNotValidated,
}

#[derive(Debug, Clone, Error)]
pub enum QueryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid column selection: {0}")]
    Schema(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    BackendQuery(String),

    #[error("Chunk file I/O failed: {0}")]
    Io(String),
}

impl QueryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            QueryError::Validation(_) | QueryError::Schema(_) => StatusCode::BAD_REQUEST,
            QueryError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
            QueryError::BackendQuery(_) => StatusCode::BAD_GATEWAY,
            QueryError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 连接阶段以外的 sqlx 错误一律视为后端查询失败
    pub fn backend(err: sqlx::Error) -> Self {
        QueryError::BackendQuery(err.to_string())
    }
}

impl From<std::io::Error> for QueryError {
    fn from(err: std::io::Error) -> Self {
        QueryError::Io(err.to_string())
    }
}
