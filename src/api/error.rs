// ==========================================
// 联系人导入服务 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换 Repository / Importer 错误为调用方可读的错误
// 红线: 每个错误必须带显式原因与稳定错误码
// ==========================================

use crate::importer::error::IngestError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 请求错误
    // ==========================================
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// 映射校验失败（逐列列出）
    #[error("invalid mapping: {}", .columns.join("; "))]
    InvalidMapping { columns: Vec<String> },

    #[error("parse error: {0}")]
    ParseError(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("database connection failed: {0}")]
    DatabaseConnectionError(String),

    #[error("database transaction failed: {0}")]
    DatabaseTransactionError(String),

    #[error("constraint violated: {0}")]
    ConstraintViolation(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("ingestion failed: {0}")]
    IngestFailed(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 稳定错误码（对外协议的一部分）
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidMapping { .. } => "INVALID_MAPPING",
            ApiError::ParseError(_) => "PARSE_ERROR",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::DatabaseConnectionError(_) => "DATABASE_CONNECTION_ERROR",
            ApiError::DatabaseTransactionError(_) => "DATABASE_TRANSACTION_ERROR",
            ApiError::ConstraintViolation(_) => "CONSTRAINT_VIOLATION",
            ApiError::IngestFailed(_) => "INGEST_FAILED",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::Other(_) => "UNKNOWN_ERROR",
        }
    }

    /// 附加明细（可选）
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::InvalidMapping { columns } => Some(serde_json::json!({ "columns": columns })),
            _ => None,
        }
    }

    /// 对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidInput(_) | ApiError::InvalidMapping { .. } | ApiError::ParseError(_) => {
                400
            }
            ApiError::NotFound(_) => 404,
            ApiError::ConstraintViolation(_) => 409,
            ApiError::IngestFailed(_) => 422,
            _ => 500,
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("lock poisoned: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg)
            | RepositoryError::ForeignKeyViolation(msg)
            | RepositoryError::CheckConstraintViolation(msg) => ApiError::ConstraintViolation(msg),
            err @ RepositoryError::StagingOverflow { .. } => {
                ApiError::ConstraintViolation(err.to_string())
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::DatabaseError(format!("field {}: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 IngestError 转换
// ==========================================
impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Parse(msg) => ApiError::ParseError(msg),
            IngestError::InvalidMapping { columns } => ApiError::InvalidMapping { columns },
            IngestError::EmptyMapping => ApiError::InvalidInput(err.to_string()),
            IngestError::Repository(e) => e.into(),
            IngestError::Io(e) => ApiError::InvalidInput(e.to_string()),
            other => ApiError::IngestFailed(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_conversion() {
        let repo_err = RepositoryError::NotFound {
            entity: "Source".to_string(),
            id: "42".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match &api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("Source"));
                assert!(msg.contains("42"));
            }
            _ => panic!("Expected NotFound"),
        }
        assert_eq!(api_err.status_code(), 404);

        let api_err: ApiError = RepositoryError::StagingOverflow {
            source_id: 1,
            declared: 2,
            staged: 2,
            incoming: 1,
        }
        .into();
        assert_eq!(api_err.code(), "CONSTRAINT_VIOLATION");
    }

    #[test]
    fn test_ingest_error_conversion() {
        let api_err: ApiError = IngestError::InvalidMapping {
            columns: vec!["column 'x' -> unknown field 'a.b'".to_string()],
        }
        .into();
        assert_eq!(api_err.code(), "INVALID_MAPPING");
        assert_eq!(api_err.status_code(), 400);
        assert_eq!(api_err.details().unwrap()["columns"][0], "column 'x' -> unknown field 'a.b'");

        let api_err: ApiError = IngestError::Parse("file contains no rows".into()).into();
        assert_eq!(api_err.code(), "PARSE_ERROR");

        let api_err: ApiError = IngestError::Cancelled.into();
        assert_eq!(api_err.code(), "INGEST_FAILED");
    }
}
