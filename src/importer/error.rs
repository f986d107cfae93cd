// ==========================================
// 联系人导入服务 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: Display 文本直接进入 IngestResult.errors，面向仪表盘用户（英文）
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum IngestError {
    // ===== 解析错误 =====
    #[error("parse error: {0}")]
    Parse(String),

    // ===== 映射错误 =====
    #[error("invalid mapping: {}", .columns.join("; "))]
    InvalidMapping { columns: Vec<String> },

    #[error("no columns are mapped to a target field")]
    EmptyMapping,

    // ===== 运行期错误 =====
    #[error("source could not be created: {0}")]
    SourceCreation(String),

    #[error("batch {batch_index} (rows {first_row}-{last_row}) failed: {message}")]
    BatchWrite {
        batch_index: usize,
        first_row: usize,
        last_row: usize,
        message: String,
    },

    #[error("row {row_number}: {message}")]
    RowTransform { row_number: i64, message: String },

    #[error("ingestion cancelled")]
    Cancelled,

    // ===== 基础设施错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("file read failed: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// 是否终止整次导入（其余错误只记录，运行继续）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IngestError::Parse(_)
                | IngestError::InvalidMapping { .. }
                | IngestError::EmptyMapping
                | IngestError::SourceCreation(_)
        )
    }

    /// 稳定错误码（HTTP 层 / 日志使用）
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::Parse(_) => "PARSE_ERROR",
            IngestError::InvalidMapping { .. } => "INVALID_MAPPING",
            IngestError::EmptyMapping => "EMPTY_MAPPING",
            IngestError::SourceCreation(_) => "SOURCE_CREATION_FAILED",
            IngestError::BatchWrite { .. } => "BATCH_WRITE_FAILED",
            IngestError::RowTransform { .. } => "ROW_TRANSFORM_FAILED",
            IngestError::Cancelled => "CANCELLED",
            IngestError::Repository(_) => "REPOSITORY_ERROR",
            IngestError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result 类型别名
pub type IngestResultOf<T> = Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_transform_message_format() {
        let err = IngestError::RowTransform {
            row_number: 2,
            message: "invalid email address 'jane-at-x'".to_string(),
        };
        assert_eq!(err.to_string(), "row 2: invalid email address 'jane-at-x'");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_invalid_mapping_lists_every_column() {
        let err = IngestError::InvalidMapping {
            columns: vec![
                "Email -> contacts.bogus_field".to_string(),
                "Deal -> deals.amount".to_string(),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("contacts.bogus_field"));
        assert!(text.contains("deals.amount"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_only_pre_staging_errors_are_fatal() {
        assert!(IngestError::SourceCreation("db down".into()).is_fatal());
        assert!(IngestError::EmptyMapping.is_fatal());
        assert!(!IngestError::Cancelled.is_fatal());
        assert!(!IngestError::BatchWrite {
            batch_index: 0,
            first_row: 1,
            last_row: 100,
            message: "locked".into(),
        }
        .is_fatal());
    }
}
