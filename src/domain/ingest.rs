// ==========================================
// 联系人导入服务 - 导入请求与结果
// ==========================================
// 职责: 进程内调用与远程调用共用的请求/结果结构
// 约束: 结果可 JSON 序列化，字段 camelCase
// ==========================================

use crate::domain::mapping::{ColumnSelection, MappingPlan};
use crate::domain::record::RawRecord;
use crate::domain::types::RunState;
use serde::{Deserialize, Serialize};

// ==========================================
// 远程调用请求
// ==========================================

/// `{fileName, data, mappings, teamId, profileId?, listId?}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub file_name: String,
    pub data: Vec<RawRecord>,
    pub mappings: ColumnSelection,
    pub team_id: String,
    #[serde(default)]
    pub profile_id: Option<String>,
    #[serde(default)]
    pub list_id: Option<String>,
    /// 调用方指定的运行 ID（用于取消）；缺省时自动生成
    #[serde(default)]
    pub run_id: Option<String>,
}

/// 以 CSV 文本提交的导入请求（先经 Row Parser）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvIngestRequest {
    pub file_name: String,
    pub csv: String,
    pub mappings: ColumnSelection,
    pub team_id: String,
    #[serde(default)]
    pub profile_id: Option<String>,
    #[serde(default)]
    pub list_id: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
}

/// 重试转换请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryRequest {
    pub mappings: ColumnSelection,
    #[serde(default)]
    pub run_id: Option<String>,
}

/// 预览请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub csv: String,
}

// ==========================================
// 进程内导入任务（映射已校验）
// ==========================================
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub file_name: String,
    pub records: Vec<RawRecord>,
    pub plan: MappingPlan,
    pub team_id: String,
    pub profile_id: Option<String>,
    pub list_id: Option<String>,
    pub byte_size: Option<i64>,
}

// ==========================================
// 阶段报告
// ==========================================

/// 解析告警（列数与表头不一致、重复表头）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseWarning {
    pub row_number: usize, // 0 表示表头
    pub message: String,
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.row_number == 0 {
            write!(f, "header: {}", self.message)
        } else {
            write!(f, "row {}: {}", self.row_number, self.message)
        }
    }
}

/// 暂存批次失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub batch_index: usize,
    pub first_row: usize,
    pub last_row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingReport {
    pub attempted: usize,
    pub persisted: usize,
    pub batches: usize,
    pub failures: Vec<BatchFailure>,
    pub cancelled: bool,
}

/// 单行转换失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFailure {
    pub staged_row_id: i64,
    pub row_number: i64,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformReport {
    pub processed: usize,
    pub failed: usize,
    pub entities_created: usize,
    pub failures: Vec<RowFailure>,
    pub warnings: Vec<String>,
    pub cancelled: bool,
}

// ==========================================
// IngestResult - 导入结果（对外）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<i64>,
    pub rows_processed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_failed: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_staged: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_attempted: Option<usize>,
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl IngestResult {
    /// 未进入暂存即失败（解析/映射/来源创建）
    pub fn rejected(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            success: false,
            source_id: None,
            rows_processed: 0,
            rows_failed: None,
            errors,
            warnings,
            rows_staged: None,
            rows_attempted: None,
            state: RunState::Failed,
            run_id: None,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// 前置告警（解析阶段）放在最前
    pub fn with_leading_warnings(mut self, mut warnings: Vec<String>) -> Self {
        warnings.append(&mut self.warnings);
        self.warnings = warnings;
        self
    }
}

// ==========================================
// 预览结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub headers: Vec<String>,
    pub rows: Vec<RawRecord>,
    pub total_rows: usize,
    pub warnings: Vec<String>,
    pub suggested_mappings: Vec<crate::domain::mapping::SuggestedMapping>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_camel_case_shape() {
        let json = r#"{
            "fileName": "people.csv",
            "data": [{"name": "John Doe", "email": "john@x.com"}],
            "mappings": {"name": "contacts.full_name", "email": "contacts.email"},
            "teamId": "team-1",
            "listId": "list-9"
        }"#;
        let req: IngestRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.file_name, "people.csv");
        assert_eq!(req.data.len(), 1);
        assert_eq!(req.mappings.len(), 2);
        assert_eq!(req.profile_id, None);
        assert_eq!(req.list_id.as_deref(), Some("list-9"));
    }

    #[test]
    fn test_rejected_result_omits_optional_fields() {
        let result = IngestResult::rejected(vec!["boom".to_string()], Vec::new());
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["rowsProcessed"], 0);
        assert_eq!(value["state"], "FAILED");
        assert!(value.get("sourceId").is_none());
        assert!(value.get("warnings").is_none());
        assert_eq!(value["errors"][0], "boom");
    }
}
