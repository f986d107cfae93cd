// ==========================================
// 联系人导入服务 - 导入来源与暂存行
// ==========================================
// 对齐: sources / source_data / field_mappings 表
// 红线: Source 创建后不可变；StagedRow 只改 processed / error_log
// ==========================================

use crate::domain::record::RawRecord;
use crate::domain::types::StagedRowState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Source - 一次导入（一次上传）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: i64,
    pub file_name: String,
    pub source_type: String,       // 目前固定 "csv"
    pub byte_size: Option<i64>,    // 原始文件字节数（远程调用可能缺失）
    pub record_count: i64,         // 声明行数，暂存行数不得超过
    pub team_id: String,
    pub profile_id: Option<String>,
    pub list_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 待创建的 Source
#[derive(Debug, Clone)]
pub struct NewSource {
    pub file_name: String,
    pub source_type: String,
    pub byte_size: Option<i64>,
    pub record_count: i64,
    pub team_id: String,
    pub profile_id: Option<String>,
    pub list_id: Option<String>,
}

// ==========================================
// StagedRow - 暂存行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedRow {
    pub id: i64,
    pub source_id: i64,
    pub row_number: i64, // 数据行号（1 起，不含表头）
    pub raw_data: RawRecord,
    pub processed: bool,
    pub error_log: Option<String>,
    pub list_id: Option<String>,
}

impl StagedRow {
    pub fn state(&self) -> StagedRowState {
        StagedRowState::derive(self.processed, self.error_log.as_deref())
    }
}

/// 待写入的暂存行
#[derive(Debug, Clone)]
pub struct NewStagedRow {
    pub row_number: i64,
    pub raw_data: RawRecord,
    pub list_id: Option<String>,
}

// ==========================================
// FieldDefinition - 权威字段清单
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub label: String,
    pub field_path: String,
    pub category: String,
    pub display_order: i32,
}

impl FieldDefinition {
    pub fn new(field_path: &str, label: &str, category: &str, display_order: i32) -> Self {
        Self {
            label: label.to_string(),
            field_path: field_path.to_string(),
            category: category.to_string(),
            display_order,
        }
    }
}

// ==========================================
// SourceStatus - 来源处理进度
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    pub source: Source,
    pub staged_rows: i64,
    pub processed_rows: i64,
    pub failed_rows: i64,
    pub pending_rows: i64,
}
