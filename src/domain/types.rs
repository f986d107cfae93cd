// ==========================================
// 联系人导入服务 - 领域类型定义
// ==========================================
// 职责: 目标实体分类、导入运行状态、暂存行状态
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 目标实体分类 (Target Category)
// ==========================================
// 字段路径前缀 → 分类，在映射校验时一次性解析
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetCategory {
    Contact,
    Company,
    Address,
    Email,
    Phone,
    Url,
}

impl TargetCategory {
    pub const ALL: [TargetCategory; 6] = [
        TargetCategory::Contact,
        TargetCategory::Company,
        TargetCategory::Address,
        TargetCategory::Email,
        TargetCategory::Phone,
        TargetCategory::Url,
    ];

    /// 对应的实体表名（同时是字段路径前缀）
    pub fn table(&self) -> &'static str {
        match self {
            TargetCategory::Contact => "contacts",
            TargetCategory::Company => "companies",
            TargetCategory::Address => "addresses",
            TargetCategory::Email => "email_addresses",
            TargetCategory::Phone => "phone_numbers",
            TargetCategory::Url => "urls",
        }
    }

    /// 该分类允许映射的属性
    pub fn attributes(&self) -> &'static [&'static str] {
        match self {
            TargetCategory::Contact => &[
                "first_name",
                "last_name",
                "full_name",
                "email",
                "phone",
                "job_title",
                "notes",
            ],
            TargetCategory::Company => &["name", "domain", "industry", "size"],
            TargetCategory::Address => &["street", "city", "state", "postal_code", "country"],
            TargetCategory::Email => &["email"],
            TargetCategory::Phone => &["number"],
            TargetCategory::Url => &["url"],
        }
    }

    pub fn supports_attribute(&self, attribute: &str) -> bool {
        self.attributes().contains(&attribute)
    }

    /// 一行内可产生多条记录（多个邮箱/电话/网址列）
    pub fn is_multi_valued(&self) -> bool {
        matches!(
            self,
            TargetCategory::Email | TargetCategory::Phone | TargetCategory::Url
        )
    }

    /// 从表名前缀解析分类
    pub fn from_table(table: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.table() == table)
    }
}

impl fmt::Display for TargetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table())
    }
}

// ==========================================
// 导入运行状态 (Run State)
// ==========================================
// Created → Staging → Transforming → Completed / PartiallyCompleted
// Created → Staging → Failed（暂存 0 行）
// 任意阶段收到取消信号 → Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Created,
    Staging,
    Transforming,
    Completed,
    PartiallyCompleted,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed
                | RunState::PartiallyCompleted
                | RunState::Failed
                | RunState::Cancelled
        )
    }

    /// 终态中视为成功（允许部分行失败）
    pub fn is_success(&self) -> bool {
        matches!(self, RunState::Completed | RunState::PartiallyCompleted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Created => write!(f, "CREATED"),
            RunState::Staging => write!(f, "STAGING"),
            RunState::Transforming => write!(f, "TRANSFORMING"),
            RunState::Completed => write!(f, "COMPLETED"),
            RunState::PartiallyCompleted => write!(f, "PARTIALLY_COMPLETED"),
            RunState::Failed => write!(f, "FAILED"),
            RunState::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

// ==========================================
// 暂存行状态 (Staged Row State)
// ==========================================
// 由 processed + error_log 推导，不单独落库
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StagedRowState {
    Unprocessed,
    Processed,
    Failed,
}

impl StagedRowState {
    pub fn derive(processed: bool, error_log: Option<&str>) -> Self {
        match (processed, error_log) {
            (true, _) => StagedRowState::Processed,
            (false, Some(_)) => StagedRowState::Failed,
            (false, None) => StagedRowState::Unprocessed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_roundtrip_by_table() {
        for category in TargetCategory::ALL {
            assert_eq!(TargetCategory::from_table(category.table()), Some(category));
        }
        assert_eq!(TargetCategory::from_table("deals"), None);
    }

    #[test]
    fn test_multi_valued_categories() {
        assert!(TargetCategory::Email.is_multi_valued());
        assert!(TargetCategory::Phone.is_multi_valued());
        assert!(TargetCategory::Url.is_multi_valued());
        assert!(!TargetCategory::Contact.is_multi_valued());
        assert!(!TargetCategory::Address.is_multi_valued());
    }

    #[test]
    fn test_run_state_success() {
        assert!(RunState::Completed.is_success());
        assert!(RunState::PartiallyCompleted.is_success());
        assert!(!RunState::Failed.is_success());
        assert!(!RunState::Cancelled.is_success());
        assert!(!RunState::Staging.is_terminal());
    }

    #[test]
    fn test_staged_row_state() {
        assert_eq!(StagedRowState::derive(true, Some("old")), StagedRowState::Processed);
        assert_eq!(StagedRowState::derive(false, Some("bad")), StagedRowState::Failed);
        assert_eq!(StagedRowState::derive(false, None), StagedRowState::Unprocessed);
    }
}
