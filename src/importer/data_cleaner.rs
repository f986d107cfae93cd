// ==========================================
// 联系人导入服务 - 数据清洗器实现
// ==========================================
// 职责: 取值清洗（去 ' " ; + TRIM）/ 空值跳过 / 邮箱电话网址校验
// 红线: 清洗不替代参数化写入，仓储层始终参数绑定
// ==========================================

use crate::domain::mapping::TargetField;
use crate::domain::types::TargetCategory;
use crate::importer::ingest_trait::ValueCleaner;
use regex::Regex;
use std::sync::LazyLock;

/// 清洗时移除的字符
pub const STRIPPED_CHARS: &[char] = &['\'', '"', ';'];

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$")
        .expect("email regex")
});

static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9+()./\s-]*[0-9][0-9+()./\s-]*(?:\s*(?:x|ext\.?)\s*[0-9]+)?$").expect("phone regex"));

static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z][A-Za-z0-9+.-]*://)?[^\s/?#.]+(?:\.[^\s/?#.]+)+(?::[0-9]+)?(?:[/?#]\S*)?$")
        .expect("url regex")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct DataCleaner;

impl DataCleaner {
    pub fn new() -> Self {
        Self
    }

    /// 邮箱格式
    pub fn is_valid_email(&self, value: &str) -> bool {
        EMAIL_REGEX.is_match(value)
    }

    /// 电话: 至少一位数字，仅允许常见分隔符
    pub fn is_valid_phone(&self, value: &str) -> bool {
        PHONE_REGEX.is_match(value)
    }

    /// 网址: 无空白，主机名含点
    pub fn is_valid_url(&self, value: &str) -> bool {
        URL_REGEX.is_match(value)
    }
}

impl ValueCleaner for DataCleaner {
    fn sanitize(&self, raw: &str) -> Option<String> {
        let stripped: String = raw.chars().filter(|c| !STRIPPED_CHARS.contains(c)).collect();
        let trimmed = stripped.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    fn validate(&self, target: &TargetField, value: &str) -> Result<(), String> {
        let is_email = matches!(
            (target.category, target.attribute.as_str()),
            (TargetCategory::Contact, "email") | (TargetCategory::Email, _)
        );
        let is_phone = matches!(
            (target.category, target.attribute.as_str()),
            (TargetCategory::Contact, "phone") | (TargetCategory::Phone, _)
        );
        let is_url = matches!(
            (target.category, target.attribute.as_str()),
            (TargetCategory::Company, "domain") | (TargetCategory::Url, _)
        );

        if is_email && !self.is_valid_email(value) {
            return Err(format!(
                "invalid email address '{}' for {}",
                value, target.field_path
            ));
        }
        if is_phone && !self.is_valid_phone(value) {
            return Err(format!(
                "invalid phone number '{}' for {}",
                value, target.field_path
            ));
        }
        if is_url && !self.is_valid_url(value) {
            return Err(format!("invalid url '{}' for {}", value, target.field_path));
        }
        Ok(())
    }
}
