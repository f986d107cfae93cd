// ==========================================
// 联系人导入服务 - 字段映射模型
// ==========================================
// 职责: 用户列选择 (ColumnSelection) 与校验后的映射计划 (MappingPlan)
// 约束: MappingPlan 只在一次导入运行内存在，不落库
// ==========================================

use crate::domain::types::TargetCategory;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// 显式清除映射的哨兵值
pub const CLEAR_MAPPING: &str = "__clear__";

// ==========================================
// ColumnSelection - 用户列选择（有序）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSelection {
    entries: Vec<(String, Option<String>)>,
}

impl ColumnSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置列映射；同一列重复设置时后者覆盖，位置不变
    pub fn set(&mut self, column: impl Into<String>, target: impl Into<String>) {
        self.put(column.into(), Some(target.into()));
    }

    /// 显式清除列映射
    pub fn clear(&mut self, column: impl Into<String>) {
        self.put(column.into(), None);
    }

    fn put(&mut self, column: String, target: Option<String>) {
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = target,
            None => self.entries.push((column, target)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(c, t)| (c.as_str(), t.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ColumnSelection {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut selection = ColumnSelection::new();
        for (k, v) in iter {
            selection.set(k, v);
        }
        selection
    }
}

impl Serialize for ColumnSelection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (column, target) in &self.entries {
            map.serialize_entry(column, target)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ColumnSelection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ColumnSelectionVisitor)
    }
}

struct ColumnSelectionVisitor;

impl<'de> Visitor<'de> for ColumnSelectionVisitor {
    type Value = ColumnSelection;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON object of column name to field path")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut selection = ColumnSelection::new();
        while let Some((column, target)) = access.next_entry::<String, Option<String>>()? {
            selection.put(column, target);
        }
        Ok(selection)
    }
}

// ==========================================
// TargetField - 已解析的目标字段
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetField {
    pub category: TargetCategory,
    pub attribute: String,
    pub field_path: String,
}

impl TargetField {
    /// 解析 `table.attribute`；前缀或属性未知时返回 None
    pub fn parse(field_path: &str) -> Option<Self> {
        let (table, attribute) = field_path.split_once('.')?;
        let category = TargetCategory::from_table(table)?;
        if !category.supports_attribute(attribute) {
            return None;
        }
        Some(Self {
            category,
            attribute: attribute.to_string(),
            field_path: field_path.to_string(),
        })
    }
}

// ==========================================
// MappingPlan - 校验后的映射计划
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingEntry {
    pub column: String,
    pub target: TargetField,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingPlan {
    pub entries: Vec<MappingEntry>,
    pub warnings: Vec<String>,
}

impl MappingPlan {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries_for(&self, category: TargetCategory) -> impl Iterator<Item = &MappingEntry> {
        self.entries
            .iter()
            .filter(move |e| e.target.category == category)
    }
}

/// 自动映射建议（预览用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedMapping {
    pub column: String,
    pub field_path: String,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_field_parse() {
        let field = TargetField::parse("contacts.email").unwrap();
        assert_eq!(field.category, TargetCategory::Contact);
        assert_eq!(field.attribute, "email");

        assert!(TargetField::parse("contacts.bogus_field").is_none());
        assert!(TargetField::parse("deals.amount").is_none());
        assert!(TargetField::parse("no_dot").is_none());
    }

    #[test]
    fn test_selection_from_json_keeps_order_and_nulls() {
        let selection: ColumnSelection =
            serde_json::from_str(r#"{"name":"contacts.full_name","skip":null,"email":"contacts.email"}"#)
                .unwrap();
        let pairs: Vec<(&str, Option<&str>)> = selection.iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("name", Some("contacts.full_name")),
                ("skip", None),
                ("email", Some("contacts.email")),
            ]
        );
    }
}
