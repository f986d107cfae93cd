// ==========================================
// 联系人导入服务 - 字段映射解析器
// ==========================================
// 职责: 用户列选择 → 校验后的 MappingPlan
// 规则:
// - 目标为 null / "" / "__clear__" 的列从计划中移除
// - 目标路径不在权威清单中 → InvalidMapping（列出全部问题列）
// - 多值分类（邮箱/电话/网址）允许多列；单值字段重复时后者覆盖并告警
// - 空计划在此处合法，由编排器拒绝
// ==========================================

use crate::domain::mapping::{
    ColumnSelection, MappingEntry, MappingPlan, SuggestedMapping, TargetField, CLEAR_MAPPING,
};
use crate::domain::source::FieldDefinition;
use crate::importer::error::{IngestError, IngestResultOf};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct MappingResolver;

impl MappingResolver {
    pub fn new() -> Self {
        Self
    }

    /// 校验列选择并生成映射计划
    pub fn resolve(
        &self,
        selection: &ColumnSelection,
        fields: &[FieldDefinition],
    ) -> IngestResultOf<MappingPlan> {
        let known: HashSet<&str> = fields.iter().map(|f| f.field_path.as_str()).collect();

        let mut plan = MappingPlan::default();
        let mut offending = Vec::new();

        for (column, target) in selection.iter() {
            let path = match target.map(str::trim) {
                None => continue,
                Some(p) if p.is_empty() || p == CLEAR_MAPPING => continue,
                Some(p) => p,
            };

            if !known.contains(path) {
                offending.push(format!("column '{}' -> unknown field '{}'", column, path));
                continue;
            }

            let target = match TargetField::parse(path) {
                Some(t) => t,
                None => {
                    offending.push(format!(
                        "column '{}' -> field '{}' has no target entity",
                        column, path
                    ));
                    continue;
                }
            };

            if !target.category.is_multi_valued() {
                if let Some(pos) = plan
                    .entries
                    .iter()
                    .position(|e| e.target.field_path == target.field_path)
                {
                    let previous = plan.entries.remove(pos);
                    plan.warnings.push(format!(
                        "columns '{}' and '{}' both map to {}; '{}' wins",
                        previous.column, column, target.field_path, column
                    ));
                }
            }

            plan.entries.push(MappingEntry {
                column: column.to_string(),
                target,
            });
        }

        if !offending.is_empty() {
            return Err(IngestError::InvalidMapping { columns: offending });
        }

        debug!(
            entries = plan.len(),
            warnings = plan.warnings.len(),
            "映射计划解析完成"
        );
        Ok(plan)
    }

    /// 按表头自动建议映射（标签 > 完整路径 > 属性名）
    pub fn suggest(
        &self,
        headers: &[String],
        fields: &[FieldDefinition],
    ) -> Vec<SuggestedMapping> {
        let mut used: HashSet<&str> = HashSet::new();
        let mut suggestions = Vec::new();

        for header in headers {
            let key = normalize(header);
            if key.is_empty() {
                continue;
            }

            let best = fields
                .iter()
                .filter_map(|f| {
                    let target = TargetField::parse(&f.field_path)?;
                    let score = if normalize(&f.label) == key {
                        3
                    } else if normalize(&f.field_path) == key {
                        2
                    } else if normalize(&target.attribute) == key {
                        1
                    } else {
                        return None;
                    };
                    let taken = !target.category.is_multi_valued()
                        && used.contains(f.field_path.as_str());
                    if taken {
                        None
                    } else {
                        Some((score, f))
                    }
                })
                // 同分取清单靠前者
                .fold(None::<(u8, &FieldDefinition)>, |acc, (score, f)| match acc {
                    Some((best, _)) if best >= score => acc,
                    _ => Some((score, f)),
                });

            if let Some((_, field)) = best {
                used.insert(field.field_path.as_str());
                suggestions.push(SuggestedMapping {
                    column: header.clone(),
                    field_path: field.field_path.clone(),
                    label: field.label.clone(),
                });
            }
        }

        suggestions
    }
}

fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
