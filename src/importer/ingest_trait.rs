// ==========================================
// 联系人导入服务 - 导入管道 Trait
// ==========================================
// 职责: 定义管道各阶段可替换的接口（不包含实现）
// ==========================================

use crate::domain::mapping::TargetField;
use crate::domain::source::FieldDefinition;
use crate::repository::error::RepositoryResult;

// ==========================================
// ValueCleaner Trait
// ==========================================
// 用途: 单元格取值清洗与下游约束校验（转换阶段）
// 实现者: DataCleaner
pub trait ValueCleaner: Send + Sync {
    /// 清洗原始取值
    ///
    /// # 返回
    /// - Some(String): 去除 `'` `"` `;` 并 TRIM 后的非空值
    /// - None: 清洗后为空，字段跳过
    fn sanitize(&self, raw: &str) -> Option<String>;

    /// 校验目标字段的下游约束（邮箱/电话/网址格式）
    ///
    /// # 返回
    /// - Err(String): 面向用户的失败原因（不含行号）
    fn validate(&self, target: &TargetField, value: &str) -> Result<(), String>;
}

// ==========================================
// FieldCatalog Trait
// ==========================================
// 用途: 权威字段清单来源
// 实现者: FieldMappingRepository, Vec<FieldDefinition>
pub trait FieldCatalog: Send + Sync {
    fn list_fields(&self) -> RepositoryResult<Vec<FieldDefinition>>;
}

impl FieldCatalog for Vec<FieldDefinition> {
    fn list_fields(&self) -> RepositoryResult<Vec<FieldDefinition>> {
        Ok(self.clone())
    }
}

impl FieldCatalog for crate::repository::FieldMappingRepository {
    fn list_fields(&self) -> RepositoryResult<Vec<FieldDefinition>> {
        crate::repository::FieldMappingRepository::list_fields(self)
    }
}
