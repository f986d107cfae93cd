// ==========================================
// 联系人导入服务 - 权威字段清单仓储
// ==========================================
// 职责: 管理 field_mappings 表（可映射目标字段的权威清单）
// 说明: 种子数据由 db::ensure_schema 写入；此处只读 + 运维 upsert
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::source::FieldDefinition;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

pub struct FieldMappingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FieldMappingRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 列出全部可映射字段（按分类、display_order 排序）
    pub fn list_fields(&self) -> RepositoryResult<Vec<FieldDefinition>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT field_path, label, category, display_order
            FROM field_mappings
            ORDER BY
                CASE category
                    WHEN 'Contact' THEN 1
                    WHEN 'Company' THEN 2
                    WHEN 'Address' THEN 3
                    WHEN 'Email' THEN 4
                    WHEN 'Phone' THEN 5
                    WHEN 'URL' THEN 6
                    ELSE 7
                END,
                display_order,
                field_path
            "#,
        )?;

        let fields = stmt
            .query_map([], |row| {
                Ok(FieldDefinition {
                    field_path: row.get(0)?,
                    label: row.get(1)?,
                    category: row.get(2)?,
                    display_order: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(fields)
    }

    /// 按字段路径查询
    pub fn find_field(&self, field_path: &str) -> RepositoryResult<Option<FieldDefinition>> {
        Ok(self
            .list_fields()?
            .into_iter()
            .find(|f| f.field_path == field_path))
    }

    /// 新增或更新字段定义
    pub fn upsert(&self, field: &FieldDefinition) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO field_mappings (field_path, label, category, display_order)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(field_path) DO UPDATE SET
                label = excluded.label,
                category = excluded.category,
                display_order = excluded.display_order
            "#,
            params![field.field_path, field.label, field.category, field.display_order],
        )?;
        Ok(())
    }
}
