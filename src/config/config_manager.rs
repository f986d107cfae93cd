// ==========================================
// 联系人导入服务 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::ingest_config_trait::{
    IngestConfigReader, DEFAULT_BATCH_SIZE, DEFAULT_PREVIEW_ROWS, DEFAULT_STAGING_CONCURRENCY,
    DEFAULT_TRANSFORM_WORKERS,
};
use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global 配置（UPSERT）
    pub fn set_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let config_map = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<BTreeMap<String, String>>>()?;

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 读取正整数配置；缺失、非数字或 < 1 时回落默认值
    fn get_positive_or_default(&self, key: &str, default: usize) -> RepositoryResult<usize> {
        let raw = match self.get_global_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };

        match raw.trim().parse::<usize>() {
            Ok(v) if v >= 1 => Ok(v),
            _ => {
                warn!(key = key, value = %raw, default = default, "配置值非法，使用默认值");
                Ok(default)
            }
        }
    }
}

#[async_trait]
impl IngestConfigReader for ConfigManager {
    async fn batch_size(&self) -> RepositoryResult<usize> {
        self.get_positive_or_default(config_keys::BATCH_SIZE, DEFAULT_BATCH_SIZE)
    }

    async fn staging_concurrency(&self) -> RepositoryResult<usize> {
        self.get_positive_or_default(config_keys::STAGING_CONCURRENCY, DEFAULT_STAGING_CONCURRENCY)
    }

    async fn transform_workers(&self) -> RepositoryResult<usize> {
        self.get_positive_or_default(config_keys::TRANSFORM_WORKERS, DEFAULT_TRANSFORM_WORKERS)
    }

    async fn preview_rows(&self) -> RepositoryResult<usize> {
        self.get_positive_or_default(config_keys::PREVIEW_ROWS, DEFAULT_PREVIEW_ROWS)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 暂存
    pub const BATCH_SIZE: &str = "ingest.batch_size";
    pub const STAGING_CONCURRENCY: &str = "ingest.staging_concurrency";

    // 转换
    pub const TRANSFORM_WORKERS: &str = "ingest.transform_workers";

    // 预览
    pub const PREVIEW_ROWS: &str = "ingest.preview_rows";

    /// 可通过 HTTP 覆写的键（均为正整数）
    pub const ALL: &[&str] = &[BATCH_SIZE, STAGING_CONCURRENCY, TRANSFORM_WORKERS, PREVIEW_ROWS];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticIngestConfig;

    fn setup_manager() -> ConfigManager {
        let conn = crate::db::open_in_memory().unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let manager = setup_manager();
        assert_eq!(manager.settings().await.unwrap(), StaticIngestConfig::default());
    }

    #[tokio::test]
    async fn test_set_value_overrides_default() {
        let manager = setup_manager();
        manager.set_value(config_keys::BATCH_SIZE, "250").unwrap();
        manager.set_value(config_keys::BATCH_SIZE, "25").unwrap();

        assert_eq!(manager.batch_size().await.unwrap(), 25);
        assert_eq!(manager.transform_workers().await.unwrap(), DEFAULT_TRANSFORM_WORKERS);
    }

    #[tokio::test]
    async fn test_invalid_values_fall_back() {
        let manager = setup_manager();
        manager.set_value(config_keys::STAGING_CONCURRENCY, "0").unwrap();
        manager.set_value(config_keys::PREVIEW_ROWS, "lots").unwrap();

        assert_eq!(
            manager.staging_concurrency().await.unwrap(),
            DEFAULT_STAGING_CONCURRENCY
        );
        assert_eq!(manager.preview_rows().await.unwrap(), DEFAULT_PREVIEW_ROWS);
    }

    #[test]
    fn test_snapshot_contains_values() {
        let manager = setup_manager();
        manager.set_value(config_keys::TRANSFORM_WORKERS, "8").unwrap();

        let snapshot: BTreeMap<String, String> =
            serde_json::from_str(&manager.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(
            snapshot.get(config_keys::TRANSFORM_WORKERS).map(String::as_str),
            Some("8")
        );
    }
}
