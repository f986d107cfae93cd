// ==========================================
// 联系人导入服务 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 约束: 所有仓储共享同一连接（Arc<Mutex<Connection>>）
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{IngestApi, SqliteIngestApi};
use crate::config::ConfigManager;
use crate::importer::IngestionOrchestrator;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{FieldMappingRepository, SqliteIngestRepository};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "CONTACT_INGEST_DB";

/// 应用状态
///
/// 包含所有API实例和共享资源，作为 HTTP 路由的共享状态
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 导入API
    pub ingest_api: Arc<SqliteIngestApi>,

    /// 配置管理器（运维调整批次大小等）
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并建表（幂等）
    /// 2. 初始化所有Repository
    /// 3. 创建API实例
    pub fn new(db_path: String) -> RepositoryResult<Self> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        crate::db::ensure_schema(&conn)?;

        Self::from_connection(db_path, conn)
    }

    /// 内存库（测试/临时运行）
    pub fn in_memory() -> RepositoryResult<Self> {
        let conn = crate::db::open_in_memory()?;
        Self::from_connection(":memory:".to_string(), conn)
    }

    fn from_connection(db_path: String, conn: Connection) -> RepositoryResult<Self> {
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let ingest_repo = Arc::new(SqliteIngestRepository::from_connection(conn.clone()));
        let field_repo = FieldMappingRepository::from_connection(conn.clone());
        let config_manager = ConfigManager::from_connection(conn.clone())?;

        // ==========================================
        // 初始化API层
        // ==========================================
        let orchestrator =
            IngestionOrchestrator::new(ingest_repo, ConfigManager::from_connection(conn)?);
        let ingest_api = Arc::new(IngestApi::new(orchestrator, field_repo));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            ingest_api,
            config_manager: Arc::new(config_manager),
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 CONTACT_INGEST_DB > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./contact_ingest.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("contact-ingest");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("contact_ingest.db");
        }
    }

    path.to_string_lossy().to_string()
}
