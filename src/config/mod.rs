// ==========================================
// 联系人导入服务 - 配置层
// ==========================================
// 职责: 导入管道配置管理（批次大小、并发度、预览行数）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod ingest_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use ingest_config_trait::{IngestConfigReader, StaticIngestConfig};
