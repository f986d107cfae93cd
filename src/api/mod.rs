// ==========================================
// 联系人导入服务 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供 HTTP 路由与进程内调用方使用
// ==========================================

pub mod error;
pub mod ingest_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use ingest_api::{IngestApi, SqliteIngestApi};
