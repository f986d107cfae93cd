// ==========================================
// 联系人导入服务 - 应用层
// ==========================================
// 职责: 共享状态 + HTTP 路由,连接远程调用方与后端
// ==========================================

pub mod http;
pub mod state;

// 重导出
pub use http::{router, ErrorResponse};
pub use state::{get_default_db_path, AppState};
