// ==========================================
// 联系人导入服务 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + axum
// 系统定位: 仪表盘 CSV 上传 → 暂存 → 规范化联系人实体
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 解析/映射/暂存/转换
pub mod importer;

// 配置层 - 管道配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 共享状态与 HTTP 路由
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{RunState, StagedRowState, TargetCategory};

// 领域实体
pub use domain::{
    ColumnSelection, IngestRequest, IngestResult, MappingPlan, RawRecord, Source, StagedRow,
};

// 导入管道
pub use importer::{
    CsvRowParser, IngestError, IngestionOrchestrator, MappingResolver, StagingWriter,
    TransformEngine,
};

// API
pub use api::{ApiError, IngestApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "联系人导入服务";
