// ==========================================
// 联系人导入服务 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod field_mapping_repo;
pub mod ingest_repo;
pub mod ingest_repo_impl;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use field_mapping_repo::FieldMappingRepository;
pub use ingest_repo::{EntityRepository, IngestRepository, SourceRepository, StagingRepository};
pub use ingest_repo_impl::SqliteIngestRepository;
