// ==========================================
// 联系人导入服务 - 导入仓储 Trait
// ==========================================
// 职责: 定义导入相关数据访问接口（不包含业务逻辑）
// 红线: Repository 不含业务规则，只做数据 CRUD
// 约束: 单条语句 ACID；跨语句不假设事务，单行转换写入除外
// ==========================================

use crate::domain::entity::{EntityBundle, PersistedBundle};
use crate::domain::source::{NewSource, NewStagedRow, Source, SourceStatus, StagedRow};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// SourceRepository Trait
// ==========================================
// 用途: sources 表读写
// 实现者: SqliteIngestRepository
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// 创建导入来源（创建后不可变）
    async fn create_source(&self, source: NewSource) -> RepositoryResult<Source>;

    /// 按 ID 查询来源
    async fn find_source(&self, source_id: i64) -> RepositoryResult<Option<Source>>;

    /// 来源处理进度（暂存/已处理/失败/待处理行数）
    async fn source_status(&self, source_id: i64) -> RepositoryResult<Option<SourceStatus>>;
}

// ==========================================
// StagingRepository Trait
// ==========================================
// 用途: source_data 表（暂存行）读写
// 实现者: SqliteIngestRepository
#[async_trait]
pub trait StagingRepository: Send + Sync {
    /// 写入一个暂存批次（批次内单事务）
    ///
    /// # 返回
    /// - Ok(usize): 写入行数
    /// - Err(StagingOverflow): 写入后将超过来源声明行数，整批拒绝
    async fn insert_staged_batch(
        &self,
        source_id: i64,
        rows: Vec<NewStagedRow>,
    ) -> RepositoryResult<usize>;

    /// 统计来源的暂存行数
    async fn count_staged(&self, source_id: i64) -> RepositoryResult<i64>;

    /// 查询来源下 processed = 0 的暂存行（按行号排序）
    async fn list_unprocessed(&self, source_id: i64) -> RepositoryResult<Vec<StagedRow>>;

    /// 记录单行失败：写 error_log，processed 保持 0
    async fn record_row_failure(&self, staged_row_id: i64, message: &str)
        -> RepositoryResult<()>;
}

// ==========================================
// EntityRepository Trait
// ==========================================
// 用途: 规范化实体写入
// 实现者: SqliteIngestRepository
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// 写入单行产生的实体并标记该暂存行 processed = 1（同一事务）
    ///
    /// # 说明
    /// - 暂存行已不是 processed = 0 时整体回滚并返回错误
    /// - 所有取值均以参数绑定写入
    async fn complete_row(
        &self,
        row: &StagedRow,
        team_id: &str,
        bundle: &EntityBundle,
    ) -> RepositoryResult<PersistedBundle>;
}

/// 导入管道所需的全部仓储能力
pub trait IngestRepository: SourceRepository + StagingRepository + EntityRepository {}

impl<T> IngestRepository for T where T: SourceRepository + StagingRepository + EntityRepository {}
