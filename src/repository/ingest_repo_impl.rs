// ==========================================
// 联系人导入服务 - 导入 Repository 实现
// ==========================================
// 职责: 实现来源/暂存/实体数据访问（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// 约束: 暂存批次与单行转换各自一个事务
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use core::SqliteIngestRepository;

use crate::domain::entity::{EntityBundle, PersistedBundle};
use crate::domain::source::{NewSource, NewStagedRow, Source, SourceStatus, StagedRow};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::ingest_repo::{EntityRepository, SourceRepository, StagingRepository};
use async_trait::async_trait;

#[async_trait]
impl SourceRepository for SqliteIngestRepository {
    async fn create_source(&self, source: NewSource) -> RepositoryResult<Source> {
        let conn = self.get_conn()?;
        let id = Self::insert_source(&conn, &source)?;

        Self::query_source(&conn, id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "Source".to_string(),
            id: id.to_string(),
        })
    }

    async fn find_source(&self, source_id: i64) -> RepositoryResult<Option<Source>> {
        let conn = self.get_conn()?;
        Self::query_source(&conn, source_id)
    }

    async fn source_status(&self, source_id: i64) -> RepositoryResult<Option<SourceStatus>> {
        let conn = self.get_conn()?;
        Self::query_status(&conn, source_id)
    }
}

#[async_trait]
impl StagingRepository for SqliteIngestRepository {
    /// 批量写入暂存行（事务化）
    async fn insert_staged_batch(
        &self,
        source_id: i64,
        rows: Vec<NewStagedRow>,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let count = Self::insert_staged_batch_tx(&tx, source_id, &rows)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(count)
    }

    async fn count_staged(&self, source_id: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::query_count_staged(&conn, source_id)
    }

    async fn list_unprocessed(&self, source_id: i64) -> RepositoryResult<Vec<StagedRow>> {
        let conn = self.get_conn()?;
        Self::query_unprocessed(&conn, source_id)
    }

    async fn record_row_failure(
        &self,
        staged_row_id: i64,
        message: &str,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::record_row_failure_stmt(&conn, staged_row_id, message)
    }
}

#[async_trait]
impl EntityRepository for SqliteIngestRepository {
    /// 写入单行实体 + 翻转 processed（同一事务，失败整体回滚）
    async fn complete_row(
        &self,
        row: &StagedRow,
        team_id: &str,
        bundle: &EntityBundle,
    ) -> RepositoryResult<PersistedBundle> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let persisted = Self::complete_row_tx(&tx, row, team_id, bundle)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(persisted)
    }
}
