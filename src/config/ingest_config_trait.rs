// ==========================================
// 联系人导入服务 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入管道所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_STAGING_CONCURRENCY: usize = 4;
pub const DEFAULT_TRANSFORM_WORKERS: usize = 4;
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

// ==========================================
// IngestConfigReader Trait
// ==========================================
// 用途: 导入管道所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）, StaticIngestConfig
#[async_trait]
pub trait IngestConfigReader: Send + Sync {
    /// 暂存批次大小（每批行数）
    ///
    /// # 默认值
    /// - 100
    async fn batch_size(&self) -> RepositoryResult<usize>;

    /// 暂存批次并发上限
    ///
    /// # 默认值
    /// - 4
    async fn staging_concurrency(&self) -> RepositoryResult<usize>;

    /// 转换阶段并发行数上限
    ///
    /// # 默认值
    /// - 4
    async fn transform_workers(&self) -> RepositoryResult<usize>;

    /// 预览返回的数据行数
    ///
    /// # 默认值
    /// - 5
    async fn preview_rows(&self) -> RepositoryResult<usize>;

    /// 一次读取全部导入配置
    async fn settings(&self) -> RepositoryResult<StaticIngestConfig> {
        Ok(StaticIngestConfig {
            batch_size: self.batch_size().await?,
            staging_concurrency: self.staging_concurrency().await?,
            transform_workers: self.transform_workers().await?,
            preview_rows: self.preview_rows().await?,
        })
    }
}

// ==========================================
// StaticIngestConfig - 内存配置
// ==========================================
// 用途: 测试、无配置库的调用方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticIngestConfig {
    pub batch_size: usize,
    pub staging_concurrency: usize,
    pub transform_workers: usize,
    pub preview_rows: usize,
}

impl Default for StaticIngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            staging_concurrency: DEFAULT_STAGING_CONCURRENCY,
            transform_workers: DEFAULT_TRANSFORM_WORKERS,
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }
}

#[async_trait]
impl IngestConfigReader for StaticIngestConfig {
    async fn batch_size(&self) -> RepositoryResult<usize> {
        Ok(self.batch_size.max(1))
    }

    async fn staging_concurrency(&self) -> RepositoryResult<usize> {
        Ok(self.staging_concurrency.max(1))
    }

    async fn transform_workers(&self) -> RepositoryResult<usize> {
        Ok(self.transform_workers.max(1))
    }

    async fn preview_rows(&self) -> RepositoryResult<usize> {
        Ok(self.preview_rows)
    }
}
