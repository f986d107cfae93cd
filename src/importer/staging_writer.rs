// ==========================================
// 联系人导入服务 - 暂存写入器
// ==========================================
// 职责: 解析记录 → source_data 暂存行（固定大小批次）
// 规则:
// - 每批一次仓储调用（一个事务）
// - 批次并发上限可配置，行之间无顺序语义
// - 批次 K 失败不影响批次 K+1，最终报告 persisted / attempted
// - 取消: 未开始的批次跳过，进行中的批次完成
// - 不去重（至少一次写入）
// ==========================================

use crate::domain::ingest::{BatchFailure, StagingReport};
use crate::domain::record::RawRecord;
use crate::domain::source::NewStagedRow;
use crate::importer::error::IngestError;
use crate::repository::ingest_repo::StagingRepository;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

enum BatchOutcome {
    Written(usize),
    Failed(BatchFailure),
    Skipped,
}

pub struct StagingWriter<R>
where
    R: StagingRepository,
{
    repo: Arc<R>,
    batch_size: usize,
    concurrency: usize,
}

impl<R> StagingWriter<R>
where
    R: StagingRepository,
{
    pub fn new(repo: Arc<R>, batch_size: usize, concurrency: usize) -> Self {
        Self {
            repo,
            batch_size: batch_size.max(1),
            concurrency: concurrency.max(1),
        }
    }

    /// 写入全部记录
    ///
    /// # 参数
    /// - source_id: 所属来源
    /// - records: 解析记录（行号按位置 1 起编号）
    /// - list_id: 目标列表（可选，写入每个暂存行）
    /// - cancel: 取消信号
    pub async fn write(
        &self,
        source_id: i64,
        records: Vec<RawRecord>,
        list_id: Option<String>,
        cancel: &CancellationToken,
    ) -> StagingReport {
        let attempted = records.len();

        let mut batches: Vec<(usize, usize, Vec<NewStagedRow>)> = Vec::new();
        let mut current = Vec::with_capacity(self.batch_size.min(attempted));
        for (idx, raw_data) in records.into_iter().enumerate() {
            current.push(NewStagedRow {
                row_number: idx as i64 + 1,
                raw_data,
                list_id: list_id.clone(),
            });
            if current.len() == self.batch_size {
                let first_row = idx + 2 - current.len();
                batches.push((batches.len(), first_row, std::mem::take(&mut current)));
            }
        }
        if !current.is_empty() {
            let first_row = attempted + 1 - current.len();
            batches.push((batches.len(), first_row, current));
        }

        let batch_count = batches.len();
        info!(
            source_id = source_id,
            rows = attempted,
            batches = batch_count,
            batch_size = self.batch_size,
            concurrency = self.concurrency,
            "开始写入暂存行"
        );

        let repo = &self.repo;
        let outcomes: Vec<BatchOutcome> = stream::iter(batches)
            .map(|(batch_index, first_row, rows)| async move {
                if cancel.is_cancelled() {
                    debug!(batch_index = batch_index, "已取消，跳过批次");
                    return BatchOutcome::Skipped;
                }

                let last_row = first_row + rows.len() - 1;
                match repo.insert_staged_batch(source_id, rows).await {
                    Ok(count) => {
                        debug!(batch_index = batch_index, rows = count, "批次写入完成");
                        BatchOutcome::Written(count)
                    }
                    Err(e) => {
                        warn!(
                            source_id = source_id,
                            batch_index = batch_index,
                            first_row = first_row,
                            last_row = last_row,
                            error = %e,
                            "批次写入失败"
                        );
                        BatchOutcome::Failed(BatchFailure {
                            batch_index,
                            first_row,
                            last_row,
                            message: e.to_string(),
                        })
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = StagingReport {
            attempted,
            batches: batch_count,
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                BatchOutcome::Written(count) => report.persisted += count,
                BatchOutcome::Failed(failure) => report.failures.push(failure),
                BatchOutcome::Skipped => report.cancelled = true,
            }
        }
        report.failures.sort_by_key(|f| f.batch_index);

        info!(
            source_id = source_id,
            attempted = report.attempted,
            persisted = report.persisted,
            failed_batches = report.failures.len(),
            cancelled = report.cancelled,
            "暂存写入结束"
        );
        report
    }
}

impl BatchFailure {
    /// 转为错误（进入结果错误列表）
    pub fn to_error(&self) -> IngestError {
        IngestError::BatchWrite {
            batch_index: self.batch_index,
            first_row: self.first_row,
            last_row: self.last_row,
            message: self.message.clone(),
        }
    }
}
