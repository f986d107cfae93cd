// ==========================================
// 联系人导入服务 - 导入编排器
// ==========================================
// 职责: 创建来源 → 暂存 → 转换 → 汇总结果
// 状态: Created → Staging → Transforming → Completed / PartiallyCompleted
//       Created → Staging → Failed（暂存 0 行）
//       任意阶段取消 → Cancelled
// 红线: 对调用方从不返回 Err，所有失败折叠进 IngestResult
// ==========================================

use crate::config::{IngestConfigReader, StaticIngestConfig};
use crate::domain::ingest::{IngestJob, IngestResult, StagingReport, TransformReport};
use crate::domain::mapping::MappingPlan;
use crate::domain::source::NewSource;
use crate::domain::types::RunState;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::IngestError;
use crate::importer::ingest_trait::ValueCleaner;
use crate::importer::staging_writer::StagingWriter;
use crate::importer::transform_engine::TransformEngine;
use crate::repository::ingest_repo::IngestRepository;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// 来源类型（目前只有 CSV 上传）
pub const SOURCE_TYPE_CSV: &str = "csv";

// ==========================================
// IngestionOrchestrator
// ==========================================
pub struct IngestionOrchestrator<R, C>
where
    R: IngestRepository,
    C: IngestConfigReader,
{
    // 数据访问层
    repo: Arc<R>,

    // 配置读取器
    config: C,

    // 取值清洗/校验
    cleaner: Arc<dyn ValueCleaner>,
}

impl<R, C> IngestionOrchestrator<R, C>
where
    R: IngestRepository,
    C: IngestConfigReader,
{
    pub fn new(repo: Arc<R>, config: C) -> Self {
        Self::with_cleaner(repo, config, Arc::new(DataCleaner::new()))
    }

    pub fn with_cleaner(repo: Arc<R>, config: C, cleaner: Arc<dyn ValueCleaner>) -> Self {
        Self {
            repo,
            config,
            cleaner,
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    async fn load_settings(&self) -> StaticIngestConfig {
        match self.config.settings().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "读取导入配置失败，使用默认值");
                StaticIngestConfig::default()
            }
        }
    }

    /// 单入口导入
    ///
    /// # 流程
    /// 1. 拒绝空映射计划
    /// 2. 创建 Source（失败则中止，rowsProcessed = 0）
    /// 3. 分批暂存（部分失败继续）
    /// 4. 转换已暂存行
    /// 5. 汇总结果
    #[instrument(skip(self, job, cancel), fields(file_name = %job.file_name, rows = job.records.len()))]
    pub async fn ingest(&self, job: IngestJob, cancel: &CancellationToken) -> IngestResult {
        let start_time = Instant::now();
        let mut warnings = job.plan.warnings.clone();

        // === 步骤 1: 映射计划 ===
        if job.plan.is_empty() {
            warn!("映射计划为空，拒绝导入");
            return IngestResult::rejected(vec![IngestError::EmptyMapping.to_string()], warnings);
        }
        warnings.extend(missing_column_warnings(&job));

        if cancel.is_cancelled() {
            return IngestResult {
                state: RunState::Cancelled,
                ..IngestResult::rejected(vec![IngestError::Cancelled.to_string()], warnings)
            };
        }

        let settings = self.load_settings().await;
        debug!(?settings, "导入配置");

        // === 步骤 2: 创建 Source ===
        let attempted = job.records.len();
        let new_source = NewSource {
            file_name: job.file_name.clone(),
            source_type: SOURCE_TYPE_CSV.to_string(),
            byte_size: job.byte_size,
            record_count: attempted as i64,
            team_id: job.team_id.clone(),
            profile_id: job.profile_id.clone(),
            list_id: job.list_id.clone(),
        };

        let source = match self.repo.create_source(new_source).await {
            Ok(source) => source,
            Err(e) => {
                error!(error = %e, "来源创建失败，导入中止");
                let err = IngestError::SourceCreation(e.to_string());
                return IngestResult {
                    rows_attempted: Some(attempted),
                    ..IngestResult::rejected(vec![err.to_string()], warnings)
                };
            }
        };
        info!(source_id = source.id, state = %RunState::Created, "来源已创建");

        // === 步骤 3: 暂存 ===
        info!(source_id = source.id, state = %RunState::Staging, "进入暂存阶段");
        let writer = StagingWriter::new(
            self.repo.clone(),
            settings.batch_size,
            settings.staging_concurrency,
        );
        let staging = writer
            .write(source.id, job.records, job.list_id.clone(), cancel)
            .await;

        if staging.persisted == 0 {
            let mut errors: Vec<String> =
                staging.failures.iter().map(|f| f.to_error().to_string()).collect();
            let state = if staging.cancelled {
                errors.push(IngestError::Cancelled.to_string());
                RunState::Cancelled
            } else {
                errors.push("no rows were staged".to_string());
                RunState::Failed
            };
            warn!(source_id = source.id, state = %state, "暂存 0 行，导入结束");
            return IngestResult {
                success: false,
                source_id: Some(source.id),
                rows_processed: 0,
                rows_failed: Some(0),
                errors,
                warnings,
                rows_staged: Some(0),
                rows_attempted: Some(attempted),
                state,
                run_id: None,
            };
        }

        if staging.cancelled {
            let mut result = summarise(source.id, Some(&staging), TransformReport::default(), warnings);
            result.errors.push(IngestError::Cancelled.to_string());
            result.success = false;
            result.state = RunState::Cancelled;
            info!(source_id = source.id, persisted = staging.persisted, "暂存阶段已取消");
            return result;
        }

        // === 步骤 4: 转换 ===
        info!(source_id = source.id, state = %RunState::Transforming, "进入转换阶段");
        let engine = TransformEngine::new(
            self.repo.clone(),
            self.cleaner.clone(),
            settings.transform_workers,
        );
        let transform = match engine.run(source.id, &job.plan, cancel).await {
            Ok(report) => report,
            Err(e) => {
                error!(source_id = source.id, error = %e, "转换阶段失败");
                let mut result =
                    summarise(source.id, Some(&staging), TransformReport::default(), warnings);
                result.errors.push(e.to_string());
                result.success = false;
                result.state = RunState::Failed;
                return result;
            }
        };

        // === 步骤 5: 汇总 ===
        let result = summarise(source.id, Some(&staging), transform, warnings);
        info!(
            source_id = source.id,
            state = %result.state,
            rows_processed = result.rows_processed,
            rows_failed = result.rows_failed.unwrap_or(0),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "导入完成"
        );
        result
    }

    /// 对已有来源重新执行转换（重试未处理行）
    #[instrument(skip(self, plan, cancel))]
    pub async fn retry(
        &self,
        source_id: i64,
        plan: &MappingPlan,
        cancel: &CancellationToken,
    ) -> IngestResult {
        let warnings = plan.warnings.clone();
        if plan.is_empty() {
            return IngestResult::rejected(vec![IngestError::EmptyMapping.to_string()], warnings);
        }

        let settings = self.load_settings().await;
        let engine = TransformEngine::new(
            self.repo.clone(),
            self.cleaner.clone(),
            settings.transform_workers,
        );

        match engine.run(source_id, plan, cancel).await {
            Ok(transform) => {
                let result = summarise(source_id, None, transform, warnings);
                info!(
                    source_id = source_id,
                    state = %result.state,
                    rows_processed = result.rows_processed,
                    "重试转换完成"
                );
                result
            }
            Err(e) => {
                warn!(source_id = source_id, error = %e, "重试转换失败");
                IngestResult {
                    source_id: Some(source_id),
                    ..IngestResult::rejected(vec![e.to_string()], warnings)
                }
            }
        }
    }
}

/// 映射列在数据中不存在时告警（以首行为准）
fn missing_column_warnings(job: &IngestJob) -> Vec<String> {
    let first = match job.records.first() {
        Some(r) => r,
        None => return Vec::new(),
    };
    let present: HashSet<&str> = first.columns().collect();

    let mut seen = HashSet::new();
    job.plan
        .entries
        .iter()
        .filter(|e| !present.contains(e.column.as_str()) && seen.insert(e.column.as_str()))
        .map(|e| format!("mapped column '{}' is not present in the data", e.column))
        .collect()
}

/// 汇总阶段报告 → 结果与终态
fn summarise(
    source_id: i64,
    staging: Option<&StagingReport>,
    transform: TransformReport,
    mut warnings: Vec<String>,
) -> IngestResult {
    let mut errors: Vec<String> = Vec::new();
    let mut batch_failed = false;

    if let Some(staging) = staging {
        batch_failed = !staging.failures.is_empty();
        errors.extend(staging.failures.iter().map(|f| f.to_error().to_string()));
    }
    errors.extend(transform.failures.iter().map(|f| f.message.clone()));
    warnings.extend(transform.warnings.iter().cloned());

    let state = if transform.cancelled {
        errors.push(IngestError::Cancelled.to_string());
        RunState::Cancelled
    } else if transform.processed == 0 && transform.failed > 0 {
        RunState::Failed
    } else if batch_failed || transform.failed > 0 {
        RunState::PartiallyCompleted
    } else {
        RunState::Completed
    };

    IngestResult {
        success: state.is_success(),
        source_id: Some(source_id),
        rows_processed: transform.processed,
        rows_failed: Some(transform.failed),
        errors,
        warnings,
        rows_staged: staging.map(|s| s.persisted),
        rows_attempted: staging.map(|s| s.attempted),
        state,
        run_id: None,
    }
}
