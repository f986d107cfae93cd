// ==========================================
// 联系人导入服务 - 导入API
// ==========================================
// 职责: 进程内调用入口（HTTP 层复用同一套行为）
// - 映射校验（权威字段清单）→ 编排器
// - CSV 文本先经 RowParser，解析告警排在结果告警最前
// - 运行注册表: run_id → CancellationToken，用于取消
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ingest_config_trait::DEFAULT_PREVIEW_ROWS;
use crate::config::{ConfigManager, IngestConfigReader};
use crate::domain::ingest::{
    CsvIngestRequest, IngestJob, IngestRequest, IngestResult, PreviewRequest, PreviewResponse,
    RetryRequest,
};
use crate::domain::mapping::{ColumnSelection, MappingPlan};
use crate::domain::record::RawRecord;
use crate::domain::source::{FieldDefinition, SourceStatus};
use crate::importer::{
    CsvRowParser, FieldCatalog, IngestError, IngestionOrchestrator, MappingResolver,
};
use crate::repository::{FieldMappingRepository, IngestRepository, SqliteIngestRepository};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// 生产环境组合（SQLite 仓储 + config_kv 配置 + field_mappings 清单）
pub type SqliteIngestApi = IngestApi<SqliteIngestRepository, ConfigManager, FieldMappingRepository>;

/// 单次导入的原始输入（解析后、映射前）
struct RunInput {
    file_name: String,
    records: Vec<RawRecord>,
    mappings: ColumnSelection,
    team_id: String,
    profile_id: Option<String>,
    list_id: Option<String>,
    run_id: Option<String>,
    byte_size: Option<i64>,
}

/// 导入API
pub struct IngestApi<R, C, F>
where
    R: IngestRepository,
    C: IngestConfigReader,
    F: FieldCatalog,
{
    orchestrator: IngestionOrchestrator<R, C>,
    catalog: F,
    parser: CsvRowParser,
    resolver: MappingResolver,
    runs: Mutex<HashMap<String, CancellationToken>>,
}

impl<R, C, F> IngestApi<R, C, F>
where
    R: IngestRepository,
    C: IngestConfigReader,
    F: FieldCatalog,
{
    /// 创建新的IngestApi实例
    pub fn new(orchestrator: IngestionOrchestrator<R, C>, catalog: F) -> Self {
        Self {
            orchestrator,
            catalog,
            parser: CsvRowParser::new(),
            resolver: MappingResolver::new(),
            runs: Mutex::new(HashMap::new()),
        }
    }

    // ==========================================
    // 导入
    // ==========================================

    /// 导入已解析的记录（远程调用的主入口）
    ///
    /// # 返回
    /// - 永远返回 IngestResult；失败体现在 success / errors
    pub async fn ingest(&self, req: IngestRequest) -> IngestResult {
        self.run(RunInput {
            file_name: req.file_name,
            records: req.data,
            mappings: req.mappings,
            team_id: req.team_id,
            profile_id: req.profile_id,
            list_id: req.list_id,
            run_id: req.run_id,
            byte_size: None,
        })
        .await
    }

    /// 导入 CSV 文本（先解析）
    pub async fn ingest_csv(&self, req: CsvIngestRequest) -> IngestResult {
        let byte_size = req.csv.len() as i64;
        let parsed = match self
            .parser
            .parse(req.csv.into_bytes())
            .and_then(|p| p.collect_records())
        {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(file_name = %req.file_name, error = %e, "CSV 解析失败");
                return IngestResult::rejected(vec![e.to_string()], Vec::new());
            }
        };
        let (records, parse_warnings) = parsed;

        let result = self
            .run(RunInput {
                file_name: req.file_name,
                records,
                mappings: req.mappings,
                team_id: req.team_id,
                profile_id: req.profile_id,
                list_id: req.list_id,
                run_id: req.run_id,
                byte_size: Some(byte_size),
            })
            .await;

        result.with_leading_warnings(parse_warnings.iter().map(ToString::to_string).collect())
    }

    /// 对已有来源重试转换
    ///
    /// # 返回
    /// - Err(NotFound): 来源不存在
    /// - Ok(IngestResult): 其余情况（映射错误也体现在结果中）
    pub async fn retry(&self, source_id: i64, req: RetryRequest) -> ApiResult<IngestResult> {
        if self
            .orchestrator
            .repository()
            .find_source(source_id)
            .await?
            .is_none()
        {
            return Err(ApiError::NotFound(format!("Source(id={})", source_id)));
        }

        let plan = match self.resolve(&req.mappings) {
            Ok(plan) => plan,
            Err(message) => return Ok(IngestResult::rejected(vec![message], Vec::new())),
        };

        let run_id = req.run_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let guard = match self.register_run(&run_id) {
            Ok(guard) => guard,
            Err(message) => return Ok(IngestResult::rejected(vec![message], Vec::new())),
        };

        let result = self
            .orchestrator
            .retry(source_id, &plan, &guard.token)
            .await
            .with_run_id(run_id);
        Ok(result)
    }

    async fn run(&self, input: RunInput) -> IngestResult {
        let plan = match self.resolve(&input.mappings) {
            Ok(plan) => plan,
            Err(message) => {
                warn!(file_name = %input.file_name, error = %message, "映射校验失败");
                return IngestResult::rejected(vec![message], Vec::new());
            }
        };

        let run_id = input.run_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let guard = match self.register_run(&run_id) {
            Ok(guard) => guard,
            Err(message) => return IngestResult::rejected(vec![message], Vec::new()),
        };
        info!(run_id = %run_id, file_name = %input.file_name, rows = input.records.len(), "开始导入");

        let job = IngestJob {
            file_name: input.file_name,
            records: input.records,
            plan,
            team_id: input.team_id,
            profile_id: input.profile_id,
            list_id: input.list_id,
            byte_size: input.byte_size,
        };

        self.orchestrator
            .ingest(job, &guard.token)
            .await
            .with_run_id(run_id)
    }

    /// 列选择 → 映射计划；失败时返回面向用户的错误文本
    fn resolve(&self, mappings: &ColumnSelection) -> Result<MappingPlan, String> {
        let fields = self.catalog.list_fields().map_err(|e| e.to_string())?;
        self.resolver
            .resolve(mappings, &fields)
            .map_err(|e: IngestError| e.to_string())
    }

    // ==========================================
    // 取消
    // ==========================================

    /// 取消进行中的运行
    ///
    /// # 返回
    /// - Err(NotFound): run_id 未知或已结束
    pub fn cancel(&self, run_id: &str) -> ApiResult<()> {
        let runs = self
            .runs
            .lock()
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        match runs.get(run_id) {
            Some(token) => {
                token.cancel();
                info!(run_id = run_id, "已发出取消信号");
                Ok(())
            }
            None => Err(ApiError::NotFound(format!("run {}", run_id))),
        }
    }

    /// 进行中的运行 ID
    pub fn active_runs(&self) -> Vec<String> {
        match self.runs.lock() {
            Ok(runs) => {
                let mut ids: Vec<String> = runs.keys().cloned().collect();
                ids.sort();
                ids
            }
            Err(_) => Vec::new(),
        }
    }

    fn register_run(&self, run_id: &str) -> Result<RunGuard<'_>, String> {
        let mut runs = self.runs.lock().map_err(|e| e.to_string())?;
        if runs.contains_key(run_id) {
            return Err(format!("run id '{}' is already in progress", run_id));
        }
        let token = CancellationToken::new();
        runs.insert(run_id.to_string(), token.clone());
        Ok(RunGuard {
            runs: &self.runs,
            run_id: run_id.to_string(),
            token,
        })
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 预览 CSV：表头、前 N 行、解析告警、建议映射
    pub async fn preview(&self, req: PreviewRequest) -> ApiResult<PreviewResponse> {
        let parsed = self.parser.parse(req.csv.into_bytes())?;
        let (records, warnings) = parsed.collect_records()?;

        let preview_rows = match self.orchestrator.config().preview_rows().await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "读取预览行数失败，使用默认值");
                DEFAULT_PREVIEW_ROWS
            }
        };

        let fields = self.catalog.list_fields()?;
        let suggested_mappings = self.resolver.suggest(parsed.headers(), &fields);
        let total_rows = records.len();

        Ok(PreviewResponse {
            headers: parsed.headers().to_vec(),
            rows: records.into_iter().take(preview_rows).collect(),
            total_rows,
            warnings: warnings.iter().map(ToString::to_string).collect(),
            suggested_mappings,
        })
    }

    /// 权威字段清单（按分类、显示顺序）
    pub fn list_fields(&self) -> ApiResult<Vec<FieldDefinition>> {
        Ok(self.catalog.list_fields()?)
    }

    /// 来源处理进度
    pub async fn source_status(&self, source_id: i64) -> ApiResult<SourceStatus> {
        self.orchestrator
            .repository()
            .source_status(source_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Source(id={})", source_id)))
    }
}

/// 运行结束（含 future 被丢弃）时从注册表移除
struct RunGuard<'a> {
    runs: &'a Mutex<HashMap<String, CancellationToken>>,
    run_id: String,
    token: CancellationToken,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut runs) = self.runs.lock() {
            runs.remove(&self.run_id);
        }
    }
}
