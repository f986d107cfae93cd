// ==========================================
// 联系人导入服务 - 转换引擎
// ==========================================
// 职责: 未处理暂存行 + MappingPlan → 规范化实体
// 流程: 取 processed=0 行 → 按分类分桶 → 清洗 → 校验 → 单行事务写入
// 规则:
// - 空值跳过；整行无可用值 → 标记已处理、不建实体、告警
// - 单行失败: 事务回滚，写 error_log，processed 保持 0，不影响其他行
// - 重复调用只处理仍未处理的行（行级幂等）
// - 不做联系人/公司去重
// ==========================================

use crate::domain::entity::{
    AddressRecord, CompanyRecord, ContactRecord, EmailAddressRecord, EntityBundle,
    PhoneNumberRecord, UrlRecord,
};
use crate::domain::ingest::{RowFailure, TransformReport};
use crate::domain::mapping::{MappingPlan, TargetField};
use crate::domain::source::StagedRow;
use crate::domain::types::TargetCategory;
use crate::importer::error::{IngestError, IngestResultOf};
use crate::importer::ingest_trait::ValueCleaner;
use crate::repository::error::RepositoryError;
use crate::repository::ingest_repo::IngestRepository;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

enum RowOutcome {
    Processed { entities: usize },
    Empty { row_number: i64 },
    Failed(RowFailure),
    Skipped,
}

pub struct TransformEngine<R>
where
    R: IngestRepository,
{
    repo: Arc<R>,
    cleaner: Arc<dyn ValueCleaner>,
    workers: usize,
}

impl<R> TransformEngine<R>
where
    R: IngestRepository,
{
    pub fn new(repo: Arc<R>, cleaner: Arc<dyn ValueCleaner>, workers: usize) -> Self {
        Self {
            repo,
            cleaner,
            workers: workers.max(1),
        }
    }

    /// 转换来源下全部未处理行
    ///
    /// # 返回
    /// - Ok(TransformReport): 逐行结果汇总（单行失败不产生 Err）
    /// - Err: 来源不存在或无法读取暂存行
    pub async fn run(
        &self,
        source_id: i64,
        plan: &MappingPlan,
        cancel: &CancellationToken,
    ) -> IngestResultOf<TransformReport> {
        let source = self
            .repo
            .find_source(source_id)
            .await?
            .ok_or_else(|| {
                IngestError::Repository(RepositoryError::NotFound {
                    entity: "Source".to_string(),
                    id: source_id.to_string(),
                })
            })?;

        let rows = self.repo.list_unprocessed(source_id).await?;
        info!(
            source_id = source_id,
            rows = rows.len(),
            workers = self.workers,
            "开始转换暂存行"
        );

        let team_id = source.team_id.as_str();
        let outcomes: Vec<RowOutcome> = stream::iter(rows)
            .map(|row| async move {
                if cancel.is_cancelled() {
                    return RowOutcome::Skipped;
                }
                self.process_row(&row, team_id, plan).await
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut report = TransformReport::default();
        let mut empty_rows = Vec::new();
        for outcome in outcomes {
            match outcome {
                RowOutcome::Processed { entities } => {
                    report.processed += 1;
                    report.entities_created += entities;
                }
                RowOutcome::Empty { row_number } => {
                    report.processed += 1;
                    empty_rows.push(row_number);
                }
                RowOutcome::Failed(failure) => {
                    report.failed += 1;
                    report.failures.push(failure);
                }
                RowOutcome::Skipped => report.cancelled = true,
            }
        }
        report.failures.sort_by_key(|f| (f.row_number, f.staged_row_id));
        empty_rows.sort_unstable();
        report.warnings = empty_rows
            .into_iter()
            .map(|n| format!("row {}: no mapped values, nothing created", n))
            .collect();

        info!(
            source_id = source_id,
            processed = report.processed,
            failed = report.failed,
            entities = report.entities_created,
            cancelled = report.cancelled,
            "转换结束"
        );
        Ok(report)
    }

    async fn process_row(&self, row: &StagedRow, team_id: &str, plan: &MappingPlan) -> RowOutcome {
        let bundle = match self.build_bundle(row, plan) {
            Ok(bundle) => bundle,
            Err(message) => return self.fail_row(row, message).await,
        };

        let empty = bundle.is_empty();
        match self.repo.complete_row(row, team_id, &bundle).await {
            Ok(persisted) => {
                debug!(
                    staged_row_id = row.id,
                    contact_id = ?persisted.contact_id,
                    company_id = ?persisted.company_id,
                    children = persisted.child_ids.len(),
                    "行转换完成"
                );
                if empty {
                    RowOutcome::Empty {
                        row_number: row.row_number,
                    }
                } else {
                    RowOutcome::Processed {
                        entities: bundle.record_count(),
                    }
                }
            }
            Err(e) => self.fail_row(row, e.to_string()).await,
        }
    }

    async fn fail_row(&self, row: &StagedRow, message: String) -> RowOutcome {
        let error = IngestError::RowTransform {
            row_number: row.row_number,
            message,
        }
        .to_string();

        warn!(staged_row_id = row.id, error = %error, "行转换失败");
        if let Err(e) = self.repo.record_row_failure(row.id, &error).await {
            warn!(staged_row_id = row.id, error = %e, "error_log 写入失败");
        }

        RowOutcome::Failed(RowFailure {
            staged_row_id: row.id,
            row_number: row.row_number,
            message: error,
        })
    }

    /// 按映射计划分桶并清洗（不做 I/O）
    ///
    /// # 返回
    /// - Err(String): 下游约束校验失败（不含行号）
    pub fn build_bundle(&self, row: &StagedRow, plan: &MappingPlan) -> Result<EntityBundle, String> {
        let mut contact = ContactRecord::default();
        let mut company = CompanyRecord::default();
        let mut address = AddressRecord::default();
        let mut bundle = EntityBundle::default();
        let (mut has_contact, mut has_company, mut has_address) = (false, false, false);

        for entry in &plan.entries {
            let raw = match row.raw_data.get(&entry.column) {
                Some(v) => v,
                None => continue,
            };
            let value = match self.cleaner.sanitize(raw) {
                Some(v) => v,
                None => continue,
            };
            self.cleaner.validate(&entry.target, &value)?;

            match entry.target.category {
                TargetCategory::Contact => {
                    assign_contact(&mut contact, &entry.target, value);
                    has_contact = true;
                }
                TargetCategory::Company => {
                    assign_company(&mut company, &entry.target, value);
                    has_company = true;
                }
                TargetCategory::Address => {
                    assign_address(&mut address, &entry.target, value);
                    has_address = true;
                }
                TargetCategory::Email => bundle.emails.push(EmailAddressRecord { email: value }),
                TargetCategory::Phone => bundle.phones.push(PhoneNumberRecord { number: value }),
                TargetCategory::Url => bundle.urls.push(UrlRecord { url: value }),
            }
        }

        if has_contact {
            bundle.contact = Some(contact);
        }
        if has_company {
            bundle.company = Some(company);
        }
        if has_address {
            bundle.address = Some(address);
        }

        // 子实体需要归属: 无联系人且无公司时建空联系人
        if bundle.has_children() && bundle.contact.is_none() && bundle.company.is_none() {
            bundle.contact = Some(ContactRecord::default());
        }

        Ok(bundle)
    }
}

fn assign_contact(contact: &mut ContactRecord, target: &TargetField, value: String) {
    let slot = match target.attribute.as_str() {
        "first_name" => &mut contact.first_name,
        "last_name" => &mut contact.last_name,
        "full_name" => &mut contact.full_name,
        "email" => &mut contact.email,
        "phone" => &mut contact.phone,
        "job_title" => &mut contact.job_title,
        "notes" => &mut contact.notes,
        _ => return,
    };
    *slot = Some(value);
}

fn assign_company(company: &mut CompanyRecord, target: &TargetField, value: String) {
    let slot = match target.attribute.as_str() {
        "name" => &mut company.name,
        "domain" => &mut company.domain,
        "industry" => &mut company.industry,
        "size" => &mut company.size,
        _ => return,
    };
    *slot = Some(value);
}

fn assign_address(address: &mut AddressRecord, target: &TargetField, value: String) {
    let slot = match target.attribute.as_str() {
        "street" => &mut address.street,
        "city" => &mut address.city,
        "state" => &mut address.state,
        "postal_code" => &mut address.postal_code,
        "country" => &mut address.country,
        _ => return,
    };
    *slot = Some(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DEFAULT_FIELD_MAPPINGS;
    use crate::domain::mapping::ColumnSelection;
    use crate::domain::record::RawRecord;
    use crate::domain::source::{FieldDefinition, NewSource, NewStagedRow};
    use crate::importer::data_cleaner::DataCleaner;
    use crate::importer::mapping_resolver::MappingResolver;
    use crate::repository::ingest_repo::{SourceRepository, StagingRepository};
    use crate::repository::SqliteIngestRepository;
    use std::sync::Mutex;

    fn plan(pairs: &[(&str, &str)]) -> MappingPlan {
        let fields: Vec<FieldDefinition> = DEFAULT_FIELD_MAPPINGS
            .iter()
            .map(|(p, l, c, o)| FieldDefinition::new(p, l, c, *o))
            .collect();
        let selection: ColumnSelection = pairs.iter().map(|(c, t)| (*c, *t)).collect();
        MappingResolver::new().resolve(&selection, &fields).unwrap()
    }

    fn record(pairs: &[(&str, &str)]) -> RawRecord {
        pairs.iter().map(|(c, v)| (*c, *v)).collect()
    }

    fn staged(raw: RawRecord) -> StagedRow {
        StagedRow {
            id: 1,
            source_id: 1,
            row_number: 1,
            raw_data: raw,
            processed: false,
            error_log: None,
            list_id: None,
        }
    }

    async fn setup(rows: Vec<RawRecord>) -> (Arc<SqliteIngestRepository>, i64) {
        let conn = crate::db::open_in_memory().unwrap();
        let repo = Arc::new(SqliteIngestRepository::from_connection(Arc::new(Mutex::new(conn))));
        let source = repo
            .create_source(NewSource {
                file_name: "t.csv".into(),
                source_type: "csv".into(),
                byte_size: None,
                record_count: rows.len() as i64,
                team_id: "team-1".into(),
                profile_id: None,
                list_id: None,
            })
            .await
            .unwrap();
        let staged: Vec<NewStagedRow> = rows
            .into_iter()
            .enumerate()
            .map(|(i, raw_data)| NewStagedRow {
                row_number: i as i64 + 1,
                raw_data,
                list_id: None,
            })
            .collect();
        if !staged.is_empty() {
            repo.insert_staged_batch(source.id, staged).await.unwrap();
        }
        (repo, source.id)
    }

    fn engine(repo: Arc<SqliteIngestRepository>) -> TransformEngine<SqliteIngestRepository> {
        TransformEngine::new(repo, Arc::new(DataCleaner::new()), 4)
    }

    #[test]
    fn test_bundle_routes_values_by_category() {
        let conn = crate::db::open_in_memory().unwrap();
        let repo = Arc::new(SqliteIngestRepository::from_connection(Arc::new(Mutex::new(conn))));
        let engine = engine(repo);

        let plan = plan(&[
            ("first", "contacts.first_name"),
            ("org", "companies.name"),
            ("city", "addresses.city"),
            ("e1", "email_addresses.email"),
            ("e2", "email_addresses.email"),
            ("site", "urls.url"),
        ]);
        let row = staged(record(&[
            ("first", " Ann "),
            ("org", "Acme; Inc"),
            ("city", "Berlin"),
            ("e1", "a@x.com"),
            ("e2", ""),
            ("site", "acme.io"),
        ]));

        let bundle = engine.build_bundle(&row, &plan).unwrap();
        assert_eq!(bundle.contact.unwrap().first_name.as_deref(), Some("Ann"));
        assert_eq!(bundle.company.unwrap().name.as_deref(), Some("Acme Inc"));
        assert_eq!(bundle.address.unwrap().city.as_deref(), Some("Berlin"));
        assert_eq!(bundle.emails.len(), 1);
        assert_eq!(bundle.urls.len(), 1);
    }

    #[test]
    fn test_children_without_owner_get_empty_contact() {
        let conn = crate::db::open_in_memory().unwrap();
        let repo = Arc::new(SqliteIngestRepository::from_connection(Arc::new(Mutex::new(conn))));
        let engine = engine(repo);

        let plan = plan(&[("phone", "phone_numbers.number")]);
        let bundle = engine
            .build_bundle(&staged(record(&[("phone", "555-0100")])), &plan)
            .unwrap();
        assert_eq!(bundle.contact, Some(ContactRecord::default()));
        assert_eq!(bundle.phones.len(), 1);
    }

    #[test]
    fn test_invalid_email_fails_bundle() {
        let conn = crate::db::open_in_memory().unwrap();
        let repo = Arc::new(SqliteIngestRepository::from_connection(Arc::new(Mutex::new(conn))));
        let engine = engine(repo);

        let plan = plan(&[("email", "contacts.email")]);
        let err = engine
            .build_bundle(&staged(record(&[("email", "not-an-email")])), &plan)
            .unwrap_err();
        assert!(err.contains("invalid email address"));
    }

    #[tokio::test]
    async fn test_run_processes_rows_and_records_failures() {
        let (repo, source_id) = setup(vec![
            record(&[("name", "John Doe"), ("email", "john@x.com")]),
            record(&[("name", "Jane Doe"), ("email", "jane-at-x")]),
        ])
        .await;
        let plan = plan(&[("name", "contacts.full_name"), ("email", "contacts.email")]);

        let report = engine(repo.clone())
            .run(source_id, &plan, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.failed, 1);
        assert!(report.failures[0].message.starts_with("row 2: "));

        let pending = repo.list_unprocessed(source_id).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].error_log.as_deref().unwrap().starts_with("row 2: "));
        assert_eq!(repo.list_contacts(source_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let (repo, source_id) = setup(vec![
            record(&[("name", "John Doe")]),
            record(&[("name", "Jane Doe")]),
        ])
        .await;
        let plan = plan(&[("name", "contacts.full_name")]);
        let engine = engine(repo.clone());

        let first = engine.run(source_id, &plan, &CancellationToken::new()).await.unwrap();
        assert_eq!(first.processed, 2);

        let second = engine.run(source_id, &plan, &CancellationToken::new()).await.unwrap();
        assert_eq!(second.processed, 0);
        assert_eq!(second.failed, 0);
        assert_eq!(repo.list_contacts(source_id).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_blank_row_is_marked_processed_with_warning() {
        let (repo, source_id) = setup(vec![record(&[("name", "  ")])]).await;
        let plan = plan(&[("name", "contacts.full_name")]);

        let report = engine(repo.clone())
            .run(source_id, &plan, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.entities_created, 0);
        assert_eq!(report.warnings.len(), 1);
        assert!(repo.list_contacts(source_id).unwrap().is_empty());
        assert!(repo.list_unprocessed(source_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_source_is_error() {
        let (repo, _) = setup(Vec::new()).await;
        let plan = plan(&[("name", "contacts.full_name")]);
        let err = engine(repo)
            .run(999, &plan, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Repository(RepositoryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_run_leaves_rows_pending() {
        let (repo, source_id) = setup(vec![record(&[("name", "John Doe")])]).await;
        let plan = plan(&[("name", "contacts.full_name")]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = engine(repo.clone()).run(source_id, &plan, &cancel).await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.processed, 0);
        assert_eq!(repo.list_unprocessed(source_id).await.unwrap().len(), 1);
    }
}
