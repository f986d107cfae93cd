// ==========================================
// 联系人导入服务 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod entity;
pub mod ingest;
pub mod mapping;
pub mod record;
pub mod source;
pub mod types;

// 重导出核心类型
pub use entity::{
    AddressRecord, ChildEntity, Company, CompanyRecord, Contact, ContactRecord,
    EmailAddressRecord, EntityBundle, PersistedBundle, PhoneNumberRecord, UrlRecord,
};
pub use ingest::{
    BatchFailure, CsvIngestRequest, IngestJob, IngestRequest, IngestResult, ParseWarning,
    PreviewRequest, PreviewResponse, RetryRequest, RowFailure, StagingReport, TransformReport,
};
pub use mapping::{
    ColumnSelection, MappingEntry, MappingPlan, SuggestedMapping, TargetField, CLEAR_MAPPING,
};
pub use record::RawRecord;
pub use source::{FieldDefinition, NewSource, NewStagedRow, Source, SourceStatus, StagedRow};
pub use types::{RunState, StagedRowState, TargetCategory};
