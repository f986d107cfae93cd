// ==========================================
// 联系人导入服务 - 导入层
// ==========================================
// 职责: CSV 解析 → 映射校验 → 暂存 → 转换为规范化实体
// 流程: RowParser → MappingResolver → StagingWriter → TransformEngine
//       由 IngestionOrchestrator 串联
// ==========================================

// 模块声明
pub mod data_cleaner;
pub mod error;
pub mod ingest_trait;
pub mod mapping_resolver;
pub mod orchestrator;
pub mod row_parser;
pub mod staging_writer;
pub mod transform_engine;

// 重导出核心类型
pub use data_cleaner::DataCleaner;
pub use error::{IngestError, IngestResultOf};
pub use mapping_resolver::MappingResolver;
pub use orchestrator::IngestionOrchestrator;
pub use row_parser::{CsvRowParser, ParsedCsv, ParsedRow};
pub use staging_writer::StagingWriter;
pub use transform_engine::TransformEngine;

// 重导出 Trait 接口
pub use ingest_trait::{FieldCatalog, ValueCleaner};
