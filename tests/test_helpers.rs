// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、映射计划、测试数据生成等功能
// ==========================================
#![allow(dead_code)]

use contact_ingest::db;
use contact_ingest::domain::{ColumnSelection, FieldDefinition, MappingPlan, RawRecord};
use contact_ingest::importer::{CsvRowParser, MappingResolver};
use contact_ingest::repository::SqliteIngestRepository;
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().ok_or("non-utf8 temp path")?.to_string();

    let conn = db::open_sqlite_connection(&db_path)?;
    db::ensure_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接（仓储之间共用）
pub fn open_shared(db_path: &str) -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(db::open_sqlite_connection(db_path).unwrap()))
}

/// 基于临时库的导入仓储
pub fn create_test_repo(db_path: &str) -> Arc<SqliteIngestRepository> {
    Arc::new(SqliteIngestRepository::new(db_path).unwrap())
}

/// 默认权威字段清单
pub fn default_fields() -> Vec<FieldDefinition> {
    db::DEFAULT_FIELD_MAPPINGS
        .iter()
        .map(|(path, label, category, order)| FieldDefinition::new(path, label, category, *order))
        .collect()
}

/// 列 → 字段路径 映射计划
pub fn plan_for(pairs: &[(&str, &str)]) -> MappingPlan {
    let selection: ColumnSelection = pairs.iter().map(|(c, t)| (*c, *t)).collect();
    MappingResolver::new()
        .resolve(&selection, &default_fields())
        .unwrap()
}

/// 解析 CSV 文本为记录
pub fn records_from_csv(csv: &str) -> Vec<RawRecord> {
    let parsed = CsvRowParser::new().parse(csv).unwrap();
    parsed.collect_records().unwrap().0
}

/// 生成 n 行联系人记录
pub fn generate_people(n: usize) -> Vec<RawRecord> {
    (1..=n)
        .map(|i| {
            [
                ("name", format!("Person {}", i)),
                ("email", format!("person{}@example.com", i)),
            ]
            .into_iter()
            .collect()
        })
        .collect()
}

/// 统计表行数
pub fn count_rows(db_path: &str, table: &str) -> i64 {
    let conn = Connection::open(db_path).unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
        .unwrap()
}
