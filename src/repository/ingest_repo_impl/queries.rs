use super::core::SqliteIngestRepository;
use crate::domain::entity::{ChildEntity, Company, CompanyRecord, Contact, ContactRecord};
use crate::domain::record::RawRecord;
use crate::domain::source::{Source, SourceStatus, StagedRow};
use crate::domain::types::TargetCategory;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, OptionalExtension, Row};

impl SqliteIngestRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    pub(super) fn query_source(conn: &Connection, source_id: i64) -> RepositoryResult<Option<Source>> {
        let source = conn
            .query_row(
                r#"
                SELECT id, file_name, source_type, byte_size, record_count,
                       team_id, profile_id, list_id, created_at
                FROM sources
                WHERE id = ?1
                "#,
                params![source_id],
                Self::map_source,
            )
            .optional()?;
        Ok(source)
    }

    fn map_source(row: &Row) -> rusqlite::Result<Source> {
        Ok(Source {
            id: row.get(0)?,
            file_name: row.get(1)?,
            source_type: row.get(2)?,
            byte_size: row.get(3)?,
            record_count: row.get(4)?,
            team_id: row.get(5)?,
            profile_id: row.get(6)?,
            list_id: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    pub(super) fn query_status(
        conn: &Connection,
        source_id: i64,
    ) -> RepositoryResult<Option<SourceStatus>> {
        let source = match Self::query_source(conn, source_id)? {
            Some(s) => s,
            None => return Ok(None),
        };

        let (staged, processed, failed): (i64, i64, i64) = conn.query_row(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN processed = 1 THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN processed = 0 AND error_log IS NOT NULL THEN 1 ELSE 0 END), 0)
            FROM source_data
            WHERE source_id = ?1
            "#,
            params![source_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(Some(SourceStatus {
            source,
            staged_rows: staged,
            processed_rows: processed,
            failed_rows: failed,
            pending_rows: staged - processed,
        }))
    }

    pub(super) fn query_count_staged(conn: &Connection, source_id: i64) -> RepositoryResult<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM source_data WHERE source_id = ?1",
            params![source_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub(super) fn query_unprocessed(
        conn: &Connection,
        source_id: i64,
    ) -> RepositoryResult<Vec<StagedRow>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, source_id, row_number, raw_data, processed, error_log, list_id
            FROM source_data
            WHERE source_id = ?1 AND processed = 0
            ORDER BY row_number, id
            "#,
        )?;

        let raw_rows = stmt
            .query_map(params![source_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        // raw_data 解码放在闭包外，错误归类为 FieldValueError
        let mut rows = Vec::with_capacity(raw_rows.len());
        for (id, source_id, row_number, raw_json, processed, error_log, list_id) in raw_rows {
            let raw_data: RawRecord = serde_json::from_str(&raw_json)?;
            rows.push(StagedRow {
                id,
                source_id,
                row_number,
                raw_data,
                processed,
                error_log,
                list_id,
            });
        }

        Ok(rows)
    }

    // ==========================================
    // 实体读取（运营查询/测试核对）
    // ==========================================

    /// 按来源查询联系人
    pub fn list_contacts(&self, source_id: i64) -> RepositoryResult<Vec<Contact>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT c.id, c.source_data_id, c.team_id, c.list_id, c.company_id,
                   c.first_name, c.last_name, c.full_name, c.email, c.phone,
                   c.job_title, c.notes
            FROM contacts c
            JOIN source_data sd ON sd.id = c.source_data_id
            WHERE sd.source_id = ?1
            ORDER BY sd.row_number, c.id
            "#,
        )?;

        let contacts = stmt
            .query_map(params![source_id], |row| {
                Ok(Contact {
                    id: row.get(0)?,
                    source_data_id: row.get(1)?,
                    team_id: row.get(2)?,
                    list_id: row.get(3)?,
                    company_id: row.get(4)?,
                    fields: ContactRecord {
                        first_name: row.get(5)?,
                        last_name: row.get(6)?,
                        full_name: row.get(7)?,
                        email: row.get(8)?,
                        phone: row.get(9)?,
                        job_title: row.get(10)?,
                        notes: row.get(11)?,
                    },
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(contacts)
    }

    /// 按来源查询公司
    pub fn list_companies(&self, source_id: i64) -> RepositoryResult<Vec<Company>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT co.id, co.source_data_id, co.team_id,
                   co.name, co.domain, co.industry, co.size
            FROM companies co
            JOIN source_data sd ON sd.id = co.source_data_id
            WHERE sd.source_id = ?1
            ORDER BY sd.row_number, co.id
            "#,
        )?;

        let companies = stmt
            .query_map(params![source_id], |row| {
                Ok(Company {
                    id: row.get(0)?,
                    source_data_id: row.get(1)?,
                    team_id: row.get(2)?,
                    fields: CompanyRecord {
                        name: row.get(3)?,
                        domain: row.get(4)?,
                        industry: row.get(5)?,
                        size: row.get(6)?,
                    },
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(companies)
    }

    /// 按来源查询子实体（地址以 "street, city" 形式拼接为 value）
    pub fn list_children(
        &self,
        category: TargetCategory,
        source_id: i64,
    ) -> RepositoryResult<Vec<ChildEntity>> {
        let value_expr = match category {
            TargetCategory::Email => "t.email",
            TargetCategory::Phone => "t.number",
            TargetCategory::Url => "t.url",
            TargetCategory::Address => {
                "TRIM(COALESCE(t.street, '') || ', ' || COALESCE(t.city, ''), ', ')"
            }
            TargetCategory::Contact | TargetCategory::Company => return Ok(Vec::new()),
        };

        // 表名与列表达式均来自封闭枚举，不含外部输入
        let sql = format!(
            r#"
            SELECT t.id, t.source_data_id, t.contact_id, t.company_id, {value_expr}
            FROM {table} t
            JOIN source_data sd ON sd.id = t.source_data_id
            WHERE sd.source_id = ?1
            ORDER BY sd.row_number, t.id
            "#,
            value_expr = value_expr,
            table = category.table(),
        );

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let children = stmt
            .query_map(params![source_id], |row| {
                Ok(ChildEntity {
                    id: row.get(0)?,
                    source_data_id: row.get(1)?,
                    contact_id: row.get(2)?,
                    company_id: row.get(3)?,
                    value: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(children)
    }

    /// 查询来源下全部暂存行（含已处理）
    pub fn list_staged(&self, source_id: i64) -> RepositoryResult<Vec<StagedRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, source_id, row_number, raw_data, processed, error_log, list_id
            FROM source_data
            WHERE source_id = ?1
            ORDER BY row_number, id
            "#,
        )?;

        let raw_rows = stmt
            .query_map(params![source_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raw_rows
            .into_iter()
            .map(|(id, source_id, row_number, raw_json, processed, error_log, list_id)| {
                Ok(StagedRow {
                    id,
                    source_id,
                    row_number,
                    raw_data: serde_json::from_str(&raw_json)?,
                    processed,
                    error_log,
                    list_id,
                })
            })
            .collect()
    }
}
