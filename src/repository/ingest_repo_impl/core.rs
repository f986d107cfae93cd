use crate::db::open_sqlite_connection;
use crate::domain::entity::{EntityBundle, PersistedBundle};
use crate::domain::source::{NewSource, NewStagedRow, StagedRow};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// SqliteIngestRepository - 导入仓储（rusqlite）
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct SqliteIngestRepository {
    pub(super) conn: Arc<Mutex<Connection>>,
}

impl SqliteIngestRepository {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入来源，返回新 ID
    pub(super) fn insert_source(conn: &Connection, source: &NewSource) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO sources (
                file_name, source_type, byte_size, record_count,
                team_id, profile_id, list_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                source.file_name,
                source.source_type,
                source.byte_size,
                source.record_count,
                source.team_id,
                source.profile_id,
                source.list_id,
                Utc::now(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 在事务中写入暂存批次（含声明行数上限校验）
    pub(super) fn insert_staged_batch_tx(
        tx: &Transaction,
        source_id: i64,
        rows: &[NewStagedRow],
    ) -> RepositoryResult<usize> {
        let declared: i64 = tx
            .query_row(
                "SELECT record_count FROM sources WHERE id = ?1",
                params![source_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Source".to_string(),
                id: source_id.to_string(),
            })?;

        let staged: i64 = tx.query_row(
            "SELECT COUNT(*) FROM source_data WHERE source_id = ?1",
            params![source_id],
            |row| row.get(0),
        )?;

        if staged + rows.len() as i64 > declared {
            return Err(RepositoryError::StagingOverflow {
                source_id,
                declared,
                staged,
                incoming: rows.len(),
            });
        }

        let mut stmt = tx.prepare(
            r#"
            INSERT INTO source_data (
                source_id, row_number, raw_data, processed, list_id, created_at
            ) VALUES (?1, ?2, ?3, 0, ?4, ?5)
            "#,
        )?;

        let now = Utc::now();
        let mut count = 0;
        for row in rows {
            let raw_json = serde_json::to_string(&row.raw_data)?;
            stmt.execute(params![source_id, row.row_number, raw_json, row.list_id, now])?;
            count += 1;
        }

        Ok(count)
    }

    /// 在事务中写入单行实体并翻转 processed
    pub(super) fn complete_row_tx(
        tx: &Transaction,
        row: &StagedRow,
        team_id: &str,
        bundle: &EntityBundle,
    ) -> RepositoryResult<PersistedBundle> {
        let now = Utc::now();
        let mut persisted = PersistedBundle::default();

        // ===== 公司 =====
        if let Some(company) = &bundle.company {
            tx.execute(
                r#"
                INSERT INTO companies (
                    source_data_id, team_id, name, domain, industry, size, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    row.id,
                    team_id,
                    company.name,
                    company.domain,
                    company.industry,
                    company.size,
                    now,
                ],
            )?;
            persisted.company_id = Some(tx.last_insert_rowid());
        }

        // ===== 联系人 =====
        if let Some(contact) = &bundle.contact {
            tx.execute(
                r#"
                INSERT INTO contacts (
                    source_data_id, team_id, list_id, company_id,
                    first_name, last_name, full_name, email, phone,
                    job_title, notes, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
                params![
                    row.id,
                    team_id,
                    row.list_id,
                    persisted.company_id,
                    contact.first_name,
                    contact.last_name,
                    contact.full_name,
                    contact.email,
                    contact.phone,
                    contact.job_title,
                    contact.notes,
                    now,
                ],
            )?;
            persisted.contact_id = Some(tx.last_insert_rowid());
        }

        // ===== 子实体归属 =====
        let (owner_contact, owner_company) = match (persisted.contact_id, persisted.company_id) {
            (Some(contact_id), _) => (Some(contact_id), None),
            (None, Some(company_id)) => (None, Some(company_id)),
            (None, None) => (None, None),
        };

        if bundle.has_children() && owner_contact.is_none() && owner_company.is_none() {
            return Err(RepositoryError::InternalError(format!(
                "staged row {} has child entities but no owning contact or company",
                row.id
            )));
        }

        if let Some(address) = &bundle.address {
            tx.execute(
                r#"
                INSERT INTO addresses (
                    source_data_id, contact_id, company_id,
                    street, city, state, postal_code, country
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    row.id,
                    owner_contact,
                    owner_company,
                    address.street,
                    address.city,
                    address.state,
                    address.postal_code,
                    address.country,
                ],
            )?;
            persisted.child_ids.push(tx.last_insert_rowid());
        }

        for email in &bundle.emails {
            tx.execute(
                "INSERT INTO email_addresses (source_data_id, contact_id, company_id, email)
                 VALUES (?1, ?2, ?3, ?4)",
                params![row.id, owner_contact, owner_company, email.email],
            )?;
            persisted.child_ids.push(tx.last_insert_rowid());
        }

        for phone in &bundle.phones {
            tx.execute(
                "INSERT INTO phone_numbers (source_data_id, contact_id, company_id, number)
                 VALUES (?1, ?2, ?3, ?4)",
                params![row.id, owner_contact, owner_company, phone.number],
            )?;
            persisted.child_ids.push(tx.last_insert_rowid());
        }

        for url in &bundle.urls {
            tx.execute(
                "INSERT INTO urls (source_data_id, contact_id, company_id, url)
                 VALUES (?1, ?2, ?3, ?4)",
                params![row.id, owner_contact, owner_company, url.url],
            )?;
            persisted.child_ids.push(tx.last_insert_rowid());
        }

        // ===== 翻转 processed（仅 0 → 1）=====
        let updated = tx.execute(
            r#"
            UPDATE source_data
            SET processed = 1, error_log = NULL, processed_at = ?2
            WHERE id = ?1 AND processed = 0
            "#,
            params![row.id, now],
        )?;

        if updated == 0 {
            return Err(RepositoryError::InternalError(format!(
                "staged row {} is no longer pending",
                row.id
            )));
        }

        Ok(persisted)
    }

    /// 记录单行失败（processed 不变）
    pub(super) fn record_row_failure_stmt(
        conn: &Connection,
        staged_row_id: i64,
        message: &str,
    ) -> RepositoryResult<()> {
        let updated = conn.execute(
            "UPDATE source_data SET error_log = ?2 WHERE id = ?1 AND processed = 0",
            params![staged_row_id, message],
        )?;

        if updated == 0 {
            return Err(RepositoryError::NotFound {
                entity: "PendingStagedRow".to_string(),
                id: staged_row_id.to_string(),
            });
        }
        Ok(())
    }
}
