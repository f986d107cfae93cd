use super::SqliteIngestRepository;
use crate::domain::entity::{
    CompanyRecord, ContactRecord, EmailAddressRecord, EntityBundle, PhoneNumberRecord,
};
use crate::domain::record::RawRecord;
use crate::domain::source::{NewSource, NewStagedRow};
use crate::domain::types::{StagedRowState, TargetCategory};
use crate::repository::error::RepositoryError;
use crate::repository::ingest_repo::{EntityRepository, SourceRepository, StagingRepository};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = crate::db::open_in_memory().unwrap();
    Arc::new(Mutex::new(conn))
}

fn make_source(record_count: i64) -> NewSource {
    NewSource {
        file_name: "contacts.csv".to_string(),
        source_type: "csv".to_string(),
        byte_size: Some(128),
        record_count,
        team_id: "team-1".to_string(),
        profile_id: Some("profile-1".to_string()),
        list_id: Some("list-1".to_string()),
    }
}

fn make_rows(start: i64, count: i64) -> Vec<NewStagedRow> {
    (start..start + count)
        .map(|n| {
            let mut raw = RawRecord::new();
            raw.insert("name", format!("Person {}", n));
            raw.insert("email", format!("p{}@example.com", n));
            NewStagedRow {
                row_number: n,
                raw_data: raw,
                list_id: Some("list-1".to_string()),
            }
        })
        .collect()
}

#[tokio::test]
async fn test_create_and_find_source() {
    let repo = SqliteIngestRepository::from_connection(setup_test_db());

    let source = repo.create_source(make_source(3)).await.unwrap();
    assert!(source.id > 0);
    assert_eq!(source.record_count, 3);
    assert_eq!(source.team_id, "team-1");

    let found = repo.find_source(source.id).await.unwrap().unwrap();
    assert_eq!(found.file_name, "contacts.csv");
    assert_eq!(found.list_id.as_deref(), Some("list-1"));

    assert!(repo.find_source(9999).await.unwrap().is_none());
}

#[tokio::test]
async fn test_staged_batch_preserves_raw_data_order() {
    let repo = SqliteIngestRepository::from_connection(setup_test_db());
    let source = repo.create_source(make_source(2)).await.unwrap();

    let written = repo.insert_staged_batch(source.id, make_rows(1, 2)).await.unwrap();
    assert_eq!(written, 2);
    assert_eq!(repo.count_staged(source.id).await.unwrap(), 2);

    let rows = repo.list_unprocessed(source.id).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].row_number, 1);
    assert_eq!(rows[0].raw_data.columns().collect::<Vec<_>>(), vec!["name", "email"]);
    assert_eq!(rows[1].raw_data.get("email"), Some("p2@example.com"));
    assert_eq!(rows[0].state(), StagedRowState::Unprocessed);
}

#[tokio::test]
async fn test_staged_batch_rejects_overflow() {
    let repo = SqliteIngestRepository::from_connection(setup_test_db());
    let source = repo.create_source(make_source(3)).await.unwrap();

    repo.insert_staged_batch(source.id, make_rows(1, 2)).await.unwrap();
    let err = repo
        .insert_staged_batch(source.id, make_rows(3, 2))
        .await
        .unwrap_err();

    assert!(matches!(err, RepositoryError::StagingOverflow { declared: 3, staged: 2, .. }));
    // 整批回滚
    assert_eq!(repo.count_staged(source.id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_staged_batch_unknown_source() {
    let repo = SqliteIngestRepository::from_connection(setup_test_db());
    let err = repo.insert_staged_batch(42, make_rows(1, 1)).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));
}

#[tokio::test]
async fn test_complete_row_writes_entities_and_flips_flag() {
    let repo = SqliteIngestRepository::from_connection(setup_test_db());
    let source = repo.create_source(make_source(1)).await.unwrap();
    repo.insert_staged_batch(source.id, make_rows(1, 1)).await.unwrap();
    let row = repo.list_unprocessed(source.id).await.unwrap().remove(0);

    let bundle = EntityBundle {
        contact: Some(ContactRecord {
            full_name: Some("Person 1".to_string()),
            ..Default::default()
        }),
        company: Some(CompanyRecord {
            name: Some("Acme".to_string()),
            ..Default::default()
        }),
        emails: vec![EmailAddressRecord {
            email: "p1@example.com".to_string(),
        }],
        phones: vec![PhoneNumberRecord {
            number: "555-0100".to_string(),
        }],
        ..Default::default()
    };

    let persisted = repo.complete_row(&row, &source.team_id, &bundle).await.unwrap();
    assert!(persisted.contact_id.is_some());
    assert!(persisted.company_id.is_some());
    assert_eq!(persisted.child_ids.len(), 2);

    assert!(repo.list_unprocessed(source.id).await.unwrap().is_empty());

    let contacts = repo.list_contacts(source.id).unwrap();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].company_id, persisted.company_id);
    assert_eq!(contacts[0].list_id.as_deref(), Some("list-1"));

    let emails = repo.list_children(TargetCategory::Email, source.id).unwrap();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].contact_id, persisted.contact_id);
    assert_eq!(emails[0].company_id, None);

    let status = repo.source_status(source.id).await.unwrap().unwrap();
    assert_eq!(status.processed_rows, 1);
    assert_eq!(status.pending_rows, 0);
}

#[tokio::test]
async fn test_complete_row_twice_is_rejected() {
    let repo = SqliteIngestRepository::from_connection(setup_test_db());
    let source = repo.create_source(make_source(1)).await.unwrap();
    repo.insert_staged_batch(source.id, make_rows(1, 1)).await.unwrap();
    let row = repo.list_unprocessed(source.id).await.unwrap().remove(0);

    let bundle = EntityBundle {
        contact: Some(ContactRecord {
            first_name: Some("Ann".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    };

    repo.complete_row(&row, "team-1", &bundle).await.unwrap();
    let err = repo.complete_row(&row, "team-1", &bundle).await.unwrap_err();
    assert!(matches!(err, RepositoryError::InternalError(_)));

    // 第二次写入回滚，联系人仍为 1 条
    assert_eq!(repo.list_contacts(source.id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_children_without_owner_are_rejected() {
    let repo = SqliteIngestRepository::from_connection(setup_test_db());
    let source = repo.create_source(make_source(1)).await.unwrap();
    repo.insert_staged_batch(source.id, make_rows(1, 1)).await.unwrap();
    let row = repo.list_unprocessed(source.id).await.unwrap().remove(0);

    let bundle = EntityBundle {
        urls: vec![crate::domain::entity::UrlRecord {
            url: "https://example.com".to_string(),
        }],
        ..Default::default()
    };

    assert!(repo.complete_row(&row, "team-1", &bundle).await.is_err());
    assert_eq!(repo.list_unprocessed(source.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_record_row_failure_keeps_row_pending() {
    let repo = SqliteIngestRepository::from_connection(setup_test_db());
    let source = repo.create_source(make_source(2)).await.unwrap();
    repo.insert_staged_batch(source.id, make_rows(1, 2)).await.unwrap();
    let rows = repo.list_unprocessed(source.id).await.unwrap();

    repo.record_row_failure(rows[1].id, "row 2: invalid email address")
        .await
        .unwrap();

    let pending = repo.list_unprocessed(source.id).await.unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[1].state(), StagedRowState::Failed);
    assert_eq!(
        pending[1].error_log.as_deref(),
        Some("row 2: invalid email address")
    );

    let status = repo.source_status(source.id).await.unwrap().unwrap();
    assert_eq!(status.failed_rows, 1);
    assert_eq!(status.pending_rows, 2);

    let err = repo.record_row_failure(9999, "missing").await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));
}

#[tokio::test]
async fn test_success_clears_previous_error_log() {
    let repo = SqliteIngestRepository::from_connection(setup_test_db());
    let source = repo.create_source(make_source(1)).await.unwrap();
    repo.insert_staged_batch(source.id, make_rows(1, 1)).await.unwrap();
    let row = repo.list_unprocessed(source.id).await.unwrap().remove(0);

    repo.record_row_failure(row.id, "row 1: transient").await.unwrap();

    let bundle = EntityBundle {
        contact: Some(ContactRecord::default()),
        ..Default::default()
    };
    repo.complete_row(&row, "team-1", &bundle).await.unwrap();

    let staged = repo.list_staged(source.id).unwrap();
    assert!(staged[0].processed);
    assert!(staged[0].error_log.is_none());
}
