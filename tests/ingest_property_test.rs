// ==========================================
// 导入管道性质测试 (proptest)
// ==========================================
// 测试目标:
// - 暂存行数 = 输入行数（与批次大小、并发度无关）
// - 清洗后取值不含 ' " ; 且首尾无空白
// - 解析行数 = 数据行数，每行键集合 = 表头
// ==========================================

mod test_helpers;

use contact_ingest::config::StaticIngestConfig;
use contact_ingest::domain::IngestJob;
use contact_ingest::importer::{DataCleaner, IngestionOrchestrator, ValueCleaner};
use contact_ingest::repository::{SqliteIngestRepository, StagingRepository};
use contact_ingest::RunState;
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use test_helpers::*;
use tokio_util::sync::CancellationToken;

fn in_memory_repo() -> Arc<SqliteIngestRepository> {
    let conn = contact_ingest::db::open_in_memory().unwrap();
    Arc::new(SqliteIngestRepository::from_connection(Arc::new(Mutex::new(conn))))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_staged_count_matches_input(
        rows in 1usize..60,
        batch_size in 1usize..17,
        concurrency in 1usize..5,
        workers in 1usize..5,
    ) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        let (result, staged) = runtime.block_on(async {
            let repo = in_memory_repo();
            let config = StaticIngestConfig {
                batch_size,
                staging_concurrency: concurrency,
                transform_workers: workers,
                ..StaticIngestConfig::default()
            };
            let orchestrator = IngestionOrchestrator::new(repo.clone(), config);
            let job = IngestJob {
                file_name: "bulk.csv".to_string(),
                records: generate_people(rows),
                plan: plan_for(&[("name", "contacts.full_name"), ("email", "contacts.email")]),
                team_id: "team-1".to_string(),
                profile_id: None,
                list_id: None,
                byte_size: None,
            };
            let result = orchestrator.ingest(job, &CancellationToken::new()).await;
            let staged = repo.count_staged(result.source_id.unwrap()).await.unwrap();
            (result, staged)
        });

        prop_assert_eq!(result.state, RunState::Completed);
        prop_assert_eq!(staged as usize, rows);
        prop_assert_eq!(result.rows_staged, Some(rows));
        prop_assert_eq!(result.rows_processed, rows);
    }

    #[test]
    fn prop_sanitized_values_are_clean(raw in ".{0,40}") {
        let cleaner = DataCleaner::new();
        if let Some(value) = cleaner.sanitize(&raw) {
            prop_assert!(!value.contains('\''));
            prop_assert!(!value.contains('"'));
            prop_assert!(!value.contains(';'));
            prop_assert_eq!(value.trim(), value.as_str());
            prop_assert!(!value.is_empty());
        }
    }

    #[test]
    fn prop_parser_rows_follow_headers(lines in proptest::collection::vec("[a-z]{1,8},[0-9]{1,4}", 1..30)) {
        let csv = format!("name,code\n{}\n", lines.join("\n"));
        let records = records_from_csv(&csv);
        prop_assert_eq!(records.len(), lines.len());
        for record in &records {
            prop_assert_eq!(record.columns().collect::<Vec<_>>(), vec!["name", "code"]);
        }
    }
}
