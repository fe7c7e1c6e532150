use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use revize_backend::app::documents_use_case::{DocumentsUseCase, NewRevision, NewVvDoc};
use revize_backend::app::projects_use_case::{NewProject, ProjectsUseCase};
use revize_backend::numbering::{DocumentClass, EvidenceNumberGenerator};
use revize_backend::storage::{SqliteStorage, Storage};
use tempfile::tempdir;

const OWNER: i64 = 1;

async fn project(storage: Arc<dyn Storage>) -> i64 {
    ProjectsUseCase::new(storage)
        .create_project(
            OWNER,
            NewProject {
                address: "Na Příkopě 5, Praha".into(),
                client: "SVJ Na Příkopě".into(),
                shared_with_user_ids: vec![],
            },
        )
        .await
        .unwrap()
        .id
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_protocols_get_distinct_consecutive_numbers() {
    let dir = tempdir().unwrap();
    let storage: Arc<dyn Storage> =
        Arc::new(SqliteStorage::open(dir.path().join("revize.db")).unwrap());
    let pid = project(storage.clone()).await;

    let writers = 8;
    // Every lost race means another writer succeeded, so this bound always suffices.
    let generator = EvidenceNumberGenerator::new(storage.clone(), writers + 2);
    let documents = Arc::new(DocumentsUseCase::new(storage.clone(), generator));

    let mut handles = Vec::new();
    for _ in 0..writers {
        let documents = documents.clone();
        handles.push(tokio::spawn(async move {
            documents
                .create_vv(
                    OWNER,
                    NewVvDoc {
                        project_id: pid,
                        ..NewVvDoc::default()
                    },
                )
                .await
        }));
    }

    let mut numbers = HashSet::new();
    for handle in handles {
        let doc = handle.await.unwrap().unwrap();
        numbers.insert(doc.number);
    }

    let year = Utc::now().format("%Y").to_string();
    let expected: HashSet<String> = (1..=writers)
        .map(|seq| format!("VV-{}-{:03}-{}", pid, seq, year))
        .collect();
    assert_eq!(numbers, expected);
}

#[tokio::test]
async fn revision_numbers_survive_reopening_the_database() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("revize.db");

    let pid = {
        let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open(&path).unwrap());
        let pid = project(storage.clone()).await;
        let documents =
            DocumentsUseCase::new(storage.clone(), EvidenceNumberGenerator::new(storage, 5));
        let first = documents
            .create_revision(
                OWNER,
                NewRevision {
                    project_id: pid,
                    revision_type: "Výchozí".into(),
                    date_done: NaiveDate::from_ymd_opt(2025, 11, 3).unwrap(),
                    valid_until: NaiveDate::from_ymd_opt(2030, 11, 3),
                    status: None,
                    data_json: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(first.number, format!("RZ-{}-1-2025", pid));
        assert_eq!(first.status, "Rozpracovaná");
        pid
    };

    let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open(&path).unwrap());
    let generator = EvidenceNumberGenerator::new(storage, 5);
    let next = generator
        .next_number(pid, DocumentClass::Revision, NaiveDate::from_ymd_opt(2026, 1, 15).unwrap())
        .await
        .unwrap();
    assert_eq!(next.to_string(), format!("RZ-{}-2-2026", pid));
}
