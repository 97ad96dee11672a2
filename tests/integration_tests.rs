//! End-to-end scenarios against a real PostgreSQL instance (spec.md §8),
//! driven through testcontainers. Grounded on the teacher's own
//! container-per-test integration style (`tests/common/mod.rs`,
//! `tests/catalog_tests.rs`).

mod common;

use std::collections::HashSet;

use tablediff::{ChangeType, Comparator, ProcessOutcome, Side, VecSink};

use common::{postgres_options, TestDb};

#[tokio::test]
#[ignore]
async fn identical_tables_emit_nothing() {
    let db = TestDb::start().await;
    let rows = [(1, "a"), (2, "b"), (3, "c")];
    let left_conn = db.seeded_table("t_identical_left", &rows).await;
    let right_conn = db.seeded_table("t_identical_right", &rows).await;

    let left = Side::new("left", left_conn, "t_identical_left").with_cols(vec!["val".into()]);
    let right = Side::new("right", right_conn, "t_identical_right").with_cols(vec!["val".into()]);

    let mut comparator = Comparator::new(left, right, postgres_options().build()).unwrap();
    let mut sink = VecSink::new();
    comparator.process(&mut sink).await.unwrap();

    assert!(sink.events.is_empty());
}

#[tokio::test]
#[ignore]
async fn single_update_detected() {
    let db = TestDb::start().await;
    let left_conn = db.seeded_table("t_upd_left", &[(1, "a"), (2, "b")]).await;
    let right_conn = db.seeded_table("t_upd_right", &[(1, "a"), (2, "B")]).await;

    let left = Side::new("left", left_conn, "t_upd_left").with_cols(vec!["val".into()]);
    let right = Side::new("right", right_conn, "t_upd_right").with_cols(vec!["val".into()]);

    let mut comparator = Comparator::new(left, right, postgres_options().build()).unwrap();
    let mut sink = VecSink::new();
    let outcome = comparator.process(&mut sink).await.unwrap();

    assert_eq!(sink.events, vec![(ChangeType::Update, "2".to_string())]);
    match outcome {
        ProcessOutcome::Done(stats) => assert_eq!(stats.updates, 1),
        ProcessOutcome::NothingToDo => panic!("expected one update"),
    }
}

#[tokio::test]
#[ignore]
async fn insert_only_detected() {
    let db = TestDb::start().await;
    let left_conn = db.seeded_table("t_ins_left", &[(1, "a"), (2, "b"), (3, "c")]).await;
    let right_conn = db.seeded_table("t_ins_right", &[(1, "a"), (2, "b")]).await;

    let left = Side::new("left", left_conn, "t_ins_left").with_cols(vec!["val".into()]);
    let right = Side::new("right", right_conn, "t_ins_right").with_cols(vec!["val".into()]);

    let mut comparator = Comparator::new(left, right, postgres_options().build()).unwrap();
    let mut sink = VecSink::new();
    comparator.process(&mut sink).await.unwrap();

    assert_eq!(sink.events, vec![(ChangeType::Insert, "3".to_string())]);
}

#[tokio::test]
#[ignore]
async fn delete_only_detected() {
    let db = TestDb::start().await;
    let left_conn = db.seeded_table("t_del_left", &[(1, "a"), (2, "b")]).await;
    let right_conn = db.seeded_table("t_del_right", &[(1, "a"), (2, "b"), (3, "c")]).await;

    let left = Side::new("left", left_conn, "t_del_left").with_cols(vec!["val".into()]);
    let right = Side::new("right", right_conn, "t_del_right").with_cols(vec!["val".into()]);

    let mut comparator = Comparator::new(left, right, postgres_options().build()).unwrap();
    let mut sink = VecSink::new();
    comparator.process(&mut sink).await.unwrap();

    assert_eq!(sink.events, vec![(ChangeType::Delete, "3".to_string())]);
}

#[tokio::test]
#[ignore]
async fn mixed_multi_key_detected() {
    let db = TestDb::start().await;
    let left_conn = db.seeded_composite_table("t_multi_left", &[(10, 1, "alice", 9)]).await;
    let right_conn = db
        .seeded_composite_table("t_multi_right", &[(10, 1, "alice", 10), (10, 2, "bob", 9)])
        .await;

    let left = Side::new("left", left_conn, "t_multi_left")
        .with_keys(vec!["schoolid".into(), "student_id".into()])
        .with_cols(vec!["name".into(), "grade".into()]);
    let right = Side::new("right", right_conn, "t_multi_right")
        .with_keys(vec!["schoolid".into(), "student_id".into()])
        .with_cols(vec!["name".into(), "grade".into()]);

    let mut comparator = Comparator::new(left, right, postgres_options().build()).unwrap();
    let mut sink = VecSink::new();
    comparator.process(&mut sink).await.unwrap();

    let events: HashSet<_> = sink.events.into_iter().collect();
    assert!(events.contains(&(ChangeType::Update, "10:1".to_string())));
    assert!(events.contains(&(ChangeType::Delete, "10:2".to_string())));
    assert_eq!(events.len(), 2);
}

#[tokio::test]
#[ignore]
async fn bulk_insert_resolved_via_mask_chunks() {
    let db = TestDb::start().await;
    let left_rows: Vec<(i64, &str)> = (1..=1000).map(|i| (i, "v")).collect();
    let right_rows: Vec<(i64, &str)> = (1..=500).map(|i| (i, "v")).collect();
    let left_conn = db.seeded_table("t_bulk_left", &left_rows).await;
    let right_conn = db.seeded_table("t_bulk_right", &right_rows).await;

    let left = Side::new("left", left_conn, "t_bulk_left").with_cols(vec!["val".into()]);
    let right = Side::new("right", right_conn, "t_bulk_right").with_cols(vec!["val".into()]);

    let mut comparator = Comparator::new(left, right, postgres_options().build()).unwrap();
    let mut sink = VecSink::new();
    let outcome = comparator.process(&mut sink).await.unwrap();

    assert_eq!(sink.events.len(), 500);
    assert!(sink.events.iter().all(|(c, _)| *c == ChangeType::Insert));
    let keys: HashSet<_> = sink.events.iter().map(|(_, k)| k.clone()).collect();
    for i in 501..=1000 {
        assert!(keys.contains(&i.to_string()), "missing insert for key {i}");
    }
    match outcome {
        ProcessOutcome::Done(stats) => assert_eq!(stats.inserts, 500),
        ProcessOutcome::NothingToDo => panic!("expected 500 inserts"),
    }
}

#[tokio::test]
#[ignore]
async fn cleanup_removes_every_intermediate_table() {
    let db = TestDb::start().await;
    let left_conn = db.seeded_table("t_cleanup_left", &[(1, "a"), (2, "b")]).await;
    let right_conn = db.seeded_table("t_cleanup_right", &[(1, "a"), (2, "B")]).await;

    let left = Side::new("left", left_conn.clone(), "t_cleanup_left").with_cols(vec!["val".into()]);
    let right = Side::new("right", right_conn.clone(), "t_cleanup_right").with_cols(vec!["val".into()]);

    let mut comparator = Comparator::new(left, right, postgres_options().build()).unwrap();
    let mut sink = VecSink::new();
    comparator.process(&mut sink).await.unwrap();

    let (left_names, right_names) = comparator.table_names();
    for name in left_names.iter().chain(right_names.iter()) {
        let rows = left_conn
            .query(&format!(
                "SELECT 1 FROM information_schema.tables WHERE table_name = '{name}'"
            ))
            .await
            .unwrap();
        assert!(rows.is_empty(), "table {name} should have been dropped during cleanup");
    }
}

#[tokio::test]
#[ignore]
async fn max_report_one_aborts_on_concentrated_differences() {
    let db = TestDb::start().await;
    // Two differences that land in the same root bucket when factor is
    // large relative to the table size — with max_report = 1 the walk
    // must abort with EffortExceeded rather than silently truncating.
    let left_conn = db.seeded_table("t_effort_left", &[(1, "a"), (2, "b"), (3, "c"), (4, "d")]).await;
    let right_conn = db
        .seeded_table("t_effort_right", &[(1, "A"), (2, "B"), (3, "C"), (4, "D")])
        .await;

    let left = Side::new("left", left_conn, "t_effort_left").with_cols(vec!["val".into()]);
    let right = Side::new("right", right_conn, "t_effort_right").with_cols(vec!["val".into()]);

    let opts = postgres_options().max_report(1).factor(1).build();
    let mut comparator = Comparator::new(left, right, opts).unwrap();
    let mut sink = VecSink::new();
    let result = comparator.process(&mut sink).await;

    assert!(matches!(result, Err(tablediff::CompareError::EffortExceeded { .. })));
}
