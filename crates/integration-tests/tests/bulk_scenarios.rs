//! End-to-end bulk job scenarios against a real SQLite store

mod common;

use bulkops_core::domain::{BulkOperation, Caller, JobStatus, Role};
use bulkops_core::error::AppError;
use common::{editor, request, TestDb};

/// Scenario 1: deactivate five items, two already inactive
#[tokio::test]
async fn test_deactivate_mixed_items_to_completion() {
    let db = TestDb::new().await;
    let ids = db.seed("u1", "item", 5).await;
    let owner = editor("u1");
    let service = db.service();

    // Two items are already where the job wants them
    let warmup = service
        .create_job(&owner, request(BulkOperation::Deactivate, &ids[3..]))
        .await
        .unwrap();
    let warmup = service.process_next_batch(&warmup.id, &owner).await.unwrap();
    assert_eq!(warmup.status, JobStatus::Completed);

    let job = service
        .create_job(&owner, request(BulkOperation::Deactivate, &ids))
        .await
        .unwrap();
    assert_eq!(job.total_count, 5);
    assert_eq!(job.skipped_ids, ids[3..].to_vec());
    assert_eq!(job.progress_percent, 40);
    // Plan-time skips already count as done
    assert_eq!(job.status, JobStatus::Processing);

    let first = service.process_next_batch(&job.id, &owner).await.unwrap();
    assert_eq!(first.processed_ids.len(), 2);
    assert_eq!(first.status, JobStatus::Processing);
    assert_eq!(first.progress_percent, 80);

    let second = service.process_next_batch(&job.id, &owner).await.unwrap();
    assert_eq!(second.status, JobStatus::Completed);
    assert_eq!(second.progress_percent, 100);
    assert_eq!(second.processed_ids, ids[..3].to_vec());
    assert!(second.failed_items.is_empty());

    for id in &ids {
        let stored = db.items.find_item(id).await.unwrap().unwrap();
        assert!(!stored.is_active, "{} should be inactive", id);
    }

    // Completed jobs are returned unchanged
    let again = service.process_next_batch(&job.id, &owner).await.unwrap();
    assert_eq!(again, second);
}

/// Scenario 2: ids the caller cannot see are skipped, never mutated
#[tokio::test]
async fn test_missing_and_foreign_ids_are_skipped() {
    let db = TestDb::new().await;
    let mine = db.seed("u1", "mine", 2).await;
    let theirs = db.seed("u2", "theirs", 1).await;
    let owner = editor("u1");
    let service = db.service();

    let mut requested = mine.clone();
    requested.push(theirs[0].clone());
    requested.push("ghost".to_string());
    requested.push(mine[0].clone());

    let job = service
        .create_job(&owner, request(BulkOperation::Delete, &requested))
        .await
        .unwrap();
    assert_eq!(job.total_count, 4);
    assert_eq!(job.skipped_ids, vec![theirs[0].clone(), "ghost".to_string()]);

    let done = service.process_next_batch(&job.id, &owner).await.unwrap();
    assert!(done.is_completed());
    assert_eq!(done.processed_ids, mine);

    let untouched = db.items.find_item(&theirs[0]).await.unwrap().unwrap();
    assert!(untouched.is_active);
    assert_eq!(untouched.version, 1);

    let deleted = db.items.find_item(&mine[0]).await.unwrap().unwrap();
    assert_eq!(deleted.deleted_at, Some(common::START));
}

/// Scenario 3: jobs are private to their owner, admins see everything
#[tokio::test]
async fn test_job_visibility() {
    let db = TestDb::new().await;
    let ids = db.seed("u1", "item", 1).await;
    let service = db.service();

    let job = service
        .create_job(&editor("u1"), request(BulkOperation::Deactivate, &ids))
        .await
        .unwrap();

    let err = service.get_job(&job.id, &editor("u2")).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = service
        .process_next_batch(&job.id, &editor("u2"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let admin = Caller::new("root", Role::Admin);
    let seen = service.get_job(&job.id, &admin).await.unwrap();
    assert_eq!(seen.status, JobStatus::Pending);
}

/// Scenario 4: an item deleted out from under the job is a hard failure
#[tokio::test]
async fn test_item_vanishing_after_planning_fails() {
    let db = TestDb::new().await;
    let ids = db.seed("u1", "item", 2).await;
    let owner = editor("u1");
    let service = db.service();

    let job = service
        .create_job(&owner, request(BulkOperation::Deactivate, &ids))
        .await
        .unwrap();

    sqlx::query("DELETE FROM items WHERE id = ?")
        .bind(&ids[1])
        .execute(&db.pool)
        .await
        .unwrap();

    let done = service.process_next_batch(&job.id, &owner).await.unwrap();
    assert!(done.is_completed());
    assert_eq!(done.processed_ids, vec![ids[0].clone()]);
    assert_eq!(done.failed_items.len(), 1);
    assert_eq!(done.failed_items[0].id, ids[1]);
    assert!(done.failed_items[0].error.chars().count() <= 50);
}

/// Scenario 5: progress never goes backwards while polling
#[tokio::test]
async fn test_progress_is_monotonic() {
    let db = TestDb::new().await;
    let ids = db.seed("u1", "item", 7).await;
    let owner = editor("u1");
    let service = db.service();

    let job = service
        .create_job(&owner, request(BulkOperation::Deactivate, &ids))
        .await
        .unwrap();

    let mut last = job.progress_percent;
    let mut polls = 0;
    loop {
        let view = service.process_next_batch(&job.id, &owner).await.unwrap();
        polls += 1;
        assert!(view.progress_percent >= last);
        last = view.progress_percent;
        if view.is_completed() {
            break;
        }
        assert!(view.progress_percent < 100);
    }

    assert_eq!(polls, 4);
    assert_eq!(last, 100);
}
