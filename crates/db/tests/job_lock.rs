//! Integration tests for the cluster-wide job lease.

use std::time::Duration;

use personfeed_db::repositories::JobLockRepo;
use sqlx::PgPool;

const JOB: &str = "test_job";

#[sqlx::test(migrations = "../../db/migrations")]
async fn second_holder_is_denied_while_the_lease_is_active(pool: PgPool) {
    let acquired = JobLockRepo::try_acquire(&pool, JOB, "holder-a", Duration::from_secs(60))
        .await
        .unwrap();
    assert!(acquired);

    let stolen = JobLockRepo::try_acquire(&pool, JOB, "holder-b", Duration::from_secs(60))
        .await
        .unwrap();
    assert!(!stolen);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn leases_for_different_jobs_are_independent(pool: PgPool) {
    assert!(
        JobLockRepo::try_acquire(&pool, "job_one", "holder-a", Duration::from_secs(60))
            .await
            .unwrap()
    );
    assert!(
        JobLockRepo::try_acquire(&pool, "job_two", "holder-b", Duration::from_secs(60))
            .await
            .unwrap()
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn expired_lease_can_be_taken_over(pool: PgPool) {
    assert!(
        JobLockRepo::try_acquire(&pool, JOB, "crashed-holder", Duration::from_secs(1))
            .await
            .unwrap()
    );
    tokio::time::sleep(Duration::from_millis(1300)).await;

    // The crashed holder's lease self-expired at the maximum hold.
    assert!(
        JobLockRepo::try_acquire(&pool, JOB, "holder-b", Duration::from_secs(60))
            .await
            .unwrap()
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn release_with_zero_min_hold_frees_the_lease_immediately(pool: PgPool) {
    assert!(
        JobLockRepo::try_acquire(&pool, JOB, "holder-a", Duration::from_secs(60))
            .await
            .unwrap()
    );
    JobLockRepo::release(&pool, JOB, "holder-a", Duration::ZERO)
        .await
        .unwrap();

    assert!(
        JobLockRepo::try_acquire(&pool, JOB, "holder-b", Duration::from_secs(60))
            .await
            .unwrap()
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn release_keeps_the_minimum_hold_in_force(pool: PgPool) {
    assert!(
        JobLockRepo::try_acquire(&pool, JOB, "holder-a", Duration::from_secs(60))
            .await
            .unwrap()
    );
    JobLockRepo::release(&pool, JOB, "holder-a", Duration::from_secs(60))
        .await
        .unwrap();

    // A fast run still blocks peers until acquired-at + min hold.
    assert!(
        !JobLockRepo::try_acquire(&pool, JOB, "holder-b", Duration::from_secs(60))
            .await
            .unwrap()
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn release_by_a_non_owner_is_ignored(pool: PgPool) {
    assert!(
        JobLockRepo::try_acquire(&pool, JOB, "holder-a", Duration::from_secs(60))
            .await
            .unwrap()
    );
    JobLockRepo::release(&pool, JOB, "holder-b", Duration::ZERO)
        .await
        .unwrap();

    // Still held by holder-a.
    assert!(
        !JobLockRepo::try_acquire(&pool, JOB, "holder-c", Duration::from_secs(60))
            .await
            .unwrap()
    );
}
