//! Cluster-wide mutual exclusion for scheduled jobs.
//!
//! One lease row per job name. A lease is taken for the job's maximum hold
//! duration up front, so a crashed holder locks peers out for at most that
//! ceiling before the lease self-expires. Releasing never shortens the lease
//! below acquired-at plus the minimum hold, so a fast run still blocks peer
//! processes for the configured floor.

use std::time::Duration;

use sqlx::PgExecutor;

/// Lease operations over the `job_locks` table.
pub struct JobLockRepo;

impl JobLockRepo {
    /// Try to take the lease for `job_name`.
    ///
    /// Succeeds when no lease row exists yet or the existing lease has
    /// expired. Returns `false` when another holder still owns the lease.
    pub async fn try_acquire(
        ex: impl PgExecutor<'_>,
        job_name: &str,
        holder: &str,
        max_hold: Duration,
    ) -> Result<bool, sqlx::Error> {
        let row: Option<String> = sqlx::query_scalar(
            "INSERT INTO job_locks (job_name, holder, locked_at, lock_until) \
             VALUES ($1, $2, now(), now() + make_interval(secs => $3)) \
             ON CONFLICT (job_name) DO UPDATE \
                 SET holder = EXCLUDED.holder, \
                     locked_at = EXCLUDED.locked_at, \
                     lock_until = EXCLUDED.lock_until \
                 WHERE job_locks.lock_until <= now() \
             RETURNING job_name",
        )
        .bind(job_name)
        .bind(holder)
        .bind(max_hold.as_secs_f64())
        .fetch_optional(ex)
        .await?;
        Ok(row.is_some())
    }

    /// Release the lease, keeping it in force until acquired-at plus
    /// `min_hold` if that floor has not passed yet.
    ///
    /// A lease owned by a different holder is left untouched.
    pub async fn release(
        ex: impl PgExecutor<'_>,
        job_name: &str,
        holder: &str,
        min_hold: Duration,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE job_locks \
             SET lock_until = GREATEST(locked_at + make_interval(secs => $3), now()) \
             WHERE job_name = $1 AND holder = $2",
        )
        .bind(job_name)
        .bind(holder)
        .bind(min_hold.as_secs_f64())
        .execute(ex)
        .await?;
        Ok(())
    }
}
