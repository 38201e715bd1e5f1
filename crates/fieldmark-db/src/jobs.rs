//! Job queue repository implementation.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use fieldmark_core::{defaults, Error, Job, JobRepository, JobStatus, JobType, Result};

/// PostgreSQL implementation of [`JobRepository`].
pub struct PgJobRepository {
    pool: Pool<Postgres>,
}

impl PgJobRepository {
    /// Create a new PgJobRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn job_from_row(row: &PgRow) -> Result<Job> {
        let type_str: String = row.try_get("job_type")?;
        let status_str: String = row.try_get("status")?;

        let job_type = JobType::parse(&type_str)
            .ok_or_else(|| Error::Job(format!("Unknown job type: {}", type_str)))?;
        let status = JobStatus::parse(&status_str)
            .ok_or_else(|| Error::Job(format!("Unknown job status: {}", status_str)))?;

        Ok(Job {
            id: row.try_get("id")?,
            job_type,
            status,
            priority: row.try_get("priority")?,
            payload: row.try_get("payload")?,
            result: row.try_get("result")?,
            error_message: row.try_get("error_message")?,
            retry_count: row.try_get("retry_count")?,
            max_retries: row.try_get("max_retries")?,
            created_at: row.try_get("created_at")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn enqueue(
        &self,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
    ) -> Result<Uuid> {
        let id = Uuid::now_v7();

        sqlx::query(
            "INSERT INTO job_queue (id, job_type, status, priority, payload, max_retries, created_at)
             VALUES ($1, $2, 'pending', $3, $4, $5, now())",
        )
        .bind(id)
        .bind(job_type.as_str())
        .bind(priority)
        .bind(payload)
        .bind(defaults::JOB_MAX_RETRIES)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn claim_next(&self) -> Result<Option<Job>> {
        // FOR UPDATE SKIP LOCKED lets concurrent workers claim without
        // blocking each other or double-claiming.
        let row = sqlx::query(
            "UPDATE job_queue
             SET status = 'running', started_at = now()
             WHERE id = (
                 SELECT id FROM job_queue
                 WHERE status = 'pending'
                 ORDER BY priority DESC, created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING id, job_type, status, priority, payload, result, error_message,
                       retry_count, max_retries, created_at, started_at, completed_at",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::job_from_row).transpose()
    }

    async fn complete(&self, id: Uuid, result: Option<JsonValue>) -> Result<()> {
        sqlx::query(
            "UPDATE job_queue
             SET status = 'completed', result = $2, completed_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(result)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail(&self, id: Uuid, error: &str) -> Result<()> {
        // Jobs with retries left go back to pending for another attempt.
        sqlx::query(
            "UPDATE job_queue
             SET retry_count = retry_count + 1,
                 error_message = $2,
                 status = CASE WHEN retry_count + 1 >= max_retries
                               THEN 'failed' ELSE 'pending' END,
                 started_at = NULL,
                 completed_at = CASE WHEN retry_count + 1 >= max_retries
                                     THEN now() ELSE NULL END
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
