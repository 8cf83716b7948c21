use crate::types::Submission;
use redis::{AsyncCommands, RedisResult};
use std::time::Duration;
use uuid::Uuid;

/// Redis key semantics shared by the API and the worker.
/// Keeping them here means the two sides never drift.

pub const QUEUE_PREFIX: &str = "gavel:queue";
pub const SUBMISSION_PREFIX: &str = "gavel:submission";

/// Single FIFO queue for grade jobs; workers grade every language
pub fn grade_queue() -> String {
    format!("{}:grade", QUEUE_PREFIX)
}

/// Key holding the JSON-encoded submission record
pub fn submission_key(id: &Uuid) -> String {
    format!("{}:{}", SUBMISSION_PREFIX, id)
}

fn serialization_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "serialization error", e.to_string()))
}

/// Enqueue a submission id for grading.
/// Uses RPUSH for FIFO semantics
pub async fn push_job(conn: &mut redis::aio::ConnectionManager, id: &Uuid) -> RedisResult<()> {
    conn.rpush(grade_queue(), id.to_string()).await
}

/// Pop the next submission id to grade.
/// Uses BLPOP with timeout for graceful shutdown
pub async fn pop_job(
    conn: &mut redis::aio::ConnectionManager,
    timeout_seconds: f64,
) -> RedisResult<Option<Uuid>> {
    let result: Option<(String, String)> = conn.blpop(grade_queue(), timeout_seconds).await?;

    match result {
        Some((_key, payload)) => {
            let id = Uuid::parse_str(&payload).map_err(|e| {
                redis::RedisError::from((redis::ErrorKind::TypeError, "invalid job id", e.to_string()))
            })?;
            Ok(Some(id))
        }
        None => Ok(None),
    }
}

/// Store the full submission record with a TTL
pub async fn store_submission(
    conn: &mut redis::aio::ConnectionManager,
    submission: &Submission,
    ttl: Duration,
) -> RedisResult<()> {
    let payload = serde_json::to_string(submission).map_err(serialization_error)?;
    let _: () = conn
        .set_ex(submission_key(&submission.id), payload, ttl.as_secs().max(1))
        .await?;
    Ok(())
}

/// Retrieve a submission record
pub async fn get_submission(
    conn: &mut redis::aio::ConnectionManager,
    id: &Uuid,
) -> RedisResult<Option<Submission>> {
    let payload: Option<String> = conn.get(submission_key(id)).await?;

    match payload {
        Some(data) => {
            let submission: Submission = serde_json::from_str(&data).map_err(serialization_error)?;
            Ok(Some(submission))
        }
        None => Ok(None),
    }
}
