// Persists grading progress to Redis so the API can serve partial results

use async_trait::async_trait;
use gavel_common::redis;
use gavel_common::types::Submission;
use gavel_engine::ProgressSink;
use std::time::Duration;

pub struct RedisProgress {
    conn: ::redis::aio::ConnectionManager,
    ttl: Duration,
}

impl RedisProgress {
    pub fn new(conn: ::redis::aio::ConnectionManager, ttl: Duration) -> Self {
        Self { conn, ttl }
    }
}

#[async_trait]
impl ProgressSink for RedisProgress {
    async fn persist(&mut self, submission: &Submission) -> anyhow::Result<()> {
        redis::store_submission(&mut self.conn, submission, self.ttl).await?;
        Ok(())
    }
}
