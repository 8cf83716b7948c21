use async_trait::async_trait;
use gavel_common::types::Submission;

/// Where the judge reports grading progress.
///
/// Called after every test case and once more with the terminal verdict.
/// Failures are logged by the judge and never change the verdict.
#[async_trait]
pub trait ProgressSink: Send {
    async fn persist(&mut self, submission: &Submission) -> anyhow::Result<()>;
}

/// Sink for callers that only want the final result
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

#[async_trait]
impl ProgressSink for NoopProgress {
    async fn persist(&mut self, _submission: &Submission) -> anyhow::Result<()> {
        Ok(())
    }
}
