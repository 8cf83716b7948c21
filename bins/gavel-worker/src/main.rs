mod progress;

use gavel_common::config::ServiceConfig;
use gavel_common::redis;
use gavel_engine::{Judge, JudgeConfig};
use progress::RedisProgress;
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, error, info, instrument, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Gavel Worker booting...");

    let judge_config = JudgeConfig::load_default().map_err(|e| {
        error!("Failed to load judge configuration: {}", e);
        error!("Check GAVEL_CONFIG or config/judge.json");
        e
    })?;
    let service = ServiceConfig::from_env();

    info!("Configured languages: {:?}", judge_config.list_languages());
    info!("Job workspace root: {}", judge_config.workspace_root.display());

    let client = ::redis::Client::open(service.redis_url.as_str())?;
    let redis_conn = ::redis::aio::ConnectionManager::new(client).await?;

    info!("Connected to Redis: {}", service.redis_url);

    let judge = Arc::new(Judge::new(judge_config));

    // Each worker grades one submission at a time in its own job directory;
    // workers share nothing mutable
    let mut workers = tokio::task::JoinSet::new();
    for worker_id in 0..service.worker_concurrency {
        let judge = Arc::clone(&judge);
        let conn = redis_conn.clone();
        let ttl = service.result_ttl;
        workers.spawn(async move { worker_loop(worker_id, conn, judge, ttl).await });
    }

    info!(workers = service.worker_concurrency, "Waiting for grade jobs");

    // Setup graceful shutdown
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
        warn!("Received shutdown signal, stopping workers...");
    };

    tokio::select! {
        _ = async { while workers.join_next().await.is_some() {} } => {},
        _ = shutdown => {},
    }

    // Dropping the set aborts in-flight gradings; their job directories and
    // child processes are released by their own drop guards
    workers.shutdown().await;

    info!("Worker shutdown complete");
    Ok(())
}

#[instrument(skip(redis_conn, judge, ttl))]
async fn worker_loop(
    worker_id: usize,
    mut redis_conn: ::redis::aio::ConnectionManager,
    judge: Arc<Judge>,
    ttl: std::time::Duration,
) {
    loop {
        // BLPOP with 5 second timeout for graceful shutdown
        let submission_id = match redis::pop_job(&mut redis_conn, 5.0).await {
            Ok(Some(id)) => id,
            Ok(None) => continue,
            Err(e) => {
                error!(error = %e, "Redis error");
                tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
                continue;
            }
        };

        let mut submission = match redis::get_submission(&mut redis_conn, &submission_id).await {
            Ok(Some(submission)) => submission,
            Ok(None) => {
                warn!(submission_id = %submission_id, "Submission record missing, skipping job");
                continue;
            }
            Err(e) => {
                error!(submission_id = %submission_id, error = %e, "Failed to load submission");
                continue;
            }
        };

        if submission.verdict.is_terminal() {
            debug!(submission_id = %submission_id, verdict = %submission.verdict, "Already graded, skipping");
            continue;
        }

        info!(
            submission_id = %submission_id,
            language = %submission.language,
            test_cases = submission.test_cases.len(),
            source_size = submission.source_code.len(),
            "Received job"
        );

        let mut sink = RedisProgress::new(redis_conn.clone(), ttl);
        judge.grade(&mut submission, &mut sink).await;

        info!(
            submission_id = %submission_id,
            verdict = %submission.verdict,
            passed = submission.test_cases_passed,
            total = submission.total_test_cases,
            "Grading finished"
        );
    }
}
