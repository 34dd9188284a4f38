//! Detection runner worker process: polls the durable job queue and
//! dispatches detection-run jobs through [`soc_runtime::DetectionRunner`].
//!
//! Retention-export and embedding-migration jobs are provided as
//! library [`soc_runtime::jobs`] adapters but are not wired into this
//! binary, since their backends (cold object storage, legal-hold
//! registry) are deployment-specific and have no in-tree production
//! implementation to default to.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use soc_audit::{ChainBackend, ChainWriter, FileChainBackend};
use soc_llm::{DeepSeekProvider, LlmConfig, LlmProvider, MockProvider, OpenAIProvider, ResilientProvider};
use soc_persist::{SqliteBackend, SqliteQueueBackend};
use soc_queue::job::{Job, JobResult};
use soc_queue::{kinds, WorkerConfig, WorkerPool};
use soc_runtime::{ConcurrencyConfig, DetectionRunJob, DetectionRunPayload, DetectionRunner};

/// Stand-in for a job whose payload failed to deserialize. The worker
/// pool's factory callback can't return an error itself, so a bad
/// payload becomes a job that immediately dead-letters with the
/// original parse error instead of panicking the worker task.
#[derive(Debug)]
struct UndecodableJob(String);

#[async_trait]
impl Job for UndecodableJob {
    fn name(&self) -> &str {
        "undecodable"
    }

    async fn execute(&mut self) -> JobResult {
        JobResult::Fatal(self.0.clone())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let llm_config = LlmConfig::from_env();
    let concurrency_config = ConcurrencyConfig::from_env();

    let audit_dir = std::env::var("SOC_AUDIT_CHAIN_DIR").unwrap_or_else(|_| "./data/audit-chain".to_string());
    let chain = Arc::new(ChainWriter::new(FileChainBackend::new(audit_dir)));

    let storage_url = std::env::var("SOC_DATABASE_URL").unwrap_or_else(|_| "sqlite:soc.db?mode=rwc".to_string());
    let storage = SqliteBackend::new(&storage_url).await?;
    let queue_backend = Arc::new(SqliteQueueBackend::new(storage.pool().clone()));

    match llm_config.default_provider.as_str() {
        "openai" if llm_config.primary_api_key.is_some() => {
            let provider = OpenAIProvider::new(llm_config.primary_api_key.as_deref().unwrap(), "gpt-4");
            run(chain, provider, queue_backend, concurrency_config).await
        }
        "deepseek" if llm_config.secondary_api_key.is_some() => {
            let provider = DeepSeekProvider::new(llm_config.secondary_api_key.as_deref().unwrap(), "deepseek-chat");
            run(chain, provider, queue_backend, concurrency_config).await
        }
        other => {
            warn!(configured_provider = other, "no credentials for the configured LLM provider, falling back to the mock classifier");
            run(chain, MockProvider::classifier(), queue_backend, concurrency_config).await
        }
    }
}

async fn run<B, P>(chain: Arc<ChainWriter<B>>, provider: P, queue_backend: Arc<SqliteQueueBackend>, concurrency: ConcurrencyConfig) -> anyhow::Result<()>
where
    B: ChainBackend + 'static,
    P: LlmProvider + 'static,
{
    let runner = Arc::new(DetectionRunner::new(chain, Arc::new(ResilientProvider::wrap(provider))));

    let pool = WorkerPool::new_with_arc(
        queue_backend,
        WorkerConfig {
            max_concurrency: concurrency.worker_max_concurrency,
            poll_interval: concurrency.poll_interval(),
        },
    );

    pool.register_job_factory(kinds::DETECTION_RUN, move |payload| {
        match serde_json::from_value::<DetectionRunPayload>(payload) {
            Ok(payload) => Box::new(DetectionRunJob::new(runner.clone(), payload)) as Box<dyn Job>,
            Err(err) => Box::new(UndecodableJob(err.to_string())) as Box<dyn Job>,
        }
    });

    info!(max_concurrency = concurrency.worker_max_concurrency, "detection runner worker pool starting");
    pool.start().await;
    Ok(())
}
