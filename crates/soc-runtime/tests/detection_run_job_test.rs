//! End-to-end check that a detection-run job enqueued on the job queue
//! gets dequeued, dispatched through the detection runner, and leaves
//! a completed status plus an audit trail behind.

use std::sync::Arc;
use std::time::Duration;

use soc_audit::{ChainBackend, ChainWriter, FileChainBackend};
use soc_llm::{MockProvider, ResilientProvider};
use soc_queue::job::JobStatus;
use soc_queue::{kinds, MemoryQueue, QueueBackend, WorkerConfig, WorkerPool};
use soc_runtime::{DetectionRunJob, DetectionRunPayload, DetectionRunner};
use tempfile::tempdir;

fn payload() -> DetectionRunPayload {
    DetectionRunPayload {
        tenant_id: "acme-corp".to_string(),
        tenant_tier: "standard".to_string(),
        alert_id: "alert-42".to_string(),
        investigation_id: None,
        task_type: "alert_classification".to_string(),
        severity: "critical".to_string(),
        context_tokens: 800,
        time_budget_seconds: 20,
        requires_reasoning: false,
        previous_confidence: None,
        system_prompt: "classify the alert".to_string(),
        prompt: "repeated failed logins followed by a success from a new ASN".to_string(),
    }
}

#[tokio::test]
async fn queued_detection_run_completes_and_writes_audit_trail() {
    let dir = tempdir().unwrap();
    let chain = Arc::new(ChainWriter::new(FileChainBackend::new(dir.path())));
    let provider = Arc::new(ResilientProvider::wrap(MockProvider::classifier()));
    let runner = Arc::new(DetectionRunner::new(chain.clone(), provider));

    let queue = Arc::new(MemoryQueue::new());
    let job_id = queue
        .enqueue("acme-corp", kinds::DETECTION_RUN, serde_json::to_value(payload()).unwrap(), None)
        .await
        .unwrap();

    let pool = WorkerPool::new_with_arc(queue.clone(), WorkerConfig { max_concurrency: 4, poll_interval: Duration::from_millis(10) });
    pool.register_job_factory(kinds::DETECTION_RUN, move |value| {
        let payload: DetectionRunPayload = serde_json::from_value(value).expect("valid payload");
        Box::new(DetectionRunJob::new(runner.clone(), payload))
    });

    let _ = tokio::time::timeout(Duration::from_secs(2), pool.start()).await;

    let status = queue.get_status("acme-corp", job_id).await.unwrap();
    assert_eq!(status, JobStatus::Completed);

    let job = queue.get_job("acme-corp", job_id).await.unwrap();
    let result = job.result.expect("completed job carries a result value");
    assert_eq!(result["auto_closed"], serde_json::json!(true));

    let records = chain.backend().read_all("acme-corp").await.unwrap();
    let event_types: Vec<&str> = records.iter().map(|r| r.event_type.as_str()).collect();
    assert!(event_types.contains(&"detection.dispatched"));
    assert!(event_types.contains(&"alert.closed"));
}

#[tokio::test]
async fn unavailable_provider_leaves_job_pending_retry_and_writes_failure_record() {
    let dir = tempdir().unwrap();
    let chain = Arc::new(ChainWriter::new(FileChainBackend::new(dir.path())));
    let mock = MockProvider::constant("unused");
    mock.set_available(false);
    let provider = Arc::new(ResilientProvider::wrap(mock));
    let runner = Arc::new(DetectionRunner::new(chain.clone(), provider));

    let queue = Arc::new(MemoryQueue::new());
    let job_id = queue
        .enqueue("acme-corp", kinds::DETECTION_RUN, serde_json::to_value(payload()).unwrap(), None)
        .await
        .unwrap();

    let pool = WorkerPool::new_with_arc(queue.clone(), WorkerConfig { max_concurrency: 4, poll_interval: Duration::from_millis(10) });
    pool.register_job_factory(kinds::DETECTION_RUN, move |value| {
        let payload: DetectionRunPayload = serde_json::from_value(value).expect("valid payload");
        Box::new(DetectionRunJob::new(runner.clone(), payload))
    });

    let _ = tokio::time::timeout(Duration::from_millis(200), pool.start()).await;

    let status = queue.get_status("acme-corp", job_id).await.unwrap();
    assert!(matches!(status, JobStatus::Failed(_)));

    let records = chain.backend().read_all("acme-corp").await.unwrap();
    assert!(records.iter().any(|r| r.event_type == "detection.failed"));
}
