use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use study_core::{
    Concept, ExtractedDocument, JobSnapshot, JobStatus, NotifyLevel, PollPolicy, SubmitReply,
};
use study_engine::{
    ApiError, ChannelProgressSink, ContentCache, ExtractionApi, ExtractionDriver, ExtractionEvent,
    ExtractionOutcome, KvStore, MemoryStore, ProgressSink, StoreError, CONCEPTS_KEY, INFO_KEY,
};

struct ScriptedApi {
    submit: Result<SubmitReply, ApiError>,
    polls: Mutex<VecDeque<Result<JobSnapshot, ApiError>>>,
    poll_calls: AtomicUsize,
    document_calls: AtomicUsize,
    document_id: String,
}

impl ScriptedApi {
    fn queued(polls: Vec<Result<JobSnapshot, ApiError>>) -> Self {
        Self {
            submit: Ok(SubmitReply::Queued {
                job_id: "job-1".to_string(),
            }),
            polls: Mutex::new(polls.into()),
            poll_calls: AtomicUsize::new(0),
            document_calls: AtomicUsize::new(0),
            document_id: "doc-1".to_string(),
        }
    }

    fn polls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    fn documents(&self) -> usize {
        self.document_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionApi for ScriptedApi {
    async fn submit_extraction(&self, _url: &str) -> Result<SubmitReply, ApiError> {
        self.submit.clone()
    }

    async fn job_status(&self, _job_id: &str) -> Result<JobSnapshot, ApiError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(snapshot(JobStatus::Processing, 50)))
    }

    async fn document(&self, document_id: &str) -> Result<ExtractedDocument, ApiError> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ExtractedDocument {
            document_id: document_id.to_string(),
            url: "https://example.com/rust".to_string(),
            concepts: vec![Concept {
                title: "Ownership".to_string(),
                description: None,
            }],
            ..ExtractedDocument::default()
        })
    }
}

fn snapshot(status: JobStatus, progress: u8) -> JobSnapshot {
    JobSnapshot {
        status,
        progress,
        ..JobSnapshot::default()
    }
}

fn completed(document_id: &str) -> JobSnapshot {
    JobSnapshot {
        status: JobStatus::Completed,
        progress: 100,
        document_id: Some(document_id.to_string()),
        error: None,
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<ExtractionEvent>>,
}

impl RecordingSink {
    fn progress(&self) -> Vec<u8> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                ExtractionEvent::Progress { progress, .. } => Some(*progress),
                _ => None,
            })
            .collect()
    }

    fn delays(&self) -> Vec<Duration> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                ExtractionEvent::PollScheduled { delay, .. } => Some(*delay),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: ExtractionEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn driver(api: Arc<ScriptedApi>, policy: PollPolicy) -> (ExtractionDriver, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let cache = ContentCache::new(store.clone());
    (ExtractionDriver::new(api, cache, policy), store)
}

#[tokio::test(start_paused = true)]
async fn progress_is_monotonic_and_document_fetched_once() {
    let api = Arc::new(ScriptedApi::queued(vec![
        Ok(snapshot(JobStatus::Queued, 10)),
        Ok(snapshot(JobStatus::Processing, 60)),
        Ok(snapshot(JobStatus::Processing, 40)),
        Ok(completed("doc-1")),
    ]));
    let (mut driver, store) = driver(api.clone(), PollPolicy::default());
    let sink = RecordingSink::default();

    let outcome = driver.extract("https://example.com/rust", &sink).await;

    let ExtractionOutcome::Completed(document) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(document.document_id, "doc-1");
    assert_eq!(sink.progress(), vec![10, 60, 60, 100]);
    assert_eq!(api.polls(), 4);
    assert_eq!(api.documents(), 1);
    assert!(store.get(CONCEPTS_KEY).is_some());
}

#[tokio::test(start_paused = true)]
async fn failed_job_leaves_cache_untouched() {
    let api = Arc::new(ScriptedApi::queued(vec![Ok(JobSnapshot {
        status: JobStatus::Failed,
        progress: 20,
        document_id: None,
        error: Some("Page could not be fetched".to_string()),
    })]));
    let (mut driver, store) = driver(api.clone(), PollPolicy::default());

    let outcome = driver
        .extract("https://example.com/rust", &RecordingSink::default())
        .await;

    assert_eq!(
        outcome,
        ExtractionOutcome::Failed("Page could not be fetched".to_string())
    );
    assert_eq!(api.documents(), 0);
    assert!(store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn poll_errors_back_off_then_time_out() {
    let api = Arc::new(ScriptedApi::queued(vec![
        Err(ApiError::Network("connection reset".to_string())),
        Err(ApiError::Status {
            status: 503,
            detail: "unavailable".to_string(),
        }),
        Err(ApiError::Network("connection reset".to_string())),
    ]));
    let policy = PollPolicy {
        max_attempts: 3,
        ..PollPolicy::default()
    };
    let (mut driver, _store) = driver(api.clone(), policy);
    let sink = RecordingSink::default();

    let outcome = driver.extract("https://example.com/rust", &sink).await;

    assert_eq!(outcome, ExtractionOutcome::TimedOut { attempts: 3 });
    assert_eq!(api.polls(), 3);
    assert_eq!(
        sink.delays(),
        vec![
            Duration::from_secs(3),
            Duration::from_secs(6),
            Duration::from_secs(12)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn already_extracted_skips_polling() {
    let api = Arc::new(ScriptedApi {
        submit: Ok(SubmitReply::AlreadyExtracted {
            document_id: "doc-1".to_string(),
        }),
        ..ScriptedApi::queued(Vec::new())
    });
    let (mut driver, _store) = driver(api.clone(), PollPolicy::default());

    let outcome = driver
        .extract("https://example.com/rust", &RecordingSink::default())
        .await;

    assert!(matches!(outcome, ExtractionOutcome::Completed(_)));
    assert_eq!(api.polls(), 0);
    assert_eq!(api.documents(), 1);
}

#[tokio::test(start_paused = true)]
async fn invalid_url_is_rejected_without_submission() {
    let api = Arc::new(ScriptedApi::queued(Vec::new()));
    let (mut driver, _store) = driver(api.clone(), PollPolicy::default());

    let outcome = driver.extract("not a url", &RecordingSink::default()).await;

    assert!(matches!(outcome, ExtractionOutcome::Rejected(_)));
    assert!(driver.state().view().flows.is_empty());
    assert_eq!(api.polls(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_polling() {
    let api = Arc::new(ScriptedApi::queued(Vec::new()));
    let (mut driver, store) = driver(api.clone(), PollPolicy::default());
    let cancel = driver.cancel_token();

    let canceller = tokio::spawn(async move {
        // Lands between the second and third status checks (3s, then 3s more).
        tokio::time::sleep(Duration::from_secs(7)).await;
        cancel.cancel();
    });

    let outcome = driver
        .extract("https://example.com/rust", &RecordingSink::default())
        .await;
    canceller.await.unwrap();

    assert_eq!(outcome, ExtractionOutcome::Cancelled);
    assert_eq!(api.polls(), 2);
    assert_eq!(api.documents(), 0);
    assert!(store.is_empty());
}

/// Rejects writes to one key and delegates everything else.
struct RejectingStore {
    inner: MemoryStore,
    rejected: &'static str,
}

impl KvStore for RejectingStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if key == self.rejected {
            return Err(StoreError::Directory("read-only".to_string()));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }
}

#[tokio::test(start_paused = true)]
async fn unsaved_document_is_reported_as_failure() {
    let api = Arc::new(ScriptedApi::queued(vec![Ok(completed("doc-1"))]));
    let store = Arc::new(RejectingStore {
        inner: MemoryStore::new(),
        rejected: INFO_KEY,
    });
    let cache = ContentCache::new(store.clone());
    let mut driver = ExtractionDriver::new(api.clone(), cache.clone(), PollPolicy::default());
    let sink = RecordingSink::default();

    let outcome = driver.extract("https://example.com/rust", &sink).await;

    let ExtractionOutcome::Failed(message) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(message.contains("could not be saved locally"));
    assert_eq!(api.documents(), 1);
    assert!(!cache.has_extracted_content());
    assert!(store.inner.is_empty());
    let errors = sink
        .events
        .lock()
        .unwrap()
        .iter()
        .filter(|event| {
            matches!(event, ExtractionEvent::Notice(notice) if notice.level == NotifyLevel::Error)
        })
        .count();
    assert_eq!(errors, 1);
    assert!(!sink.events.lock().unwrap().iter().any(|event| {
        matches!(event, ExtractionEvent::Notice(notice) if notice.level == NotifyLevel::Success)
    }));
}

#[tokio::test(start_paused = true)]
async fn channel_sink_delivers_events_in_order() {
    let api = Arc::new(ScriptedApi::queued(vec![
        Ok(snapshot(JobStatus::Processing, 40)),
        Ok(completed("doc-1")),
    ]));
    let (mut driver, _store) = driver(api, PollPolicy::default());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let outcome = driver
        .extract("https://example.com/rust", &ChannelProgressSink::new(tx))
        .await;
    assert!(matches!(outcome, ExtractionOutcome::Completed(_)));

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(matches!(
        events.first(),
        Some(ExtractionEvent::Submitted { url, .. }) if url == "https://example.com/rust"
    ));
    let progress: Vec<u8> = events
        .iter()
        .filter_map(|event| match event {
            ExtractionEvent::Progress { progress, .. } => Some(*progress),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![40, 100]);
}
