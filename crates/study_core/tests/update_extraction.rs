use std::sync::Once;
use std::time::Duration;

use pretty_assertions::assert_eq;
use study_core::{
    update, AppState, Concept, Effect, ExtractedDocument, FailureKind, FlowId, FlowPhase,
    JobSnapshot, JobStatus, Msg, Notification, NotifyLevel, PollPolicy, RequestFailure,
    SubmitReply,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(study_logging::initialize_for_tests);
}

fn request(state: AppState, url: &str) -> (AppState, FlowId) {
    let (state, effects) = update(
        state,
        Msg::ExtractRequested {
            url: url.to_string(),
        },
    );
    let flow_id = effects
        .iter()
        .find_map(|effect| match effect {
            Effect::SubmitExtraction { flow_id, .. } => Some(*flow_id),
            _ => None,
        })
        .expect("submit effect");
    (state, flow_id)
}

fn queued(state: AppState, flow_id: FlowId, job_id: &str) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::SubmitAccepted {
            flow_id,
            reply: SubmitReply::Queued {
                job_id: job_id.to_string(),
            },
        },
    )
}

fn polled(state: AppState, flow_id: FlowId, snapshot: JobSnapshot) -> (AppState, Vec<Effect>) {
    update(state, Msg::JobPolled { flow_id, snapshot })
}

fn processing(progress: u8) -> JobSnapshot {
    JobSnapshot {
        status: JobStatus::Processing,
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

fn document(document_id: &str) -> ExtractedDocument {
    ExtractedDocument {
        document_id: document_id.to_string(),
        url: "https://example.com/article".to_string(),
        title: Some("Article".to_string()),
        summary: None,
        text_length: 1200,
        chunks_indexed: 4,
        concepts: vec![Concept::from_label("Ownership").unwrap()],
    }
}

fn network_error() -> RequestFailure {
    RequestFailure::new(FailureKind::Network, "connection refused")
}

fn scheduled_delays(effects: &[Effect]) -> Vec<Duration> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::SchedulePoll { delay, .. } => Some(*delay),
            _ => None,
        })
        .collect()
}

#[test]
fn invalid_url_is_rejected_without_submission() {
    init_logging();
    for raw in ["", "   ", "not a url", "ftp://example.com/file"] {
        let (state, effects) = update(
            AppState::new(),
            Msg::ExtractRequested {
                url: raw.to_string(),
            },
        );
        assert!(state.view().flows.is_empty(), "{raw:?} created a flow");
        assert!(matches!(
            effects.as_slice(),
            [Effect::Notify(Notification {
                level: NotifyLevel::Error,
                ..
            })]
        ));
    }
}

#[test]
fn already_extracted_fetches_document_immediately() {
    init_logging();
    let (state, flow_id) = request(AppState::new(), " https://example.com/article ");
    let (state, effects) = update(
        state,
        Msg::SubmitAccepted {
            flow_id,
            reply: SubmitReply::AlreadyExtracted {
                document_id: "doc-1".to_string(),
            },
        },
    );
    assert_eq!(
        effects,
        vec![Effect::FetchDocument {
            flow_id,
            document_id: "doc-1".to_string(),
        }]
    );

    let (state, effects) = update(
        state,
        Msg::DocumentFetched {
            flow_id,
            document: document("doc-1"),
        },
    );
    assert_eq!(
        effects[0],
        Effect::WriteCache {
            flow_id,
            document: document("doc-1"),
        }
    );
    assert_eq!(state.flow(flow_id).unwrap().phase, FlowPhase::Completed);
    assert_eq!(state.flow(flow_id).unwrap().url, "https://example.com/article");
}

#[test]
fn polling_sequence_is_monotonic_and_fetches_once() {
    init_logging();
    let (state, flow_id) = request(AppState::new(), "https://example.com/article");
    let (state, effects) = queued(state, flow_id, "job-7");
    assert_eq!(
        effects,
        vec![Effect::SchedulePoll {
            flow_id,
            job_id: "job-7".to_string(),
            delay: Duration::from_secs(3),
            attempt: 1,
        }]
    );

    let mut observed = Vec::new();
    let mut fetches = 0;
    let mut state = state;
    // A stale lower progress value in the middle must not move the bar backwards.
    for snapshot in [processing(10), processing(60), processing(40), completed("doc-9")] {
        let (next, effects) = polled(state, flow_id, snapshot);
        state = next;
        for effect in &effects {
            match effect {
                Effect::ReportProgress { progress, .. } => observed.push(*progress),
                Effect::FetchDocument { document_id, .. } => {
                    assert_eq!(document_id, "doc-9");
                    fetches += 1;
                }
                _ => {}
            }
        }
    }
    assert_eq!(observed, vec![10, 60, 60, 100]);
    assert!(observed.windows(2).all(|pair| pair[0] <= pair[1]));

    // A duplicate completion read is ignored: still exactly one fetch.
    let (state, effects) = polled(state, flow_id, completed("doc-9"));
    assert!(effects.is_empty());
    assert_eq!(fetches, 1);

    let (state, effects) = update(
        state,
        Msg::DocumentFetched {
            flow_id,
            document: document("doc-9"),
        },
    );
    let written: Vec<_> = effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::WriteCache { document, .. } => Some(document.document_id.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(written, vec!["doc-9".to_string()]);
    assert_eq!(state.flow(flow_id).unwrap().status, JobStatus::Completed);
}

#[test]
fn failed_job_surfaces_error_verbatim_and_never_writes_cache() {
    init_logging();
    let (state, flow_id) = request(AppState::new(), "https://example.com/article");
    let (state, _) = queued(state, flow_id, "job-1");
    let (state, effects) = polled(
        state,
        flow_id,
        JobSnapshot {
            status: JobStatus::Failed,
            progress: 35,
            document_id: None,
            error: Some("No text found at the provided URL".to_string()),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::Notify(Notification::error(
            "No text found at the provided URL"
        ))]
    );
    let flow = state.flow(flow_id).unwrap();
    assert_eq!(flow.phase, FlowPhase::Failed);

    // Late reads for a failed flow are dropped.
    let (_, effects) = polled(state, flow_id, completed("doc-1"));
    assert!(effects.is_empty());
}

#[test]
fn transient_poll_errors_back_off_and_recover() {
    init_logging();
    let (state, flow_id) = request(AppState::new(), "https://example.com/article");
    let (state, _) = queued(state, flow_id, "job-1");

    let (state, first) = update(
        state,
        Msg::PollFailed {
            flow_id,
            failure: network_error(),
        },
    );
    let (state, second) = update(
        state,
        Msg::PollFailed {
            flow_id,
            failure: network_error(),
        },
    );
    assert_eq!(scheduled_delays(&first), vec![Duration::from_secs(6)]);
    assert_eq!(scheduled_delays(&second), vec![Duration::from_secs(12)]);

    // A good read resets the streak back to the base delay.
    let (state, effects) = polled(state, flow_id, processing(20));
    assert_eq!(scheduled_delays(&effects), vec![Duration::from_secs(3)]);
    assert_eq!(state.flow(flow_id).unwrap().error_streak, 0);
    assert_eq!(state.flow(flow_id).unwrap().attempts, 4);
}

#[test]
fn exhausting_attempts_times_out() {
    init_logging();
    let policy = PollPolicy {
        max_attempts: 2,
        ..PollPolicy::default()
    };
    let (state, flow_id) = request(AppState::with_policy(policy), "https://example.com/a");
    let (state, effects) = queued(state, flow_id, "job-1");
    assert_eq!(scheduled_delays(&effects).len(), 1);

    let (state, effects) = update(
        state,
        Msg::PollFailed {
            flow_id,
            failure: network_error(),
        },
    );
    assert_eq!(scheduled_delays(&effects).len(), 1);

    let (state, effects) = polled(state, flow_id, processing(50));
    assert!(scheduled_delays(&effects).is_empty());
    assert!(effects.contains(&Effect::ReportProgress {
        flow_id,
        status: JobStatus::TimedOut,
        progress: 50,
    }));
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::Notify(Notification {
            level: NotifyLevel::Error,
            ..
        })
    )));
    let flow = state.flow(flow_id).unwrap();
    assert_eq!(flow.phase, FlowPhase::TimedOut);
    assert_eq!(flow.status, JobStatus::TimedOut);
}

#[test]
fn view_closed_cancels_live_flows_and_silences_late_results() {
    init_logging();
    let (state, first) = request(AppState::new(), "https://example.com/a");
    let (state, _) = queued(state, first, "job-1");
    // Same URL again: not deduplicated.
    let (state, second) = request(state, "https://example.com/a");
    assert_ne!(first, second);
    assert_eq!(state.view().flows.len(), 2);

    let (state, effects) = update(state, Msg::ViewClosed);
    assert_eq!(
        effects,
        vec![
            Effect::CancelPoll { flow_id: first },
            Effect::CancelPoll { flow_id: second },
        ]
    );

    let (state, effects) = polled(state, first, processing(90));
    assert!(effects.is_empty());
    assert_eq!(state.flow(first).unwrap().phase, FlowPhase::Cancelled);
    assert_eq!(state.flow(first).unwrap().progress, 0);

    let (_, effects) = update(state, Msg::CancelRequested { flow_id: first });
    assert!(effects.is_empty());
}

#[test]
fn mismatched_document_fails_the_flow() {
    init_logging();
    let (state, flow_id) = request(AppState::new(), "https://example.com/a");
    let (state, _) = queued(state, flow_id, "job-1");
    let (state, _) = polled(state, flow_id, completed("doc-1"));
    let (state, effects) = update(
        state,
        Msg::DocumentFetched {
            flow_id,
            document: document("doc-2"),
        },
    );
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::WriteCache { .. })));
    assert_eq!(state.flow(flow_id).unwrap().phase, FlowPhase::Failed);
}

#[test]
fn rate_limited_submission_gets_distinct_message() {
    init_logging();
    let (state, flow_id) = request(AppState::new(), "https://example.com/a");
    let (mut state, effects) = update(
        state,
        Msg::SubmitFailed {
            flow_id,
            failure: RequestFailure::new(FailureKind::RateLimited, "429 quota exceeded"),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::Notify(Notification::error(
            study_core::RATE_LIMIT_MESSAGE
        ))]
    );
    assert!(state.consume_dirty());
    assert!(!state.consume_dirty());
}
