use study_core::{update, AppState, Effect, FlowPhase, JobSnapshot, JobStatus, Msg, SubmitReply};

#[test]
fn late_poll_result_after_cancel_is_ignored() {
    let (state, effects) = update(
        AppState::new(),
        Msg::ExtractRequested {
            url: "https://example.com/rust".to_string(),
        },
    );
    let Some(Effect::SubmitExtraction { flow_id, .. }) = effects.first().cloned() else {
        panic!("expected a submission, got {effects:?}");
    };
    let (state, _) = update(
        state,
        Msg::SubmitAccepted {
            flow_id,
            reply: SubmitReply::Queued {
                job_id: "job-1".to_string(),
            },
        },
    );
    let (mut state, effects) = update(state, Msg::CancelRequested { flow_id });
    assert_eq!(effects, vec![Effect::CancelPoll { flow_id }]);
    state.consume_dirty();

    let before = state.clone();
    let (mut next, effects) = update(
        state,
        Msg::JobPolled {
            flow_id,
            snapshot: JobSnapshot {
                status: JobStatus::Completed,
                progress: 100,
                document_id: Some("doc-1".to_string()),
                error: None,
            },
        },
    );

    assert!(effects.is_empty());
    assert_eq!(next, before);
    assert_eq!(next.flow(flow_id).map(|flow| flow.phase), Some(FlowPhase::Cancelled));
    assert!(!next.consume_dirty());
}
