use study_logging::{study_debug, study_warn};

use crate::state::validate_extraction_url;
use crate::{
    AppState, Effect, ExtractedDocument, ExtractionFlow, FlowId, FlowPhase, JobSnapshot,
    JobStatus, Msg, Notification, PollPolicy, RequestFailure, SubmitReply,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::ExtractRequested { url } => match validate_extraction_url(&url) {
            Ok(url) => {
                // Submissions are never deduplicated; each gets its own flow.
                let flow_id = state.start_flow(url.clone());
                vec![Effect::SubmitExtraction { flow_id, url }]
            }
            Err(reason) => vec![Effect::Notify(Notification::error(reason))],
        },
        Msg::SubmitAccepted { flow_id, reply } => submit_accepted(&mut state, flow_id, reply),
        Msg::SubmitFailed { flow_id, failure } => {
            match state.flow_in_phase(flow_id, FlowPhase::Submitting) {
                Some(flow) => {
                    flow.fail(failure.message.clone());
                    state.mark_dirty();
                    vec![Effect::Notify(Notification::for_failure(
                        "Extraction failed",
                        &failure,
                    ))]
                }
                None => ignored(flow_id, "SubmitFailed"),
            }
        }
        Msg::JobPolled { flow_id, snapshot } => job_polled(&mut state, flow_id, snapshot),
        Msg::PollFailed { flow_id, failure } => poll_failed(&mut state, flow_id, &failure),
        Msg::DocumentFetched { flow_id, document } => {
            document_fetched(&mut state, flow_id, document)
        }
        Msg::DocumentFetchFailed { flow_id, failure } => {
            match state.flow_in_phase(flow_id, FlowPhase::FetchingDocument) {
                Some(flow) => {
                    flow.fail(failure.message.clone());
                    state.mark_dirty();
                    vec![Effect::Notify(Notification::for_failure(
                        "Failed to load extracted document",
                        &failure,
                    ))]
                }
                None => ignored(flow_id, "DocumentFetchFailed"),
            }
        }
        Msg::CancelRequested { flow_id } => match state.live_flow(flow_id) {
            Some(flow) => {
                flow.phase = FlowPhase::Cancelled;
                state.mark_dirty();
                vec![Effect::CancelPoll { flow_id }]
            }
            None => ignored(flow_id, "CancelRequested"),
        },
        Msg::ViewClosed => {
            let flow_ids = state.live_flow_ids();
            for flow_id in &flow_ids {
                if let Some(flow) = state.live_flow(*flow_id) {
                    flow.phase = FlowPhase::Cancelled;
                }
            }
            if !flow_ids.is_empty() {
                state.mark_dirty();
            }
            flow_ids
                .into_iter()
                .map(|flow_id| Effect::CancelPoll { flow_id })
                .collect()
        }
        Msg::LibraryLoaded(courses) => {
            state.set_courses(courses);
            Vec::new()
        }
        Msg::LibraryLoadFailed(failure) => vec![Effect::Notify(Notification::for_failure(
            "Failed to load library",
            &failure,
        ))],
        Msg::ToggleRequested { id, flag } => match state.toggle_optimistically(&id, flag) {
            Some(value) => vec![Effect::PatchCourseStatus { id, flag, value }],
            None => vec![Effect::Notify(Notification::warning(format!(
                "No course with id {id}"
            )))],
        },
        Msg::ToggleSucceeded { id, flag } => {
            state.settle_toggle(&id, flag);
            Vec::new()
        }
        Msg::ToggleFailed { id, flag, failure } => {
            if state.revert_toggle(&id, flag) {
                vec![Effect::Notify(Notification::for_failure(
                    "Failed to update status",
                    &failure,
                ))]
            } else {
                Vec::new()
            }
        }
        Msg::DeleteRequested { id } => {
            if state.courses().iter().any(|course| course.id == id) {
                vec![Effect::DeleteCourse { id }]
            } else {
                vec![Effect::Notify(Notification::warning(format!(
                    "No course with id {id}"
                )))]
            }
        }
        Msg::CourseDeleted { id } => {
            state.remove_course(&id);
            vec![Effect::Notify(Notification::success("Course deleted"))]
        }
        Msg::DeleteFailed { failure, .. } => vec![Effect::Notify(Notification::for_failure(
            "Failed to delete course",
            &failure,
        ))],
    };

    (state, effects)
}

fn submit_accepted(state: &mut AppState, flow_id: FlowId, reply: SubmitReply) -> Vec<Effect> {
    let policy = state.policy().clone();
    let Some(flow) = state.flow_in_phase(flow_id, FlowPhase::Submitting) else {
        return ignored(flow_id, "SubmitAccepted");
    };
    let effects = match reply {
        SubmitReply::AlreadyExtracted { document_id } => {
            flow.phase = FlowPhase::FetchingDocument;
            flow.status = JobStatus::Completed;
            flow.raise_progress(100);
            flow.document_id = Some(document_id.clone());
            vec![Effect::FetchDocument {
                flow_id,
                document_id,
            }]
        }
        SubmitReply::Queued { job_id } => {
            flow.phase = FlowPhase::Polling;
            flow.job_id = Some(job_id);
            let mut effects = Vec::with_capacity(1);
            schedule_next_poll(flow_id, flow, &policy, &mut effects);
            effects
        }
    };
    state.mark_dirty();
    effects
}

fn job_polled(state: &mut AppState, flow_id: FlowId, snapshot: JobSnapshot) -> Vec<Effect> {
    let policy = state.policy().clone();
    let Some(flow) = state.flow_in_phase(flow_id, FlowPhase::Polling) else {
        return ignored(flow_id, "JobPolled");
    };
    flow.error_streak = 0;

    let mut effects = Vec::with_capacity(2);
    match snapshot.status {
        JobStatus::Queued | JobStatus::Processing => {
            flow.status = snapshot.status;
            flow.raise_progress(snapshot.progress);
            effects.push(Effect::ReportProgress {
                flow_id,
                status: flow.status,
                progress: flow.progress,
            });
            schedule_next_poll(flow_id, flow, &policy, &mut effects);
        }
        JobStatus::Completed => match snapshot.document_id {
            Some(document_id) => {
                flow.phase = FlowPhase::FetchingDocument;
                flow.status = JobStatus::Completed;
                flow.raise_progress(100);
                flow.document_id = Some(document_id.clone());
                effects.push(Effect::ReportProgress {
                    flow_id,
                    status: flow.status,
                    progress: flow.progress,
                });
                effects.push(Effect::FetchDocument {
                    flow_id,
                    document_id,
                });
            }
            None => {
                flow.fail("job completed without a document id");
                effects.push(Effect::Notify(Notification::error(
                    "Extraction failed: job completed without a document id",
                )));
            }
        },
        JobStatus::Failed | JobStatus::TimedOut => {
            let message = snapshot
                .error
                .unwrap_or_else(|| "Extraction failed".to_string());
            flow.fail(message.clone());
            effects.push(Effect::Notify(Notification::error(message)));
        }
    }
    state.mark_dirty();
    effects
}

fn document_fetched(
    state: &mut AppState,
    flow_id: FlowId,
    document: ExtractedDocument,
) -> Vec<Effect> {
    let Some(flow) = state.flow_in_phase(flow_id, FlowPhase::FetchingDocument) else {
        return ignored(flow_id, "DocumentFetched");
    };
    if flow.document_id.as_deref() != Some(document.document_id.as_str()) {
        study_warn!(
            "Flow {} expected document {:?}, got {}",
            flow_id,
            flow.document_id,
            document.document_id
        );
        flow.fail("backend returned a different document");
        state.mark_dirty();
        return vec![Effect::Notify(Notification::error(
            "Extraction failed: backend returned a different document",
        ))];
    }
    flow.phase = FlowPhase::Completed;
    flow.status = JobStatus::Completed;
    flow.raise_progress(100);
    let message = format!(
        "Content extracted: {} concepts from {}",
        document.concepts.len(),
        flow.url
    );
    state.mark_dirty();
    vec![
        Effect::WriteCache { flow_id, document },
        Effect::Notify(Notification::success(message)),
    ]
}

fn poll_failed(state: &mut AppState, flow_id: FlowId, failure: &RequestFailure) -> Vec<Effect> {
    let policy = state.policy().clone();
    let Some(flow) = state.flow_in_phase(flow_id, FlowPhase::Polling) else {
        return ignored(flow_id, "PollFailed");
    };
    flow.error_streak = flow.error_streak.saturating_add(1);
    study_warn!(
        "Status check {} for flow {} failed ({} in a row): {}",
        flow.attempts,
        flow_id,
        flow.error_streak,
        failure
    );
    let mut effects = Vec::with_capacity(1);
    schedule_next_poll(flow_id, flow, &policy, &mut effects);
    state.mark_dirty();
    effects
}

/// Schedules the next status read, or times the flow out once the policy's
/// attempt budget is spent.
fn schedule_next_poll(
    flow_id: FlowId,
    flow: &mut ExtractionFlow,
    policy: &PollPolicy,
    effects: &mut Vec<Effect>,
) {
    let Some(job_id) = flow.job_id.clone() else {
        flow.fail("no job to poll");
        return;
    };
    if flow.attempts >= policy.max_attempts {
        flow.phase = FlowPhase::TimedOut;
        flow.status = JobStatus::TimedOut;
        flow.error = Some(format!("gave up after {} status checks", flow.attempts));
        effects.push(Effect::ReportProgress {
            flow_id,
            status: JobStatus::TimedOut,
            progress: flow.progress,
        });
        effects.push(Effect::Notify(Notification::error(format!(
            "Extraction timed out after {} status checks. Please try again later.",
            flow.attempts
        ))));
        return;
    }
    flow.attempts += 1;
    effects.push(Effect::SchedulePoll {
        flow_id,
        job_id,
        delay: policy.delay_for(flow.error_streak),
        attempt: flow.attempts,
    });
}

fn ignored(flow_id: FlowId, what: &str) -> Vec<Effect> {
    study_debug!("Ignoring {} for inactive flow {}", what, flow_id);
    Vec::new()
}
