use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use study_core::{
    update, AppState, Effect, ExtractedDocument, FlowId, FlowPhase, JobStatus, Msg, Notification,
    NotifyLevel, PollPolicy,
};
use study_logging::{study_debug, study_error, study_info};
use tokio_util::sync::CancellationToken;

use crate::{ContentCache, ExtractionApi};

/// Something the driver reports while a flow runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionEvent {
    Submitted {
        flow_id: FlowId,
        url: String,
    },
    Progress {
        flow_id: FlowId,
        status: JobStatus,
        progress: u8,
    },
    PollScheduled {
        flow_id: FlowId,
        attempt: u32,
        delay: Duration,
    },
    Notice(Notification),
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ExtractionEvent);
}

/// Forwards events to a receiver that may outlive the flow. Events sent after
/// the receiver is dropped are discarded.
pub struct ChannelProgressSink {
    tx: tokio::sync::mpsc::UnboundedSender<ExtractionEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<ExtractionEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: ExtractionEvent) {
        let _ = self.tx.send(event);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Completed(ExtractedDocument),
    Failed(String),
    TimedOut { attempts: u32 },
    Cancelled,
    /// The URL never reached the backend.
    Rejected(String),
}

/// Runs extraction flows against the backend, one at a time, and stores the
/// resulting document in the content cache.
pub struct ExtractionDriver {
    api: Arc<dyn ExtractionApi>,
    cache: ContentCache,
    state: AppState,
    cancel: CancellationToken,
}

impl ExtractionDriver {
    pub fn new(api: Arc<dyn ExtractionApi>, cache: ContentCache, policy: PollPolicy) -> Self {
        Self {
            api,
            cache,
            state: AppState::with_policy(policy),
            cancel: CancellationToken::new(),
        }
    }

    /// Cancelling this token abandons the running flow at its next await and
    /// stops all further polling.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn extract(&mut self, url: &str, sink: &dyn ProgressSink) -> ExtractionOutcome {
        let mut queue = VecDeque::from([Msg::ExtractRequested {
            url: url.to_string(),
        }]);
        let mut flow_id = None;
        let mut rejection = None;
        let mut completed = None;
        let mut save_error = None;

        while let Some(msg) = queue.pop_front() {
            let (state, effects) = update(std::mem::take(&mut self.state), msg);
            self.state = state;

            for effect in effects {
                match effect {
                    Effect::SubmitExtraction { flow_id: id, url } => {
                        flow_id = Some(id);
                        sink.emit(ExtractionEvent::Submitted {
                            flow_id: id,
                            url: url.clone(),
                        });
                        queue.push_back(self.submit(id, &url).await);
                    }
                    Effect::SchedulePoll {
                        flow_id,
                        job_id,
                        delay,
                        attempt,
                    } => {
                        sink.emit(ExtractionEvent::PollScheduled {
                            flow_id,
                            attempt,
                            delay,
                        });
                        queue.push_back(self.poll(flow_id, &job_id, delay, attempt).await);
                    }
                    Effect::CancelPoll { flow_id } => {
                        // Polls run inline, so abandoning the await already dropped it.
                        study_debug!("Polling stopped for flow {}", flow_id);
                    }
                    Effect::ReportProgress {
                        flow_id,
                        status,
                        progress,
                    } => sink.emit(ExtractionEvent::Progress {
                        flow_id,
                        status,
                        progress,
                    }),
                    Effect::FetchDocument {
                        flow_id,
                        document_id,
                    } => queue.push_back(self.fetch_document(flow_id, &document_id).await),
                    Effect::WriteCache { document, .. } => {
                        match self.cache.write_document(&document) {
                            Ok(()) => completed = Some(document),
                            Err(err) => {
                                study_error!(
                                    "Failed to cache document {}: {}",
                                    document.document_id,
                                    err
                                );
                                let message =
                                    format!("Extracted content could not be saved locally: {err}");
                                sink.emit(ExtractionEvent::Notice(Notification::error(
                                    message.clone(),
                                )));
                                save_error = Some(message);
                            }
                        }
                    }
                    Effect::Notify(notification) => {
                        if save_error.is_some() && notification.level == NotifyLevel::Success {
                            study_debug!(
                                "Dropping notice for unsaved document: {}",
                                notification.message
                            );
                            continue;
                        }
                        if flow_id.is_none() && notification.level == NotifyLevel::Error {
                            rejection = Some(notification.message.clone());
                        }
                        sink.emit(ExtractionEvent::Notice(notification));
                    }
                    Effect::PatchCourseStatus { .. } | Effect::DeleteCourse { .. } => {
                        study_debug!("Library effect ignored by the extraction driver");
                    }
                }
            }
        }

        let Some(flow) = flow_id.and_then(|id| self.state.flow(id)) else {
            return ExtractionOutcome::Rejected(
                rejection.unwrap_or_else(|| "URL rejected".to_string()),
            );
        };
        match flow.phase {
            FlowPhase::Completed => match (completed, save_error) {
                (Some(document), _) => ExtractionOutcome::Completed(document),
                (None, Some(message)) => ExtractionOutcome::Failed(message),
                (None, None) => {
                    ExtractionOutcome::Failed("document missing after completion".to_string())
                }
            },
            FlowPhase::TimedOut => ExtractionOutcome::TimedOut {
                attempts: flow.attempts,
            },
            FlowPhase::Cancelled => ExtractionOutcome::Cancelled,
            FlowPhase::Failed => ExtractionOutcome::Failed(
                flow.error
                    .clone()
                    .unwrap_or_else(|| "Extraction failed".to_string()),
            ),
            FlowPhase::Submitting | FlowPhase::Polling | FlowPhase::FetchingDocument => {
                ExtractionOutcome::Failed("flow stopped before finishing".to_string())
            }
        }
    }

    async fn submit(&self, flow_id: FlowId, url: &str) -> Msg {
        tokio::select! {
            _ = self.cancel.cancelled() => Msg::ViewClosed,
            result = self.api.submit_extraction(url) => match result {
                Ok(reply) => Msg::SubmitAccepted { flow_id, reply },
                Err(err) => Msg::SubmitFailed { flow_id, failure: err.failure() },
            },
        }
    }

    async fn poll(&self, flow_id: FlowId, job_id: &str, delay: Duration, attempt: u32) -> Msg {
        tokio::select! {
            _ = self.cancel.cancelled() => return Msg::ViewClosed,
            _ = tokio::time::sleep(delay) => {}
        }
        study_debug!("Status check {} for job {}", attempt, job_id);
        tokio::select! {
            _ = self.cancel.cancelled() => Msg::ViewClosed,
            result = self.api.job_status(job_id) => match result {
                Ok(snapshot) => Msg::JobPolled { flow_id, snapshot },
                Err(err) => Msg::PollFailed { flow_id, failure: err.failure() },
            },
        }
    }

    async fn fetch_document(&self, flow_id: FlowId, document_id: &str) -> Msg {
        study_info!("Loading extracted document {}", document_id);
        tokio::select! {
            _ = self.cancel.cancelled() => Msg::ViewClosed,
            result = self.api.document(document_id) => match result {
                Ok(document) => Msg::DocumentFetched { flow_id, document },
                Err(err) => Msg::DocumentFetchFailed { flow_id, failure: err.failure() },
            },
        }
    }
}
