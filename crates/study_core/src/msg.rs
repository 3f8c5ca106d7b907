use crate::{CourseEntry, CourseFlag, ExtractedDocument, FlowId, RequestFailure};

/// Status of a backend extraction job, plus the client-side `TimedOut`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Queued,
    Processing,
    Completed,
    Failed,
    /// Never sent by the backend; reached when the poll budget runs out.
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::TimedOut
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed_out",
        }
    }
}

/// One status read of an extraction job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub progress: u8,
    pub document_id: Option<String>,
    pub error: Option<String>,
}

/// What the extraction endpoint answered to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitReply {
    /// The URL was processed before; the document can be fetched right away.
    AlreadyExtracted { document_id: String },
    /// Extraction runs asynchronously under this job id.
    Queued { job_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User asked to extract a URL.
    ExtractRequested { url: String },
    SubmitAccepted {
        flow_id: FlowId,
        reply: SubmitReply,
    },
    SubmitFailed {
        flow_id: FlowId,
        failure: RequestFailure,
    },
    /// A status read for the flow's job succeeded.
    JobPolled {
        flow_id: FlowId,
        snapshot: JobSnapshot,
    },
    /// A status read failed in transport; retried under the poll policy.
    PollFailed {
        flow_id: FlowId,
        failure: RequestFailure,
    },
    DocumentFetched {
        flow_id: FlowId,
        document: ExtractedDocument,
    },
    DocumentFetchFailed {
        flow_id: FlowId,
        failure: RequestFailure,
    },
    CancelRequested { flow_id: FlowId },
    /// The consuming view went away; every live flow is cancelled.
    ViewClosed,
    LibraryLoaded(Vec<CourseEntry>),
    LibraryLoadFailed(RequestFailure),
    ToggleRequested { id: String, flag: CourseFlag },
    ToggleSucceeded { id: String, flag: CourseFlag },
    ToggleFailed {
        id: String,
        flag: CourseFlag,
        failure: RequestFailure,
    },
    DeleteRequested { id: String },
    CourseDeleted { id: String },
    DeleteFailed {
        id: String,
        failure: RequestFailure,
    },
}
