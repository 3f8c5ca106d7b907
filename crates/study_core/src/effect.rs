use std::time::Duration;

use crate::{CourseFlag, ExtractedDocument, FlowId, JobStatus, Notification};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// POST the URL to the extraction endpoint.
    SubmitExtraction { flow_id: FlowId, url: String },
    /// Wait `delay`, then read the job status once.
    SchedulePoll {
        flow_id: FlowId,
        job_id: String,
        delay: Duration,
        attempt: u32,
    },
    /// Drop any pending scheduled poll for the flow.
    CancelPoll { flow_id: FlowId },
    ReportProgress {
        flow_id: FlowId,
        status: JobStatus,
        progress: u8,
    },
    FetchDocument {
        flow_id: FlowId,
        document_id: String,
    },
    WriteCache {
        flow_id: FlowId,
        document: ExtractedDocument,
    },
    PatchCourseStatus {
        id: String,
        flag: CourseFlag,
        value: bool,
    },
    DeleteCourse { id: String },
    Notify(Notification),
}
