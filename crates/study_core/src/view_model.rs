use crate::{FlowId, FlowPhase, JobStatus};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub flows: Vec<FlowView>,
    pub course_count: usize,
    pub active_course_count: usize,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowView {
    pub flow_id: FlowId,
    pub url: String,
    pub phase: FlowPhase,
    pub status: JobStatus,
    pub progress: u8,
    pub error: Option<String>,
}
