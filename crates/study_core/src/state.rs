use std::collections::BTreeMap;

use crate::view_model::{AppViewModel, FlowView};
use crate::{CourseEntry, CourseFlag, JobStatus, PollPolicy};

pub type FlowId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPhase {
    Submitting,
    Polling,
    FetchingDocument,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl FlowPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FlowPhase::Completed | FlowPhase::Failed | FlowPhase::TimedOut | FlowPhase::Cancelled
        )
    }
}

/// One URL submission, from the POST until a terminal phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionFlow {
    pub url: String,
    pub phase: FlowPhase,
    pub job_id: Option<String>,
    pub document_id: Option<String>,
    pub status: JobStatus,
    /// Never decreases over the life of the flow.
    pub progress: u8,
    /// Status reads scheduled so far.
    pub attempts: u32,
    /// Consecutive failed status reads.
    pub error_streak: u32,
    pub error: Option<String>,
}

impl ExtractionFlow {
    fn new(url: String) -> Self {
        Self {
            url,
            phase: FlowPhase::Submitting,
            job_id: None,
            document_id: None,
            status: JobStatus::Queued,
            progress: 0,
            attempts: 0,
            error_streak: 0,
            error: None,
        }
    }

    /// Raises progress to `reported` (clamped to 100); lower values are ignored.
    pub(crate) fn raise_progress(&mut self, reported: u8) {
        self.progress = self.progress.max(reported.min(100));
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.phase = FlowPhase::Failed;
        self.status = JobStatus::Failed;
        self.error = Some(message.into());
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    policy: PollPolicy,
    next_flow_id: FlowId,
    flows: BTreeMap<FlowId, ExtractionFlow>,
    courses: Vec<CourseEntry>,
    /// Course list as it was before each in-flight toggle.
    toggle_snapshots: BTreeMap<(String, CourseFlag), Vec<CourseEntry>>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: PollPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn flow(&self, flow_id: FlowId) -> Option<&ExtractionFlow> {
        self.flows.get(&flow_id)
    }

    pub fn courses(&self) -> &[CourseEntry] {
        &self.courses
    }

    pub fn has_pending_toggles(&self) -> bool {
        !self.toggle_snapshots.is_empty()
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            flows: self
                .flows
                .iter()
                .map(|(flow_id, flow)| FlowView {
                    flow_id: *flow_id,
                    url: flow.url.clone(),
                    phase: flow.phase,
                    status: flow.status,
                    progress: flow.progress,
                    error: flow.error.clone(),
                })
                .collect(),
            course_count: self.courses.len(),
            active_course_count: self.courses.iter().filter(|c| !c.is_archived).count(),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn start_flow(&mut self, url: String) -> FlowId {
        self.next_flow_id += 1;
        let flow_id = self.next_flow_id;
        self.flows.insert(flow_id, ExtractionFlow::new(url));
        self.mark_dirty();
        flow_id
    }

    /// The flow, only while it is still in `phase`.
    pub(crate) fn flow_in_phase(
        &mut self,
        flow_id: FlowId,
        phase: FlowPhase,
    ) -> Option<&mut ExtractionFlow> {
        self.flows
            .get_mut(&flow_id)
            .filter(|flow| flow.phase == phase)
    }

    pub(crate) fn live_flow(&mut self, flow_id: FlowId) -> Option<&mut ExtractionFlow> {
        self.flows
            .get_mut(&flow_id)
            .filter(|flow| !flow.phase.is_terminal())
    }

    pub(crate) fn live_flow_ids(&self) -> Vec<FlowId> {
        self.flows
            .iter()
            .filter(|(_, flow)| !flow.phase.is_terminal())
            .map(|(flow_id, _)| *flow_id)
            .collect()
    }

    pub(crate) fn set_courses(&mut self, courses: Vec<CourseEntry>) {
        self.courses = courses;
        self.toggle_snapshots.clear();
        self.mark_dirty();
    }

    /// Flips `flag` on course `id`, remembering the list for rollback.
    /// Returns the new flag value, or `None` for an unknown course.
    pub(crate) fn toggle_optimistically(&mut self, id: &str, flag: CourseFlag) -> Option<bool> {
        let before = self.courses.clone();
        let course = self.courses.iter_mut().find(|course| course.id == id)?;
        let value = !flag.get(course);
        flag.set(course, value);
        self.toggle_snapshots
            .entry((id.to_string(), flag))
            .or_insert(before);
        self.mark_dirty();
        Some(value)
    }

    pub(crate) fn settle_toggle(&mut self, id: &str, flag: CourseFlag) {
        self.toggle_snapshots.remove(&(id.to_string(), flag));
    }

    /// Restores the list captured when the toggle was requested. Snapshots of
    /// other pending toggles stay until those toggles settle.
    pub(crate) fn revert_toggle(&mut self, id: &str, flag: CourseFlag) -> bool {
        let Some(before) = self.toggle_snapshots.remove(&(id.to_string(), flag)) else {
            return false;
        };
        self.courses = before;
        self.mark_dirty();
        true
    }

    pub(crate) fn remove_course(&mut self, id: &str) -> bool {
        let before = self.courses.len();
        self.courses.retain(|course| course.id != id);
        let removed = self.courses.len() != before;
        if removed {
            self.toggle_snapshots.retain(|(course_id, _), _| course_id != id);
            self.mark_dirty();
        }
        removed
    }
}

/// Trims and checks that `raw` is an absolute http(s) URL with a host.
pub fn validate_extraction_url(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("url is required".to_string());
    }
    let parsed = url::Url::parse(trimmed).map_err(|err| format!("invalid url: {err}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err("URL must use http or https scheme".to_string());
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err("Invalid hostname".to_string());
    }
    Ok(trimmed.to_string())
}
