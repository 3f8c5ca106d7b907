//! Study core: pure state machine and view-model helpers.
//!
//! Nothing in this crate performs IO. [`update`] applies a [`Msg`] to an
//! [`AppState`] and returns the [`Effect`]s the caller must perform; the
//! results of those effects come back in as further messages.
mod chat;
mod concept;
mod effect;
mod library;
mod msg;
mod notify;
mod poll_policy;
mod quiz;
mod state;
mod update;
mod view_model;

pub use chat::{
    ChatMessage, ChatReply, ChatRole, ChatSession, SearchMethod, SearchScore, CHAT_ERROR_REPLY,
};
pub use concept::{Concept, ExtractedDocument};
pub use effect::Effect;
pub use library::{filter_courses, CourseEntry, CourseFlag, LibraryTab};
pub use msg::{JobSnapshot, JobStatus, Msg, SubmitReply};
pub use notify::{FailureKind, Notification, NotifyLevel, RequestFailure, RATE_LIMIT_MESSAGE};
pub use poll_policy::PollPolicy;
pub use quiz::{answer_index, QuizAttempt, QuizFeedback, QuizGrade, QuizQuestion};
pub use state::{validate_extraction_url, AppState, ExtractionFlow, FlowId, FlowPhase};
pub use update::update;
pub use view_model::{AppViewModel, FlowView};
