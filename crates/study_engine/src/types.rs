//! Wire shapes of the backend API and their conversion into core types.
//!
//! The backend is loosely typed in places (concepts, progress, ids); every
//! such field is resolved here so nothing past this module has to sniff
//! shapes again.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use study_core::{
    ChatReply, Concept, CourseEntry, ExtractedDocument, JobSnapshot, JobStatus, QuizQuestion,
    SearchScore, SubmitReply,
};

use crate::ApiError;

/// A concept as the backend sends it: a bare label or a loose record.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawConcept {
    Label(String),
    Record {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Other(serde_json::Value),
}

impl RawConcept {
    pub fn into_concept(self) -> Option<Concept> {
        match self {
            RawConcept::Label(label) => Concept::from_label(&label),
            RawConcept::Record {
                title,
                name,
                description,
            } => Concept::from_fields(title.as_deref(), name.as_deref(), description.as_deref()),
            RawConcept::Other(_) => None,
        }
    }
}

impl From<&Concept> for RawConcept {
    fn from(concept: &Concept) -> Self {
        RawConcept::Record {
            title: Some(concept.title.clone()),
            name: None,
            description: concept.description.clone(),
        }
    }
}

/// Resolves a loosely typed concept list, dropping entries without a title.
pub fn normalize_concepts(raw: Vec<RawConcept>) -> Vec<Concept> {
    raw.into_iter().filter_map(RawConcept::into_concept).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractRequest<'a> {
    pub url: &'a str,
}

/// Reply of `POST /extract`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SubmitResponse {
    pub fn into_reply(self) -> Result<SubmitReply, ApiError> {
        let already = self.status.as_deref() == Some("already_extracted");
        match (self.job_id, self.document_id) {
            (_, Some(document_id)) if already => Ok(SubmitReply::AlreadyExtracted { document_id }),
            (Some(job_id), _) => Ok(SubmitReply::Queued { job_id }),
            (None, Some(document_id)) => Ok(SubmitReply::AlreadyExtracted { document_id }),
            (None, None) => Err(ApiError::Decode(
                "extract reply carried neither job_id nor document_id".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireJobStatus {
    #[serde(alias = "pending")]
    Queued,
    #[serde(alias = "running")]
    Processing,
    Completed,
    Failed,
    /// Anything newer than this client knows about; treated as still running.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobResult {
    #[serde(default)]
    pub document_id: Option<String>,
}

/// Reply of `GET /extract/status/{job_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusResponse {
    pub status: WireJobStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub result: Option<JobResult>,
    #[serde(default)]
    pub error: Option<String>,
}

impl From<JobStatusResponse> for JobSnapshot {
    fn from(response: JobStatusResponse) -> Self {
        let status = match response.status {
            WireJobStatus::Queued => JobStatus::Queued,
            WireJobStatus::Processing | WireJobStatus::Unknown => JobStatus::Processing,
            WireJobStatus::Completed => JobStatus::Completed,
            WireJobStatus::Failed => JobStatus::Failed,
        };
        let progress = response
            .progress
            .filter(|value| value.is_finite())
            .map_or(0, |value| value.round().clamp(0.0, 100.0) as u8);
        JobSnapshot {
            status,
            progress,
            document_id: response.result.and_then(|result| result.document_id),
            error: response.error,
        }
    }
}

/// A library document, as returned by `GET /library` and `GET /library/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentRecord {
    #[serde(alias = "_id", alias = "document_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub concepts: Vec<RawConcept>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default, alias = "full_length")]
    pub text_length: Option<u64>,
    #[serde(default)]
    pub chunks_indexed: Option<u32>,
}

impl DocumentRecord {
    pub fn into_course(self) -> CourseEntry {
        CourseEntry {
            id: self.id,
            title: self
                .title
                .unwrap_or_else(|| "Untitled Document".to_string()),
            url: self.url,
            created_at: self.created_at,
            summary: self.summary.filter(|summary| !summary.is_empty()),
            concepts: normalize_concepts(self.concepts)
                .into_iter()
                .map(|concept| concept.title)
                .collect(),
            is_favorite: self.is_favorite,
            is_archived: self.is_archived,
        }
    }

    pub fn into_extracted(self) -> ExtractedDocument {
        ExtractedDocument {
            document_id: self.id,
            url: self.url,
            title: self.title,
            summary: self.summary.filter(|summary| !summary.is_empty()),
            text_length: self.text_length.unwrap_or_default(),
            chunks_indexed: self.chunks_indexed.unwrap_or_default(),
            concepts: normalize_concepts(self.concepts),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotesRequest<'a> {
    pub topic: &'a str,
    pub use_stored_content: bool,
    pub document_id: Option<&'a str>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Flashcard {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StudyNotes {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default, deserialize_with = "definitions")]
    pub definitions: BTreeMap<String, String>,
    #[serde(default)]
    pub flashcards: Vec<Flashcard>,
    #[serde(default)]
    pub mind_map: serde_json::Value,
    /// Minutes.
    #[serde(default)]
    pub estimated_study_time: Option<u32>,
    #[serde(default)]
    pub difficulty_level: Option<String>,
}

/// Definitions arrive either keyed by term or as a list of loose records.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDefinitions {
    Map(BTreeMap<String, String>),
    List(Vec<RawDefinition>),
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct RawDefinition {
    #[serde(default)]
    term: Option<String>,
    #[serde(default)]
    word: Option<String>,
    #[serde(default)]
    definition: Option<String>,
    #[serde(default)]
    meaning: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn definitions<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let definitions = match RawDefinitions::deserialize(deserializer)? {
        RawDefinitions::Map(map) => map,
        RawDefinitions::List(items) => items
            .into_iter()
            .filter_map(|item| {
                let term = non_empty(item.term).or_else(|| non_empty(item.word))?;
                let definition = non_empty(item.definition)
                    .or_else(|| non_empty(item.meaning))
                    .unwrap_or_default();
                Some((term, definition))
            })
            .collect(),
        RawDefinitions::Other(_) => BTreeMap::new(),
    };
    Ok(definitions)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotesResponse {
    pub notes: StudyNotes,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConceptDetailRequest<'a> {
    pub concept: &'a str,
    pub top_k: u32,
}

/// Reply of `POST /concept-detail`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConceptDetail {
    #[serde(default)]
    pub concept: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub sources_used: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizRequest<'a> {
    pub count: u32,
    pub topics: &'a [String],
    pub document_id: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireQuestion {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl From<WireQuestion> for QuizQuestion {
    fn from(wire: WireQuestion) -> Self {
        QuizQuestion {
            question: wire.question,
            options: wire.options,
            answer: wire.answer,
            explanation: wire.explanation,
            difficulty: wire.difficulty,
            kind: wire.kind,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizResponse {
    #[serde(default)]
    pub questions: Vec<WireQuestion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizResultRequest<'a> {
    pub score: usize,
    pub total: usize,
    pub topics: &'a [String],
    pub document_id: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub question: &'a str,
    pub session_id: &'a str,
    pub search_method: &'a str,
    pub use_memory: bool,
    pub top_k: u8,
    pub document_id: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireSearchScore {
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(default)]
    pub sources_used: u32,
    #[serde(default)]
    pub search_scores: Vec<WireSearchScore>,
    #[serde(default)]
    pub query_enhanced: bool,
}

impl From<ChatResponse> for ChatReply {
    fn from(response: ChatResponse) -> Self {
        ChatReply {
            answer: response.answer,
            sources_used: response.sources_used,
            search_scores: response
                .search_scores
                .into_iter()
                .map(|score| SearchScore {
                    score: score.score,
                    source: score.source,
                })
                .collect(),
            query_enhanced: response.query_enhanced,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Activity {
    #[serde(default)]
    pub action_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Reply of `GET /auth/me`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserStats {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub credits: i64,
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub days_until_reset: i64,
    #[serde(default)]
    pub usage: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub quiz_average: f64,
    #[serde(default)]
    pub recent_activity: Vec<Activity>,
}
