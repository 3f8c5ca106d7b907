use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use study_core::{
    ChatReply, CourseEntry, CourseFlag, ExtractedDocument, JobSnapshot, QuizQuestion, SearchMethod,
    SubmitReply,
};
use study_logging::{study_debug, study_info};
use url::Url;

use crate::error::{error_detail, map_reqwest_error};
use crate::types::{
    ChatRequest, ChatResponse, ConceptDetail, ConceptDetailRequest, DocumentRecord, ExtractRequest, JobStatusResponse, NotesRequest,
    NotesResponse, QuizRequest, QuizResponse, QuizResultRequest, StudyNotes, SubmitResponse,
    UserStats,
};
use crate::{ApiError, AuthPolicy, TokenProvider};

const CONCEPT_CONTEXT_CHUNKS: u32 = 5;

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub auth_policy: AuthPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            connect_timeout: Duration::from_secs(10),
            // Generation endpoints routinely take tens of seconds.
            request_timeout: Duration::from_secs(120),
            auth_policy: AuthPolicy::default(),
        }
    }
}

/// The three backend calls an extraction flow needs.
#[async_trait]
pub trait ExtractionApi: Send + Sync {
    async fn submit_extraction(&self, url: &str) -> Result<SubmitReply, ApiError>;
    async fn job_status(&self, job_id: &str) -> Result<JobSnapshot, ApiError>;
    async fn document(&self, document_id: &str) -> Result<ExtractedDocument, ApiError>;
}

/// One question for the advanced chat endpoint.
#[derive(Debug, Clone, Copy)]
pub struct ChatQuery<'a> {
    pub question: &'a str,
    pub session_id: &'a str,
    pub search_method: SearchMethod,
    pub use_memory: bool,
    pub top_k: u8,
    pub document_id: Option<&'a str>,
}

/// HTTP client for the study backend. Every request carries the current
/// identity token when one is available.
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    tokens: Arc<dyn TokenProvider>,
    auth_policy: AuthPolicy,
}

impl ApiClient {
    pub fn new(settings: &ClientSettings, tokens: Arc<dyn TokenProvider>) -> Result<Self, ApiError> {
        let base = Url::parse(settings.base_url.trim())
            .map_err(|err| ApiError::InvalidUrl(format!("{}: {err}", settings.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(settings.base_url.clone()));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;
        Ok(Self {
            http,
            base,
            tokens,
            auth_policy: settings.auth_policy,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let request = match self.tokens.token().await {
            Some(token) => request.bearer_auth(token),
            None if self.auth_policy == AuthPolicy::Block => return Err(ApiError::Unauthenticated),
            None => {
                study_debug!("No identity token; sending request without authorization");
                request
            }
        };

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = error_detail(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized { detail });
        }
        Err(ApiError::Status {
            status: status.as_u16(),
            detail,
        })
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.url(segments)?;
        study_debug!("GET {}", url);
        let response = self.execute(self.http.get(url)).await?;
        Self::decode(response).await
    }

    async fn send_json<B, T>(
        &self,
        method: reqwest::Method,
        segments: &[&str],
        body: &B,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(segments)?;
        study_debug!("{} {}", method, url);
        let response = self
            .execute(self.http.request(method, url).json(body))
            .await?;
        Self::decode(response).await
    }

    /// Sends a request whose reply body is not needed.
    async fn send_discarding(&self, request: reqwest::RequestBuilder) -> Result<(), ApiError> {
        self.execute(request).await.map(|_| ())
    }

    pub async fn library(&self) -> Result<Vec<CourseEntry>, ApiError> {
        let records: Vec<DocumentRecord> = self.get_json(&["library"]).await?;
        Ok(records.into_iter().map(DocumentRecord::into_course).collect())
    }

    pub async fn document_record(&self, document_id: &str) -> Result<DocumentRecord, ApiError> {
        self.get_json(&["library", document_id]).await
    }

    pub async fn delete_document(&self, document_id: &str) -> Result<(), ApiError> {
        let url = self.url(&["library", document_id])?;
        self.send_discarding(self.http.delete(url)).await
    }

    pub async fn update_course_status(
        &self,
        document_id: &str,
        flag: CourseFlag,
        value: bool,
    ) -> Result<(), ApiError> {
        let url = self.url(&["library", document_id, "status"])?;
        let mut body = serde_json::Map::new();
        body.insert(flag.field_name().to_string(), serde_json::Value::Bool(value));
        self.send_discarding(self.http.patch(url).json(&body)).await
    }

    /// Drops everything the backend indexed for retrieval.
    pub async fn clear_store(&self) -> Result<(), ApiError> {
        let url = self.url(&["clear-store"])?;
        self.send_discarding(self.http.delete(url)).await
    }

    pub async fn generate_notes(
        &self,
        topic: &str,
        document_id: Option<&str>,
    ) -> Result<StudyNotes, ApiError> {
        let request = NotesRequest {
            topic,
            use_stored_content: true,
            document_id,
        };
        let response: NotesResponse = self
            .send_json(reqwest::Method::POST, &["notes", "generate"], &request)
            .await?;
        Ok(response.notes)
    }

    /// Explains one concept from the indexed content.
    pub async fn concept_detail(&self, concept: &str) -> Result<ConceptDetail, ApiError> {
        let request = ConceptDetailRequest {
            concept,
            top_k: CONCEPT_CONTEXT_CHUNKS,
        };
        self.send_json(reqwest::Method::POST, &["concept-detail"], &request)
            .await
    }

    pub async fn generate_quiz(
        &self,
        count: u32,
        topics: &[String],
        document_id: Option<&str>,
    ) -> Result<Vec<QuizQuestion>, ApiError> {
        let request = QuizRequest {
            count,
            topics,
            document_id,
        };
        let response: QuizResponse = self
            .send_json(reqwest::Method::POST, &["quiz", "generate"], &request)
            .await?;
        Ok(response.questions.into_iter().map(QuizQuestion::from).collect())
    }

    pub async fn submit_quiz_result(
        &self,
        score: usize,
        total: usize,
        topics: &[String],
        document_id: Option<&str>,
    ) -> Result<(), ApiError> {
        let url = self.url(&["quiz", "result"])?;
        let request = QuizResultRequest {
            score,
            total,
            topics,
            document_id,
        };
        self.send_discarding(self.http.post(url).json(&request)).await
    }

    pub async fn chat_advanced(&self, query: ChatQuery<'_>) -> Result<ChatReply, ApiError> {
        let request = ChatRequest {
            question: query.question,
            session_id: query.session_id,
            search_method: query.search_method.as_str(),
            use_memory: query.use_memory,
            top_k: query.top_k,
            document_id: query.document_id,
        };
        let response: ChatResponse = self
            .send_json(reqwest::Method::POST, &["chat", "advanced"], &request)
            .await?;
        Ok(response.into())
    }

    pub async fn delete_chat_session(&self, session_id: &str) -> Result<(), ApiError> {
        let url = self.url(&["chat", "session", session_id])?;
        self.send_discarding(self.http.delete(url)).await
    }

    pub async fn me(&self) -> Result<UserStats, ApiError> {
        self.get_json(&["auth", "me"]).await
    }

    /// Wakes a backend that may be sleeping on a free hosting tier.
    pub async fn warmup(&self) -> Result<(), ApiError> {
        let url = self.url(&["warmup"])?;
        self.send_discarding(self.http.get(url)).await
    }
}

#[async_trait]
impl ExtractionApi for ApiClient {
    async fn submit_extraction(&self, url: &str) -> Result<SubmitReply, ApiError> {
        study_info!("Submitting {} for extraction", url);
        let response: SubmitResponse = self
            .send_json(reqwest::Method::POST, &["extract"], &ExtractRequest { url })
            .await?;
        response.into_reply()
    }

    async fn job_status(&self, job_id: &str) -> Result<JobSnapshot, ApiError> {
        let response: JobStatusResponse = self.get_json(&["extract", "status", job_id]).await?;
        Ok(response.into())
    }

    async fn document(&self, document_id: &str) -> Result<ExtractedDocument, ApiError> {
        Ok(self.document_record(document_id).await?.into_extracted())
    }
}
