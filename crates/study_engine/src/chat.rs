use std::sync::Arc;

use study_core::{ChatSession, Notification, SearchMethod, RATE_LIMIT_MESSAGE};
use study_logging::{study_info, study_warn};

use crate::cache::CHAT_SESSION_KEY;
use crate::{ApiClient, ApiError, ChatQuery, KvStore};

/// Produces a fresh session id.
pub type SessionIdSource = Arc<dyn Fn() -> String + Send + Sync>;

pub const CHAT_FAILURE_MESSAGE: &str =
    "Failed to get response. Make sure you've extracted content first.";

pub fn default_session_id() -> String {
    format!("user_{}", chrono::Utc::now().timestamp_millis())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatOptions {
    pub search_method: SearchMethod,
    pub use_memory: bool,
    pub top_k: u8,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            search_method: SearchMethod::default(),
            use_memory: true,
            top_k: 4,
        }
    }
}

/// A chat conversation bound to the session id kept in the local store.
pub struct ChatService {
    api: Arc<ApiClient>,
    store: Arc<dyn KvStore>,
    session: ChatSession,
    new_id: SessionIdSource,
}

impl ChatService {
    pub fn open(api: Arc<ApiClient>, store: Arc<dyn KvStore>) -> Self {
        Self::with_id_source(api, store, Arc::new(default_session_id))
    }

    pub fn with_id_source(
        api: Arc<ApiClient>,
        store: Arc<dyn KvStore>,
        new_id: SessionIdSource,
    ) -> Self {
        let session_id = resolve_session_id(store.as_ref(), &new_id);
        Self {
            api,
            store,
            session: ChatSession::new(session_id),
            new_id,
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Sends one question. The transcript gains the user message and then
    /// either the reply or the fallback error message. Blank questions are
    /// ignored.
    pub async fn ask(
        &mut self,
        question: &str,
        options: ChatOptions,
        document_id: Option<&str>,
    ) -> Result<(), ApiError> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(());
        }
        self.ensure_session();
        self.session.push_user(question);

        let query = ChatQuery {
            question,
            session_id: self.session.session_id(),
            search_method: options.search_method,
            use_memory: options.use_memory,
            top_k: options.top_k,
            document_id,
        };
        let result = self.api.chat_advanced(query).await;
        match result {
            Ok(reply) => {
                self.session.push_reply(reply);
                Ok(())
            }
            Err(err) => {
                study_warn!("Chat request failed: {}", err);
                self.session.push_error();
                Err(err)
            }
        }
    }

    /// Empties the transcript and deletes the backend session. A failed
    /// delete is only logged.
    pub async fn clear(&mut self) -> Notification {
        let session_id = self.session.clear();
        if let Err(err) = self.api.delete_chat_session(&session_id).await {
            study_warn!("Failed to delete chat session {}: {}", session_id, err);
        }
        Notification::success("Chat cleared!")
    }

    /// Drops the stored session id; the next question starts a new one.
    pub fn forget_session(&mut self) {
        if let Err(err) = self.store.remove(CHAT_SESSION_KEY) {
            study_warn!("Failed to forget chat session: {}", err);
        }
    }

    fn ensure_session(&mut self) {
        match self.store.get(CHAT_SESSION_KEY) {
            Some(stored) if !stored.trim().is_empty() => {
                if stored != self.session.session_id() {
                    study_info!("Chat session changed to {}", stored);
                    self.session.rebind(stored);
                }
            }
            _ => {
                let fresh = (self.new_id)();
                persist_session_id(self.store.as_ref(), &fresh);
                self.session.rebind(fresh);
            }
        }
    }
}

/// The notification for a failed question.
pub fn chat_failure_notice(err: &ApiError) -> Notification {
    if err.is_rate_limited() {
        Notification::error(RATE_LIMIT_MESSAGE)
    } else {
        Notification::error(CHAT_FAILURE_MESSAGE)
    }
}

fn resolve_session_id(store: &dyn KvStore, new_id: &SessionIdSource) -> String {
    if let Some(stored) = store.get(CHAT_SESSION_KEY).filter(|id| !id.trim().is_empty()) {
        return stored;
    }
    let fresh = new_id();
    persist_session_id(store, &fresh);
    fresh
}

fn persist_session_id(store: &dyn KvStore, session_id: &str) {
    // The id still works for this process if it cannot be saved.
    if let Err(err) = store.set(CHAT_SESSION_KEY, session_id) {
        study_warn!("Failed to save chat session id: {}", err);
    }
}
