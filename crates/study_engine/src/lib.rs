//! Study engine: backend client, local storage and effect execution.
mod auth;
mod cache;
mod chat;
mod client;
mod driver;
mod error;
mod library;
mod store;
mod types;

pub use auth::{
    AuthHandle, AuthPolicy, AuthState, SessionTokenProvider, StaticTokenProvider, TokenProvider,
};
pub use cache::{
    ContentCache, CHAT_SESSION_KEY, CONCEPTS_KEY, DOCUMENT_ID_KEY, INFO_KEY,
    LEARN_EXPLANATIONS_KEY, URL_KEY,
};
pub use chat::{
    chat_failure_notice, default_session_id, ChatOptions, ChatService, SessionIdSource,
    CHAT_FAILURE_MESSAGE,
};
pub use client::{ApiClient, ChatQuery, ClientSettings, ExtractionApi};
pub use driver::{
    ChannelProgressSink, ExtractionDriver, ExtractionEvent, ExtractionOutcome, ProgressSink,
};
pub use error::ApiError;
pub use library::LibraryController;
pub use store::{ensure_dir, write_atomically, FileStore, KvStore, MemoryStore, StoreError};
pub use types::{
    normalize_concepts, Activity, ConceptDetail, DocumentRecord, Flashcard, RawConcept,
    StudyNotes, UserStats,
};
