/// Retrieval method selector passed through to the chat endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMethod {
    #[default]
    Hybrid,
    Bm25,
    Tfidf,
    Rrf,
}

impl SearchMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMethod::Hybrid => "hybrid",
            SearchMethod::Bm25 => "bm25",
            SearchMethod::Tfidf => "tfidf",
            SearchMethod::Rrf => "rrf",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SearchMethod::Hybrid => "Balanced",
            SearchMethod::Bm25 => "Context Search",
            SearchMethod::Tfidf => "Keyword Match",
            SearchMethod::Rrf => "Most Accurate",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            SearchMethod::Hybrid => "Best for most questions",
            SearchMethod::Bm25 => "Understands context better",
            SearchMethod::Tfidf => "Fast keyword-based search",
            SearchMethod::Rrf => "Combines multiple methods",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchScore {
    pub score: f64,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    pub sources: Option<u32>,
    pub enhanced: Option<bool>,
    pub search_scores: Vec<SearchScore>,
}

impl ChatMessage {
    fn plain(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            sources: None,
            enhanced: None,
            search_scores: Vec::new(),
        }
    }
}

/// Answer returned by the chat endpoint.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatReply {
    pub answer: String,
    pub sources_used: u32,
    pub search_scores: Vec<SearchScore>,
    pub query_enhanced: bool,
}

pub const CHAT_ERROR_REPLY: &str =
    "Sorry, I couldn't process that. Make sure you've extracted content first.";

#[derive(Debug, Clone, PartialEq)]
pub struct ChatSession {
    session_id: String,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Points later questions at another backend session. The transcript
    /// shown so far stays.
    pub fn rebind(&mut self, session_id: impl Into<String>) {
        self.session_id = session_id.into();
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::plain(ChatRole::User, text));
    }

    pub fn push_reply(&mut self, reply: ChatReply) {
        self.messages.push(ChatMessage {
            role: ChatRole::Ai,
            text: reply.answer,
            sources: Some(reply.sources_used),
            enhanced: Some(reply.query_enhanced),
            search_scores: reply.search_scores,
        });
    }

    /// Appends the fallback AI message shown when a question could not be answered.
    pub fn push_error(&mut self) {
        self.messages
            .push(ChatMessage::plain(ChatRole::Ai, CHAT_ERROR_REPLY));
    }

    /// Empties the transcript and returns the session id to delete remotely.
    /// The id itself is kept.
    pub fn clear(&mut self) -> String {
        self.messages.clear();
        self.session_id.clone()
    }
}
