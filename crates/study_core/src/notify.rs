use std::fmt;

pub const RATE_LIMIT_MESSAGE: &str = "API rate limit reached! Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A user-facing message; the terminal counterpart of a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotifyLevel,
    pub message: String,
}

impl Notification {
    pub fn new(level: NotifyLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotifyLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotifyLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NotifyLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotifyLevel::Error, message)
    }

    /// Error notification for a failed request, prefixed with `context`.
    /// Rate-limited requests always get [`RATE_LIMIT_MESSAGE`].
    pub fn for_failure(context: &str, failure: &RequestFailure) -> Self {
        if failure.kind == FailureKind::RateLimited {
            return Self::error(RATE_LIMIT_MESSAGE);
        }
        Self::error(format!("{context}: {}", failure.message))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Timeout,
    /// The backend answered 401.
    Unauthorized,
    RateLimited,
    HttpStatus(u16),
    Decode,
    /// Blocked client-side because no identity token was available.
    Unauthenticated,
}

impl FailureKind {
    /// Whether retrying the same request later can plausibly succeed.
    pub fn is_transient(self) -> bool {
        match self {
            FailureKind::Network | FailureKind::Timeout => true,
            FailureKind::HttpStatus(code) => code >= 500,
            FailureKind::Unauthorized
            | FailureKind::RateLimited
            | FailureKind::Decode
            | FailureKind::Unauthenticated => false,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Unauthorized => write!(f, "unauthorized"),
            FailureKind::RateLimited => write!(f, "rate limited"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Decode => write!(f, "malformed response"),
            FailureKind::Unauthenticated => write!(f, "not signed in"),
        }
    }
}

/// A failed backend request as the state machine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl RequestFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
