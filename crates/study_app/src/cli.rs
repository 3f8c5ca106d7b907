use std::path::PathBuf;

use clap::builder::PossibleValue;
use clap::{Args, Parser, Subcommand, ValueEnum};
use study_core::{LibraryTab, SearchMethod};

use crate::config::DEFAULT_CONFIG_FILE;

#[derive(Parser, Debug)]
#[command(
    name = "study",
    version,
    about = "Turn web pages into notes, quizzes and a study chat"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Config file; a missing default file means built-in defaults.
    #[arg(long, env = "STUDY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, env = "STUDY_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Identity token sent as a bearer credential.
    #[arg(long, env = "STUDY_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Overrides the configured log level (error, warn, info, debug, trace).
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

impl GlobalArgs {
    /// The config path and whether the user named it.
    pub fn config_path(&self) -> (PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract study content from a URL and cache it locally.
    Extract(ExtractArgs),
    /// Show the cached document.
    Status,
    /// Forget the cached document.
    Clear(ClearArgs),
    /// Forget everything stored locally, including the chat session.
    Logout,
    /// List saved courses.
    Library(LibraryArgs),
    /// Show one saved course.
    Show(IdArgs),
    Delete(IdArgs),
    /// Toggle the favorite flag of a course.
    Favorite(IdArgs),
    /// Toggle the archived flag of a course.
    Archive(IdArgs),
    /// Generate study notes for a topic.
    Notes(NotesArgs),
    /// Explain a concept; without one, list the cached concepts.
    Learn(LearnArgs),
    /// Take an interactive quiz on the cached content.
    Quiz(QuizArgs),
    /// Ask a question about the cached content.
    Chat(ChatArgs),
    /// Clear the chat transcript on the backend.
    ChatClear(ChatClearArgs),
    /// Show account details and usage.
    Me,
    /// Wake the backend.
    Warmup,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    pub url: String,
}

#[derive(Args, Debug, Clone)]
pub struct ClearArgs {
    /// Also drop the backend's retrieval index.
    #[arg(long, default_value_t = false)]
    pub remote: bool,
}

#[derive(Args, Debug, Clone)]
pub struct LibraryArgs {
    #[arg(long, value_enum, default_value_t = TabArg::All)]
    pub tab: TabArg,

    /// Case-insensitive match on title or URL.
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct IdArgs {
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct NotesArgs {
    pub topic: String,
}

#[derive(Args, Debug, Clone)]
pub struct LearnArgs {
    pub concept: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct QuizArgs {
    #[arg(long, default_value_t = 10)]
    pub count: u32,

    /// Topics to cover; defaults to every cached concept.
    #[arg(long = "topic")]
    pub topics: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    pub question: String,

    #[arg(long, value_enum, default_value_t = MethodArg::Hybrid)]
    pub method: MethodArg,
}

#[derive(Args, Debug, Clone)]
pub struct ChatClearArgs {
    /// Also drop the local session id so the next chat starts fresh.
    #[arg(long, default_value_t = false)]
    pub forget: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum TabArg {
    All,
    Favorites,
    Archived,
}

impl From<TabArg> for LibraryTab {
    fn from(tab: TabArg) -> Self {
        match tab {
            TabArg::All => LibraryTab::All,
            TabArg::Favorites => LibraryTab::Favorites,
            TabArg::Archived => LibraryTab::Archived,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MethodArg {
    Hybrid,
    Bm25,
    Tfidf,
    Rrf,
}

impl ValueEnum for MethodArg {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            MethodArg::Hybrid,
            MethodArg::Bm25,
            MethodArg::Tfidf,
            MethodArg::Rrf,
        ]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        let name = match self {
            MethodArg::Hybrid => "hybrid",
            MethodArg::Bm25 => "bm25",
            MethodArg::Tfidf => "tfidf",
            MethodArg::Rrf => "rrf",
        };
        Some(PossibleValue::new(name).help(SearchMethod::from(*self).description()))
    }
}

impl From<MethodArg> for SearchMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::Hybrid => SearchMethod::Hybrid,
            MethodArg::Bm25 => SearchMethod::Bm25,
            MethodArg::Tfidf => SearchMethod::Tfidf,
            MethodArg::Rrf => SearchMethod::Rrf,
        }
    }
}
