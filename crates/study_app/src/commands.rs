use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use study_core::{
    answer_index, filter_courses, CourseFlag, FailureKind, Notification, NotifyLevel,
    QuizAttempt, QuizFeedback, QuizQuestion,
};
use study_engine::{
    chat_failure_notice, ApiClient, ApiError, ChatOptions, ChatService, ContentCache,
    ExtractionDriver, ExtractionEvent, ExtractionOutcome, FileStore, LibraryController,
    ProgressSink, StaticTokenProvider,
};
use study_logging::{study_debug, study_info, study_warn};

use crate::cli::{
    ChatArgs, ChatClearArgs, ClearArgs, Commands, LearnArgs, LibraryArgs, QuizArgs,
};
use crate::config::AppConfig;
use crate::render;

/// Everything a command needs: the backend client and the local store.
pub struct Context {
    config: AppConfig,
    api: Arc<ApiClient>,
    store: Arc<FileStore>,
    cache: ContentCache,
}

impl Context {
    pub fn new(config: AppConfig) -> Result<Self> {
        let tokens = Arc::new(StaticTokenProvider::new(config.token.clone()));
        let api = ApiClient::new(&config.client_settings(), tokens)
            .with_context(|| format!("failed to set up client for {}", config.api_url))?;
        let store = Arc::new(FileStore::open(&config.store_path));
        let cache = ContentCache::new(store.clone());
        Ok(Self {
            config,
            api: Arc::new(api),
            store,
            cache,
        })
    }
}

pub async fn run(ctx: &Context, command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Extract(args) => extract(ctx, &args.url).await,
        Commands::Status => Ok(status(ctx)),
        Commands::Clear(args) => clear(ctx, args).await,
        Commands::Logout => {
            ctx.cache.clear_all().context("failed to clear local store")?;
            println!("Signed out; local study data cleared.");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Library(args) => library(ctx, args).await,
        Commands::Show(args) => show(ctx, &args.id).await,
        Commands::Delete(args) => {
            let mut controller = loaded_library(ctx).await?;
            Ok(report(&controller.delete(&args.id).await))
        }
        Commands::Favorite(args) => toggle(ctx, &args.id, CourseFlag::Favorite).await,
        Commands::Archive(args) => toggle(ctx, &args.id, CourseFlag::Archived).await,
        Commands::Notes(args) => notes(ctx, &args.topic).await,
        Commands::Learn(args) => learn(ctx, args).await,
        Commands::Quiz(args) => quiz(ctx, args).await,
        Commands::Chat(args) => chat(ctx, args).await,
        Commands::ChatClear(args) => chat_clear(ctx, args).await,
        Commands::Me => {
            let stats = ctx
                .api
                .me()
                .await
                .map_err(|err| api_failure("Failed to load account", err))?;
            print!("{}", render::user_stats(&stats));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Warmup => {
            ctx.api
                .warmup()
                .await
                .map_err(|err| api_failure("Backend did not respond", err))?;
            println!("Backend is awake.");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Text shown instead of a feature that needs extracted content.
pub fn no_content_message(feature: &str) -> String {
    format!(
        "Content Not Found\nYou need to extract content first before using {feature}.\n\
         Run `study extract <url>` with any article, documentation or educational page."
    )
}

fn content_gate(ctx: &Context, feature: &str) -> bool {
    if ctx.cache.has_extracted_content() {
        return true;
    }
    println!("{}", no_content_message(feature));
    false
}

fn api_failure(context: &str, err: ApiError) -> anyhow::Error {
    let notice = Notification::for_failure(context, &err.failure());
    anyhow::Error::new(err).context(notice.message)
}

fn print_notice(notice: &Notification) {
    match notice.level {
        NotifyLevel::Warning | NotifyLevel::Error => eprintln!("{}", render::notification(notice)),
        NotifyLevel::Info | NotifyLevel::Success => println!("{}", render::notification(notice)),
    }
}

fn has_error(notices: &[Notification]) -> bool {
    notices
        .iter()
        .any(|notice| notice.level == NotifyLevel::Error)
}

/// Prints every notice; failure if any of them was an error.
fn report(notices: &[Notification]) -> ExitCode {
    notices.iter().for_each(print_notice);
    if has_error(notices) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

struct TerminalSink;

impl ProgressSink for TerminalSink {
    fn emit(&self, event: ExtractionEvent) {
        match event {
            ExtractionEvent::Submitted { url, .. } => println!("Extracting {url} ..."),
            ExtractionEvent::Progress {
                status, progress, ..
            } => println!("{}", render::progress_line(status, progress)),
            ExtractionEvent::PollScheduled { attempt, delay, .. } => {
                study_debug!("Status check {} in {:?}", attempt, delay);
            }
            ExtractionEvent::Notice(notice) => print_notice(&notice),
        }
    }
}

async fn extract(ctx: &Context, url: &str) -> Result<ExitCode> {
    let mut driver = ExtractionDriver::new(
        ctx.api.clone(),
        ctx.cache.clone(),
        ctx.config.poll_policy(),
    );
    let cancel = driver.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let outcome = driver.extract(url, &TerminalSink).await;
    interrupt.abort();

    match outcome {
        ExtractionOutcome::Completed(document) => {
            print!("\n{}", render::document(&document));
            Ok(ExitCode::SUCCESS)
        }
        ExtractionOutcome::Cancelled => {
            println!("Extraction cancelled.");
            Ok(ExitCode::SUCCESS)
        }
        ExtractionOutcome::Failed(reason) => {
            study_info!("Extraction of {} failed: {}", url, reason);
            Ok(ExitCode::FAILURE)
        }
        ExtractionOutcome::TimedOut { attempts } => {
            study_info!("Extraction of {} timed out after {} checks", url, attempts);
            Ok(ExitCode::FAILURE)
        }
        ExtractionOutcome::Rejected(_) => Ok(ExitCode::FAILURE),
    }
}

fn status(ctx: &Context) -> ExitCode {
    match ctx.cache.load_document() {
        Some(document) => print!("{}", render::document(&document)),
        None => println!("No content extracted yet. Run `study extract <url>` to start."),
    }
    ExitCode::SUCCESS
}

async fn clear(ctx: &Context, args: ClearArgs) -> Result<ExitCode> {
    ctx.cache
        .clear_extracted()
        .context("failed to clear cached content")?;
    println!("Cleared extracted content.");
    if args.remote {
        ctx.api
            .clear_store()
            .await
            .map_err(|err| api_failure("Failed to clear backend index", err))?;
        println!("Cleared the backend index.");
    }
    Ok(ExitCode::SUCCESS)
}

async fn loaded_library(ctx: &Context) -> Result<LibraryController> {
    let mut controller = LibraryController::new(ctx.api.clone());
    let notices = controller.load().await;
    notices.iter().for_each(print_notice);
    if has_error(&notices) {
        anyhow::bail!("library unavailable");
    }
    Ok(controller)
}

async fn library(ctx: &Context, args: LibraryArgs) -> Result<ExitCode> {
    let controller = loaded_library(ctx).await?;
    let search = args.search.unwrap_or_default();
    let courses = filter_courses(controller.courses(), args.tab.into(), &search);
    print!("{}", render::course_list(&courses));
    Ok(ExitCode::SUCCESS)
}

async fn toggle(ctx: &Context, id: &str, flag: CourseFlag) -> Result<ExitCode> {
    let mut controller = loaded_library(ctx).await?;
    let notices = controller.toggle(id, flag).await;
    if !notices.is_empty() {
        return Ok(report(&notices));
    }
    let Some(course) = controller.courses().iter().find(|course| course.id == id) else {
        return Ok(ExitCode::SUCCESS);
    };
    let message = match (flag, flag.get(course)) {
        (CourseFlag::Favorite, true) => "Added to favorites",
        (CourseFlag::Favorite, false) => "Removed from favorites",
        (CourseFlag::Archived, true) => "Course archived",
        (CourseFlag::Archived, false) => "Course restored",
    };
    print_notice(&Notification::success(format!("{message}: {}", course.title)));
    Ok(ExitCode::SUCCESS)
}

async fn show(ctx: &Context, id: &str) -> Result<ExitCode> {
    let record = ctx
        .api
        .document_record(id)
        .await
        .map_err(|err| api_failure("Failed to load course", err))?;
    print!("{}", render::course_detail(record));
    Ok(ExitCode::SUCCESS)
}

async fn notes(ctx: &Context, topic: &str) -> Result<ExitCode> {
    if !content_gate(ctx, "the Notes feature") {
        return Ok(ExitCode::SUCCESS);
    }
    let topic = topic.trim();
    if topic.is_empty() {
        print_notice(&Notification::warning(
            "Please enter a topic or select from suggestions",
        ));
        return Ok(ExitCode::FAILURE);
    }
    let Some(document_id) = ctx.cache.document_id() else {
        print_notice(&Notification::error(
            "No document selected. Please extract content first.",
        ));
        return Ok(ExitCode::FAILURE);
    };
    let notes = ctx
        .api
        .generate_notes(topic, Some(&document_id))
        .await
        .map_err(|err| api_failure("Failed to generate notes", err))?;
    print!("{}", render::notes(topic, &notes));
    Ok(ExitCode::SUCCESS)
}

async fn learn(ctx: &Context, args: LearnArgs) -> Result<ExitCode> {
    if !content_gate(ctx, "the Learn feature") {
        return Ok(ExitCode::SUCCESS);
    }
    let Some(concept) = args.concept else {
        print!("{}", render::concept_suggestions(&ctx.cache.concepts()));
        return Ok(ExitCode::SUCCESS);
    };
    let concept = concept.trim();
    if concept.is_empty() {
        print_notice(&Notification::warning("Please enter a concept to learn about"));
        return Ok(ExitCode::FAILURE);
    }
    if let Some(explanation) = ctx.cache.explanation(concept) {
        study_debug!("Reusing saved explanation for {}", concept);
        print!("{}", render::explanation(concept, &explanation));
        return Ok(ExitCode::SUCCESS);
    }
    let detail = ctx
        .api
        .concept_detail(concept)
        .await
        .map_err(|err| api_failure("Failed to load explanation", err))?;
    if let Err(err) = ctx.cache.store_explanation(concept, &detail.explanation) {
        study_warn!("Could not save explanation for {}: {}", concept, err);
    }
    print!("{}", render::explanation(concept, &detail.explanation));
    Ok(ExitCode::SUCCESS)
}

async fn quiz(ctx: &Context, args: QuizArgs) -> Result<ExitCode> {
    if !content_gate(ctx, "the Quiz feature") {
        return Ok(ExitCode::SUCCESS);
    }
    let topics = if args.topics.is_empty() {
        ctx.cache
            .concepts()
            .into_iter()
            .map(|concept| concept.title)
            .collect()
    } else {
        args.topics
    };
    if topics.is_empty() {
        print_notice(&Notification::warning(
            "Please select at least one topic for the quiz",
        ));
        return Ok(ExitCode::FAILURE);
    }

    let document_id = ctx.cache.document_id();
    println!("Generating quiz questions...");
    let questions = match ctx
        .api
        .generate_quiz(args.count, &topics, document_id.as_deref())
        .await
    {
        Ok(questions) if !questions.is_empty() => questions,
        Ok(_) => {
            print_notice(&Notification::error("The backend returned no questions."));
            return Ok(ExitCode::FAILURE);
        }
        Err(err) if err.kind() == FailureKind::RateLimited => {
            return Err(api_failure("Failed to generate quiz", err));
        }
        Err(err) => {
            return Err(anyhow::Error::new(err).context(
                "Failed to generate quiz. Please extract content from a URL first.",
            ));
        }
    };
    print_notice(&Notification::success(format!(
        "Quiz ready with {} questions!",
        questions.len()
    )));

    let attempt = take_quiz(questions, io::stdin().lock(), io::stdout().lock())
        .context("failed to read answers")?;
    let grade = attempt.grade();
    print!("\n{}", render::quiz_review(&attempt));

    if let Err(err) = ctx
        .api
        .submit_quiz_result(grade.score, grade.total, &topics, document_id.as_deref())
        .await
    {
        study_warn!("Failed to record quiz result: {}", err);
    }
    let level = match grade.feedback {
        QuizFeedback::Excellent => NotifyLevel::Success,
        QuizFeedback::Good => NotifyLevel::Info,
        QuizFeedback::KeepStudying => NotifyLevel::Warning,
    };
    print_notice(&Notification::new(
        level,
        grade.feedback.message(grade.percentage),
    ));
    Ok(ExitCode::SUCCESS)
}

/// Asks every question on `output` and reads one letter per answer from
/// `input`. A blank line skips a question; end of input ends the quiz early.
pub fn take_quiz<R: BufRead, W: Write>(
    questions: Vec<QuizQuestion>,
    mut input: R,
    mut output: W,
) -> io::Result<QuizAttempt> {
    let mut attempt = QuizAttempt::new(questions);
    let total = attempt.questions().len();
    let mut line = String::new();

    'questions: for index in 0..total {
        let question = &attempt.questions()[index];
        write!(output, "{}", render::question(index, total, question))?;
        let last_letter = render::option_letter(question.options.len().saturating_sub(1));
        loop {
            write!(output, "Answer (A-{last_letter}, blank to skip): ")?;
            output.flush()?;
            line.clear();
            if input.read_line(&mut line)? == 0 {
                break 'questions;
            }
            if line.trim().is_empty() {
                break;
            }
            match answer_index(&line) {
                Some(position) if attempt.select_position(index, position) => break,
                _ => writeln!(output, "Not one of the options.")?,
            }
        }
    }
    Ok(attempt)
}

async fn chat(ctx: &Context, args: ChatArgs) -> Result<ExitCode> {
    if !content_gate(ctx, "the Chat feature") {
        return Ok(ExitCode::SUCCESS);
    }
    let mut service = ChatService::open(ctx.api.clone(), ctx.store.clone());
    let options = ChatOptions {
        search_method: args.method.into(),
        ..ChatOptions::default()
    };
    let document_id = ctx.cache.document_id();
    let result = service
        .ask(&args.question, options, document_id.as_deref())
        .await;
    if let Some(message) = service.session().messages().last() {
        print!("{}", render::chat_message(message, options.search_method));
    }
    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            print_notice(&chat_failure_notice(&err));
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn chat_clear(ctx: &Context, args: ChatClearArgs) -> Result<ExitCode> {
    let mut service = ChatService::open(ctx.api.clone(), ctx.store.clone());
    print_notice(&service.clear().await);
    if args.forget {
        service.forget_session();
    }
    Ok(ExitCode::SUCCESS)
}
