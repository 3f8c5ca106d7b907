//! Plain-text rendering for terminal output.

use std::fmt::Write;

use study_core::{
    ChatMessage, Concept, CourseEntry, ExtractedDocument, JobStatus, Notification, NotifyLevel,
    QuizAttempt, QuizQuestion, SearchMethod,
};
use study_engine::{DocumentRecord, StudyNotes, UserStats};

const OPTION_LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub fn option_letter(index: usize) -> char {
    OPTION_LETTERS.get(index).map_or('?', |byte| char::from(*byte))
}

pub fn notification(notice: &Notification) -> String {
    let tag = match notice.level {
        NotifyLevel::Info => "info",
        NotifyLevel::Success => "ok",
        NotifyLevel::Warning => "warning",
        NotifyLevel::Error => "error",
    };
    format!("[{tag}] {}", notice.message)
}

pub fn progress_line(status: JobStatus, progress: u8) -> String {
    const WIDTH: usize = 20;
    let filled = usize::from(progress.min(100)) * WIDTH / 100;
    format!(
        "[{}{}] {:>3}% {}",
        "#".repeat(filled),
        "-".repeat(WIDTH - filled),
        progress,
        status.as_str()
    )
}

pub fn document(document: &ExtractedDocument) -> String {
    let mut out = String::new();
    if let Some(title) = &document.title {
        let _ = writeln!(out, "{title}");
    }
    let _ = writeln!(out, "URL:         {}", document.url);
    let _ = writeln!(out, "Document id: {}", document.document_id);
    let _ = writeln!(
        out,
        "Indexed:     {} characters in {} chunks",
        document.text_length, document.chunks_indexed
    );
    if let Some(summary) = &document.summary {
        let _ = writeln!(out, "\n{summary}");
    }
    let _ = writeln!(out, "\nConcepts ({}):", document.concepts.len());
    for concept in &document.concepts {
        match &concept.description {
            Some(description) => {
                let _ = writeln!(out, "  - {}: {}", concept.title, description);
            }
            None => {
                let _ = writeln!(out, "  - {}", concept.title);
            }
        }
    }
    out
}

pub fn course_list(courses: &[&CourseEntry]) -> String {
    if courses.is_empty() {
        return "No courses found.\n".to_string();
    }
    let mut out = String::new();
    for course in courses {
        let mut marks = String::new();
        if course.is_favorite {
            marks.push('*');
        }
        if course.is_archived {
            marks.push_str(" (archived)");
        }
        let _ = writeln!(out, "{}  {}{}", course.id, course.title, marks);
        let _ = writeln!(out, "    {}", course.url);
        if !course.concepts.is_empty() {
            let _ = writeln!(out, "    {}", course.concepts.join(", "));
        }
    }
    out
}

pub fn course_detail(record: DocumentRecord) -> String {
    let id = record.id.clone();
    let created = record.created_at.clone();
    let mut out = document(&record.into_extracted());
    let _ = writeln!(out, "\nLibrary id:  {id}");
    if let Some(created) = created {
        let _ = writeln!(out, "Saved:       {created}");
    }
    out
}

pub fn notes(topic: &str, notes: &StudyNotes) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {topic}");
    let mut meta = Vec::new();
    if let Some(minutes) = notes.estimated_study_time {
        meta.push(format!("{minutes} min"));
    }
    if let Some(level) = &notes.difficulty_level {
        meta.push(level.clone());
    }
    if !meta.is_empty() {
        let _ = writeln!(out, "({})", meta.join(", "));
    }
    if !notes.summary.is_empty() {
        let _ = writeln!(out, "\n{}", notes.summary);
    }
    if !notes.key_points.is_empty() {
        let _ = writeln!(out, "\n## Key points");
        for point in &notes.key_points {
            let _ = writeln!(out, "- {point}");
        }
    }
    if !notes.definitions.is_empty() {
        let _ = writeln!(out, "\n## Definitions");
        for (term, definition) in &notes.definitions {
            let _ = writeln!(out, "- {term}: {definition}");
        }
    }
    if !notes.flashcards.is_empty() {
        let _ = writeln!(out, "\n## Flashcards");
        for card in &notes.flashcards {
            let _ = writeln!(out, "Q: {}\nA: {}\n", card.question, card.answer);
        }
    }
    out
}

pub fn explanation(concept: &str, explanation: &str) -> String {
    format!("# {concept}\n\n{}\n", explanation.trim_end())
}

pub fn concept_suggestions(concepts: &[Concept]) -> String {
    if concepts.is_empty() {
        return "No concepts were found in the extracted content.\n".to_string();
    }
    let mut out = String::from("Concepts you can learn about:\n");
    for concept in concepts {
        let _ = writeln!(out, "  - {}", concept.title);
    }
    out
}

pub fn question(index: usize, total: usize, question: &QuizQuestion) -> String {
    let mut out = format!("\nQuestion {} of {}: {}\n", index + 1, total, question.question);
    for (position, option) in question.options.iter().enumerate() {
        let _ = writeln!(out, "  {}) {}", option_letter(position), option);
    }
    out
}

pub fn quiz_review(attempt: &QuizAttempt) -> String {
    let mut out = String::new();
    for (index, question) in attempt.questions().iter().enumerate() {
        let selected = attempt.answer(index);
        let verdict = if question.is_correct(selected) {
            "correct"
        } else {
            "wrong"
        };
        let _ = writeln!(out, "{}. {} ({verdict})", index + 1, question.question);
        let _ = writeln!(out, "   yours:   {}", selected.unwrap_or("(no answer)"));
        if let Some(correct) = question.correct_option() {
            let _ = writeln!(out, "   correct: {correct}");
        }
        if let Some(explanation) = &question.explanation {
            let _ = writeln!(out, "   {explanation}");
        }
    }
    let grade = attempt.grade();
    let _ = writeln!(
        out,
        "\nScore: {}/{} ({}%)",
        grade.score, grade.total, grade.percentage
    );
    let _ = writeln!(out, "{}", grade.feedback.message(grade.percentage));
    out
}

pub fn chat_message(message: &ChatMessage, method: SearchMethod) -> String {
    let mut out = format!("{}\n", message.text);
    if let Some(sources) = message.sources {
        let enhanced = if message.enhanced == Some(true) {
            ", query enhanced"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "({sources} sources via {}{enhanced})",
            method.label()
        );
    }
    out
}

pub fn user_stats(stats: &UserStats) -> String {
    let mut out = String::new();
    if let Some(name) = &stats.name {
        let _ = writeln!(out, "{name}");
    }
    if let Some(email) = &stats.email {
        let _ = writeln!(out, "{email}");
    }
    let _ = writeln!(
        out,
        "Plan: {}  Credits: {}  Resets in {} days",
        if stats.plan.is_empty() { "free" } else { stats.plan.as_str() },
        stats.credits,
        stats.days_until_reset
    );
    let _ = writeln!(out, "Quiz average: {:.0}%", stats.quiz_average);
    if !stats.recent_activity.is_empty() {
        let _ = writeln!(out, "\nRecent activity:");
        for activity in &stats.recent_activity {
            let _ = writeln!(out, "  {}: {}", activity.action_type, activity.title);
        }
    }
    out
}
