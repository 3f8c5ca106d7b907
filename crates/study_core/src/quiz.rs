use std::collections::BTreeMap;

/// Zero-based option index for an answer letter (`"B"` -> 1).
///
/// Only the first non-blank character counts, case-insensitively; anything
/// that is not an ASCII letter has no index.
pub fn answer_index(letter: &str) -> Option<usize> {
    let first = letter.trim().chars().next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    Some(usize::from(first.to_ascii_uppercase() as u8 - b'A'))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// Letter of the correct option.
    pub answer: String,
    pub explanation: Option<String>,
    pub difficulty: Option<String>,
    pub kind: Option<String>,
}

impl QuizQuestion {
    /// Index of the correct option, if the answer letter points inside `options`.
    pub fn correct_index(&self) -> Option<usize> {
        answer_index(&self.answer).filter(|index| *index < self.options.len())
    }

    pub fn correct_option(&self) -> Option<&str> {
        self.correct_index()
            .and_then(|index| self.options.get(index))
            .map(String::as_str)
    }

    /// Grades a selection by option position. `None` (unanswered) is incorrect.
    pub fn is_correct(&self, selected: Option<&str>) -> bool {
        let (Some(selected), Some(correct)) = (selected, self.correct_index()) else {
            return false;
        };
        self.options.iter().position(|option| option == selected) == Some(correct)
    }

    /// The backend contract assumes four options lettered A to D.
    pub fn option_count_is_standard(&self) -> bool {
        self.options.len() == 4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizFeedback {
    Excellent,
    Good,
    KeepStudying,
}

impl QuizFeedback {
    pub fn for_percentage(percentage: u32) -> Self {
        if percentage >= 80 {
            QuizFeedback::Excellent
        } else if percentage >= 60 {
            QuizFeedback::Good
        } else {
            QuizFeedback::KeepStudying
        }
    }

    pub fn message(self, percentage: u32) -> String {
        match self {
            QuizFeedback::Excellent => format!("Excellent! You scored {percentage}%"),
            QuizFeedback::Good => format!("Good job! You scored {percentage}%"),
            QuizFeedback::KeepStudying => format!("You scored {percentage}%. Keep studying!"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizGrade {
    pub score: usize,
    pub total: usize,
    pub percentage: u32,
    pub feedback: QuizFeedback,
}

/// A quiz in progress: the questions and the options picked so far.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuizAttempt {
    questions: Vec<QuizQuestion>,
    answers: BTreeMap<usize, String>,
}

impl QuizAttempt {
    pub fn new(questions: Vec<QuizQuestion>) -> Self {
        Self {
            questions,
            answers: BTreeMap::new(),
        }
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    /// Records `option` for question `index`. Returns false, leaving the
    /// attempt untouched, when either does not exist.
    pub fn select(&mut self, index: usize, option: &str) -> bool {
        let Some(question) = self.questions.get(index) else {
            return false;
        };
        if !question.options.iter().any(|candidate| candidate == option) {
            return false;
        }
        self.answers.insert(index, option.to_string());
        true
    }

    /// Records the option at `option_index` for question `index`.
    pub fn select_position(&mut self, index: usize, option_index: usize) -> bool {
        let Some(option) = self
            .questions
            .get(index)
            .and_then(|question| question.options.get(option_index))
            .cloned()
        else {
            return false;
        };
        self.select(index, &option)
    }

    pub fn answer(&self, index: usize) -> Option<&str> {
        self.answers.get(&index).map(String::as_str)
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub fn score(&self) -> usize {
        self.questions
            .iter()
            .enumerate()
            .filter(|(index, question)| question.is_correct(self.answer(*index)))
            .count()
    }

    pub fn percentage(&self) -> u32 {
        let total = self.questions.len();
        if total == 0 {
            return 0;
        }
        let score = self.score();
        // Round half up without going through floats.
        ((score * 200 + total) / (2 * total)) as u32
    }

    pub fn grade(&self) -> QuizGrade {
        let percentage = self.percentage();
        QuizGrade {
            score: self.score(),
            total: self.questions.len(),
            percentage,
            feedback: QuizFeedback::for_percentage(percentage),
        }
    }
}
