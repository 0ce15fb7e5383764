//! Catalog records as stored in the document store.
//!
//! Wire names are camelCase; timestamps are epoch milliseconds so the store
//! can order them numerically.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CatalogError, CatalogResult};

/// Subject taxonomy used by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subject {
    Mathematics,
    Science,
    English,
    History,
    Geography,
    #[serde(rename = "Computer Science")]
    ComputerScience,
    Art,
    Music,
}

impl Subject {
    /// All subjects, in catalog display order.
    pub fn all() -> &'static [Subject] {
        &[
            Subject::Mathematics,
            Subject::Science,
            Subject::English,
            Subject::History,
            Subject::Geography,
            Subject::ComputerScience,
            Subject::Art,
            Subject::Music,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Mathematics => "Mathematics",
            Subject::Science => "Science",
            Subject::English => "English",
            Subject::History => "History",
            Subject::Geography => "Geography",
            Subject::ComputerScience => "Computer Science",
            Subject::Art => "Art",
            Subject::Music => "Music",
        }
    }

    /// Parse a display name, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::all()
            .iter()
            .copied()
            .find(|s| s.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Pdf,
    Video,
    Link,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

/// Lesson completion state for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    Auto,
}

/// An educational module (course) as listed in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationalModule {
    pub id: String,
    pub title: String,
    pub description: String,
    pub subject: Subject,
    pub grade: String,
    pub difficulty: Difficulty,
    /// Minutes.
    pub duration: u32,
    pub thumbnail: String,
    /// Ordered ids of the lessons this module owns.
    #[serde(default)]
    pub lessons: Vec<String>,
    pub is_published: bool,
    pub author_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub enrolled_students: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a module; timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewModule {
    pub title: String,
    pub description: String,
    pub subject: Subject,
    pub grade: String,
    pub difficulty: Difficulty,
    pub duration: u32,
    pub thumbnail: String,
    #[serde(default)]
    pub lessons: Vec<String>,
    pub is_published: bool,
    pub author_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub enrolled_students: u32,
}

impl NewModule {
    pub fn validate(&self) -> CatalogResult<()> {
        require_text("title", &self.title)?;
        require_text("authorId", &self.author_id)?;
        validate_rating(self.rating)
    }
}

/// Partial module update; only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

impl ModuleUpdate {
    pub fn validate(&self) -> CatalogResult<()> {
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        if let Some(rating) = self.rating {
            validate_rating(rating)?;
        }
        Ok(())
    }
}

/// A typed attachment owned by one lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ResourceType,
    pub url: String,
    /// Bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Expected answer of a question: one value, or a set for multi-select.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    Single(String),
    Multiple(Vec<String>),
}

impl CorrectAnswer {
    fn normalized(&self) -> BTreeSet<String> {
        match self {
            CorrectAnswer::Single(s) => std::iter::once(s.trim().to_lowercase()).collect(),
            CorrectAnswer::Multiple(values) => {
                values.iter().map(|s| s.trim().to_lowercase()).collect()
            }
        }
    }

    /// Compare a given answer, ignoring case, surrounding whitespace and order.
    pub fn accepts(&self, given: &CorrectAnswer) -> bool {
        self.normalized() == given.normalized()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub question: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub correct_answer: CorrectAnswer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    pub questions: Vec<Question>,
    /// Minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u32>,
    /// Percentage of available points needed to pass.
    pub passing_score: f64,
}

/// Outcome of grading a quiz attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuizResult {
    pub earned: u32,
    pub possible: u32,
    /// Percentage 0-100.
    pub score: f64,
    pub passed: bool,
}

impl Quiz {
    pub fn total_points(&self) -> u32 {
        self.questions.iter().map(|q| q.points).sum()
    }

    /// Grade an attempt. `answers` maps question id to the given answer;
    /// unanswered questions earn nothing.
    pub fn grade(&self, answers: &HashMap<String, CorrectAnswer>) -> QuizResult {
        let possible = self.total_points();
        let earned = self
            .questions
            .iter()
            .filter(|q| {
                answers
                    .get(&q.id)
                    .is_some_and(|given| q.correct_answer.accepts(given))
            })
            .map(|q| q.points)
            .sum();
        let score = if possible == 0 {
            0.0
        } else {
            f64::from(earned) * 100.0 / f64::from(possible)
        };

        QuizResult {
            earned,
            possible,
            score,
            passed: possible > 0 && score >= self.passing_score,
        }
    }

    pub fn validate(&self) -> CatalogResult<()> {
        if !(0.0..=100.0).contains(&self.passing_score) {
            return Err(CatalogError::validation("passingScore must be between 0 and 100"));
        }
        for question in &self.questions {
            require_text("question", &question.question)?;
            if question.kind == QuestionType::MultipleChoice
                && question.options.as_ref().map_or(true, |o| o.is_empty())
            {
                return Err(CatalogError::validation(format!(
                    "Multiple-choice question {} has no options",
                    question.id
                )));
            }
        }
        Ok(())
    }
}

/// A lesson; belongs to exactly one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub module_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// Minutes.
    pub duration: u32,
    /// Position within the module; gaps are allowed.
    pub order: u32,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<Quiz>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLesson {
    pub module_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    pub duration: u32,
    pub order: u32,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<Quiz>,
}

impl NewLesson {
    pub fn validate(&self) -> CatalogResult<()> {
        require_text("moduleId", &self.module_id)?;
        require_text("title", &self.title)?;
        validate_media(self.video_url.as_deref(), &self.resources)?;
        if let Some(quiz) = &self.quiz {
            quiz.validate()?;
        }
        Ok(())
    }
}

/// Partial lesson update; a lesson cannot move to another module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<Resource>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz: Option<Quiz>,
}

impl LessonUpdate {
    pub fn validate(&self) -> CatalogResult<()> {
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        validate_media(
            self.video_url.as_deref(),
            self.resources.as_deref().unwrap_or_default(),
        )?;
        if let Some(quiz) = &self.quiz {
            quiz.validate()?;
        }
        Ok(())
    }
}

/// Per-(user, module, lesson) progress record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub id: String,
    pub user_id: String,
    pub module_id: String,
    pub lesson_id: String,
    pub status: ProgressStatus,
    /// Percentage 0-100.
    pub progress: u8,
    /// Seconds.
    pub time_spent: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_accessed: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_score: Option<f64>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Input to `upsert_user_progress`. The (user, module, lesson) triple is the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub user_id: String,
    pub module_id: String,
    pub lesson_id: String,
    pub status: ProgressStatus,
    pub progress: u8,
    pub time_spent: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_score: Option<f64>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProgressUpdate {
    pub fn validate(&self) -> CatalogResult<()> {
        require_text("userId", &self.user_id)?;
        require_text("moduleId", &self.module_id)?;
        require_text("lessonId", &self.lesson_id)?;
        if self.progress > 100 {
            return Err(CatalogError::validation("progress must be between 0 and 100"));
        }
        if let Some(score) = self.quiz_score {
            if !(0.0..=100.0).contains(&score) {
                return Err(CatalogError::validation("quizScore must be between 0 and 100"));
            }
        }
        Ok(())
    }
}

/// Per-(user, module) enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEnrollment {
    pub id: String,
    pub user_id: String,
    pub module_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub enrolled_at: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_url: Option<String>,
    /// Percentage 0-100.
    pub overall_progress: u8,
    pub lessons_completed: u32,
    pub total_lessons: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub notifications: bool,
    pub theme: Theme,
    pub language: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            notifications: true,
            theme: Theme::Auto,
            language: "en".to_string(),
        }
    }
}

/// User profile, keyed by the immutable user id from the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_active: DateTime<Utc>,
    #[serde(default)]
    pub preferences: Preferences,
}

/// Profile fields written by `upsert_user_profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
    #[serde(default)]
    pub preferences: Preferences,
}

impl ProfileInput {
    pub fn validate(&self) -> CatalogResult<()> {
        require_text("name", &self.name)?;
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err(CatalogError::validation(format!("Invalid email address: {}", email))),
        }
    }
}

fn require_text(field: &str, value: &str) -> CatalogResult<()> {
    if value.trim().is_empty() {
        return Err(CatalogError::validation(format!("{} cannot be empty", field)));
    }
    Ok(())
}

fn validate_rating(rating: f64) -> CatalogResult<()> {
    if !(0.0..=5.0).contains(&rating) {
        return Err(CatalogError::validation("rating must be between 0 and 5"));
    }
    Ok(())
}

fn validate_media(video_url: Option<&str>, resources: &[Resource]) -> CatalogResult<()> {
    let urls = video_url
        .into_iter()
        .chain(resources.iter().map(|r| r.url.as_str()));
    for raw in urls {
        Url::parse(raw)
            .map_err(|e| CatalogError::validation(format!("Invalid URL {:?}: {}", raw, e)))?;
    }
    Ok(())
}
