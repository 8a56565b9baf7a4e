//! Exam descriptors and questions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{QuestionId, TestId};

/// Read-only description of an exam, fetched once at setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamDescriptor {
    pub test_id: TestId,
    pub title: String,
    /// Batch the exam was issued to (display only).
    #[serde(default)]
    pub batch_name: Option<String>,
    pub duration_seconds: u64,
    pub availability_window: AvailabilityWindow,
    pub is_active: bool,
}

/// Inclusive time range in which an exam may be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Why an exam cannot be started right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Unavailability {
    #[error("This test is not active")]
    Inactive,
    #[error("Test has not started yet")]
    NotStarted,
    #[error("Test has ended")]
    Ended,
}

impl AvailabilityWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether `now` falls inside the window (both ends inclusive).
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        now >= self.start && now <= self.end
    }
}

impl ExamDescriptor {
    /// Check that the exam may be started at `now`.
    pub fn check_available(&self, now: DateTime<Utc>) -> Result<(), Unavailability> {
        if !self.is_active {
            return Err(Unavailability::Inactive);
        }
        if now < self.availability_window.start {
            return Err(Unavailability::NotStarted);
        }
        if now > self.availability_window.end {
            return Err(Unavailability::Ended);
        }
        Ok(())
    }

    /// Login URL handed to students: `<origin>/test/<testId>`.
    pub fn test_url(&self, origin: &str) -> String {
        test_url(origin, self.test_id)
    }
}

/// Build the login URL for a test.
pub fn test_url(origin: &str, test_id: TestId) -> String {
    format!("{}/test/{}", origin.trim_end_matches('/'), test_id)
}

/// One of the four answer options of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OptionId {
    A,
    B,
    C,
    D,
}

impl OptionId {
    pub const ALL: [OptionId; 4] = [OptionId::A, OptionId::B, OptionId::C, OptionId::D];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionId::A => "A",
            OptionId::B => "B",
            OptionId::C => "C",
            OptionId::D => "D",
        }
    }

    fn index(&self) -> usize {
        match self {
            OptionId::A => 0,
            OptionId::B => 1,
            OptionId::C => 2,
            OptionId::D => 3,
        }
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected option identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown option '{0}', expected one of A, B, C, D")]
pub struct ParseOptionError(pub String);

impl FromStr for OptionId {
    type Err = ParseOptionError;

    /// Strict: only the upper-case letters are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(OptionId::A),
            "B" => Ok(OptionId::B),
            "C" => Ok(OptionId::C),
            "D" => Ok(OptionId::D),
            other => Err(ParseOptionError(other.to_string())),
        }
    }
}

/// A multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub test_id: TestId,
    pub text: String,
    /// Option texts in A..D order.
    pub options: [String; 4],
    pub correct: OptionId,
}

impl Question {
    pub fn option_text(&self, option: OptionId) -> &str {
        &self.options[option.index()]
    }
}
