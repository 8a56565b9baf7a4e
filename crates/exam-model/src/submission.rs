//! Submission records and their record-store rows.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::exam::{OptionId, Question};
use crate::{QuestionId, SessionId, StudentId, TestId};

/// Answers collected while the exam is active.
pub type AnswerSheet = BTreeMap<QuestionId, OptionId>;

/// The write-once result of a completed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub session_id: SessionId,
    pub student_id: StudentId,
    pub test_id: TestId,
    pub answers: AnswerSheet,
    pub completed_at: DateTime<Utc>,
}

/// Correct answers out of the exam's question count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Score {
    pub correct: u32,
    pub total: u32,
}

/// A `test_sessions` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSessionRow {
    pub id: SessionId,
    pub test_id: TestId,
    pub student_id: StudentId,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_score: Option<u32>,
    pub total_questions: Option<u32>,
}

/// A `test_submissions` row: one answered question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSubmissionRow {
    pub session_id: SessionId,
    pub test_id: TestId,
    pub student_id: StudentId,
    pub question_id: QuestionId,
    pub selected_answer: OptionId,
    pub submitted_at: DateTime<Utc>,
}

impl TestSessionRow {
    pub fn is_open(&self) -> bool {
        self.completed_at.is_none()
    }
}

impl SubmissionRecord {
    /// Score the answers against the exam's questions. Answers to unknown
    /// questions never count.
    pub fn score(&self, questions: &[Question]) -> Score {
        let correct = questions
            .iter()
            .filter(|q| self.answers.get(&q.id) == Some(&q.correct))
            .count();
        Score {
            correct: correct as u32,
            total: questions.len() as u32,
        }
    }

    /// One row per answered question.
    pub fn to_rows(&self) -> Vec<TestSubmissionRow> {
        self.answers
            .iter()
            .map(|(question_id, option)| TestSubmissionRow {
                session_id: self.session_id,
                test_id: self.test_id,
                student_id: self.student_id,
                question_id: *question_id,
                selected_answer: *option,
                submitted_at: self.completed_at,
            })
            .collect()
    }

    /// Rebuild a record from a completed session row and its submission
    /// rows. Returns `None` while the session is still open.
    pub fn from_rows(session: &TestSessionRow, rows: &[TestSubmissionRow]) -> Option<Self> {
        let completed_at = session.completed_at?;
        let answers = rows
            .iter()
            .filter(|row| row.session_id == session.id && row.student_id == session.student_id)
            .map(|row| (row.question_id, row.selected_answer))
            .collect();
        Some(Self {
            session_id: session.id,
            student_id: session.student_id,
            test_id: session.test_id,
            answers,
            completed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn question(correct: OptionId) -> Question {
        Question {
            id: Uuid::new_v4(),
            test_id: Uuid::nil(),
            text: "2 + 2 = ?".to_string(),
            options: ["3".into(), "4".into(), "5".into(), "22".into()],
            correct,
        }
    }

    fn record(answers: AnswerSheet) -> SubmissionRecord {
        SubmissionRecord {
            session_id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            test_id: Uuid::nil(),
            answers,
            completed_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
        }
    }

    fn completed_row(record: &SubmissionRecord) -> TestSessionRow {
        TestSessionRow {
            id: record.session_id,
            test_id: record.test_id,
            student_id: record.student_id,
            started_at: record.completed_at - chrono::Duration::minutes(30),
            completed_at: Some(record.completed_at),
            total_score: None,
            total_questions: None,
        }
    }

    #[test]
    fn test_score_counts_only_correct_answers() {
        let questions = vec![question(OptionId::B), question(OptionId::A), question(OptionId::D)];
        let mut answers = AnswerSheet::new();
        answers.insert(questions[0].id, OptionId::B);
        answers.insert(questions[1].id, OptionId::C);
        answers.insert(Uuid::new_v4(), OptionId::A);

        let score = record(answers).score(&questions);
        assert_eq!(score, Score { correct: 1, total: 3 });
    }

    #[test]
    fn test_empty_answers_produce_no_rows() {
        let record = record(AnswerSheet::new());
        assert!(record.to_rows().is_empty());
        let rebuilt = SubmissionRecord::from_rows(&completed_row(&record), &[]).unwrap();
        assert!(rebuilt.answers.is_empty());
    }

    #[test]
    fn test_open_session_has_no_record() {
        let record = record(AnswerSheet::new());
        let mut row = completed_row(&record);
        row.completed_at = None;
        assert!(SubmissionRecord::from_rows(&row, &record.to_rows()).is_none());
    }

    proptest! {
        #[test]
        fn prop_rows_preserve_answer_mapping(picks in proptest::collection::vec(0usize..4, 0..40)) {
            let answers: AnswerSheet = picks
                .iter()
                .map(|i| (Uuid::new_v4(), OptionId::ALL[*i]))
                .collect();
            let original = record(answers);
            let json = serde_json::to_string(&original.to_rows()).unwrap();
            let rows: Vec<TestSubmissionRow> = serde_json::from_str(&json).unwrap();
            let rebuilt = SubmissionRecord::from_rows(&completed_row(&original), &rows).unwrap();
            prop_assert_eq!(rebuilt, original);
        }
    }
}
