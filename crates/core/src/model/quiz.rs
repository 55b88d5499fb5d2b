use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum percentage a guard needs for an attempt to count as passed.
pub const PASS_THRESHOLD: u8 = 60;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("question {index} has no text")]
    EmptyQuestion { index: usize },

    #[error("question {index} needs at least two options")]
    TooFewOptions { index: usize },

    #[error("question {index} has a blank option")]
    EmptyOption { index: usize },

    #[error("question {index} marks option {answer} correct but only has {options} options")]
    AnswerOutOfRange {
        index: usize,
        answer: i64,
        options: usize,
    },

    #[error("expected {expected} answers, got {actual}")]
    AnswerCountMismatch { expected: usize, actual: usize },
}

//
// ─── QUESTIONS ─────────────────────────────────────────────────────────────────
//

/// Unvalidated question as it arrives from an admin form or storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestionDraft {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub answer: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizQuestion {
    question: String,
    options: Vec<String>,
    answer: usize,
}

impl QuizQuestion {
    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Index of the correct option.
    #[must_use]
    pub fn answer(&self) -> usize {
        self.answer
    }

    #[must_use]
    pub fn to_draft(&self) -> QuizQuestionDraft {
        QuizQuestionDraft {
            question: self.question.clone(),
            options: self.options.clone(),
            answer: i64::try_from(self.answer).unwrap_or(i64::MAX),
        }
    }
}

impl QuizQuestionDraft {
    /// # Errors
    ///
    /// Returns `QuizError` if the text, options or answer index are invalid.
    pub fn validate(self, index: usize) -> Result<QuizQuestion, QuizError> {
        let question = self.question.trim().to_owned();
        if question.is_empty() {
            return Err(QuizError::EmptyQuestion { index });
        }
        if self.options.len() < 2 {
            return Err(QuizError::TooFewOptions { index });
        }
        let options: Vec<String> = self.options.iter().map(|o| o.trim().to_owned()).collect();
        if options.iter().any(String::is_empty) {
            return Err(QuizError::EmptyOption { index });
        }
        let answer = usize::try_from(self.answer)
            .ok()
            .filter(|a| *a < options.len())
            .ok_or(QuizError::AnswerOutOfRange {
                index,
                answer: self.answer,
                options: options.len(),
            })?;

        Ok(QuizQuestion {
            question,
            options,
            answer,
        })
    }
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

/// Ordered list of questions attached to a material. May be empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Quiz {
    questions: Vec<QuizQuestion>,
}

impl Quiz {
    /// # Errors
    ///
    /// Returns the first `QuizError` found.
    pub fn from_drafts(drafts: Vec<QuizQuestionDraft>) -> Result<Self, QuizError> {
        let questions = drafts
            .into_iter()
            .enumerate()
            .map(|(i, d)| d.validate(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { questions })
    }

    #[must_use]
    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Grades a complete answer sheet.
    ///
    /// An empty quiz is an automatic pass and never reaches the percentage
    /// formula.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::AnswerCountMismatch` when the sheet length differs
    /// from the number of questions.
    pub fn grade(&self, selections: &[usize]) -> Result<QuizScore, QuizError> {
        if self.questions.is_empty() {
            return Ok(QuizScore::auto_pass());
        }
        if selections.len() != self.questions.len() {
            return Err(QuizError::AnswerCountMismatch {
                expected: self.questions.len(),
                actual: selections.len(),
            });
        }
        let correct = self
            .questions
            .iter()
            .zip(selections)
            .filter(|(q, picked)| q.answer == **picked)
            .count();
        Ok(QuizScore::from_counts(correct, self.questions.len()))
    }
}

//
// ─── SCORE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuizScore {
    score: u8,
    passed: bool,
}

impl QuizScore {
    #[must_use]
    pub fn auto_pass() -> Self {
        Self {
            score: 100,
            passed: true,
        }
    }

    // Caller guarantees total > 0. Rounds half up like the browser client did.
    fn from_counts(correct: usize, total: usize) -> Self {
        let pct = (200 * correct + total) / (2 * total);
        let score = u8::try_from(pct.min(100)).unwrap_or(100);
        Self {
            score,
            passed: score >= PASS_THRESHOLD,
        }
    }

    #[must_use]
    pub fn score(&self) -> u8 {
        self.score
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(answer: i64) -> QuizQuestionDraft {
        QuizQuestionDraft {
            question: "근무 교대 시 확인할 것은?".into(),
            options: vec!["출입 기록".into(), "점심 메뉴".into(), "날씨".into()],
            answer,
        }
    }

    fn quiz(n: usize) -> Quiz {
        Quiz::from_drafts((0..n).map(|_| draft(0)).collect()).unwrap()
    }

    #[test]
    fn rejects_answer_out_of_range() {
        let err = draft(3).validate(0).unwrap_err();
        assert!(matches!(err, QuizError::AnswerOutOfRange { answer: 3, .. }));
        let err = draft(-1).validate(2).unwrap_err();
        assert!(matches!(err, QuizError::AnswerOutOfRange { index: 2, .. }));
    }

    #[test]
    fn rejects_single_option_question() {
        let mut d = draft(0);
        d.options.truncate(1);
        assert_eq!(d.validate(0).unwrap_err(), QuizError::TooFewOptions { index: 0 });
    }

    #[test]
    fn all_correct_scores_hundred() {
        let score = quiz(2).grade(&[0, 0]).unwrap();
        assert_eq!(score.score(), 100);
        assert!(score.passed());
    }

    #[test]
    fn half_correct_fails() {
        let score = quiz(2).grade(&[0, 1]).unwrap();
        assert_eq!(score.score(), 50);
        assert!(!score.passed());
    }

    #[test]
    fn rounds_to_nearest_percent() {
        // 2 of 3 -> 66.67 -> 67
        assert_eq!(quiz(3).grade(&[0, 0, 2]).unwrap().score(), 67);
        // 1 of 3 -> 33.33 -> 33
        assert_eq!(quiz(3).grade(&[0, 1, 2]).unwrap().score(), 33);
        // 5 of 8 -> 62.5 -> 63
        assert_eq!(quiz(8).grade(&[0, 0, 0, 0, 0, 1, 1, 1]).unwrap().score(), 63);
    }

    #[test]
    fn threshold_is_inclusive() {
        let score = quiz(5).grade(&[0, 0, 0, 1, 1]).unwrap();
        assert_eq!(score.score(), 60);
        assert!(score.passed());
    }

    #[test]
    fn empty_quiz_auto_passes() {
        let score = Quiz::default().grade(&[]).unwrap();
        assert_eq!(score, QuizScore::auto_pass());
    }

    #[test]
    fn mismatched_sheet_is_rejected() {
        let err = quiz(2).grade(&[0]).unwrap_err();
        assert_eq!(
            err,
            QuizError::AnswerCountMismatch {
                expected: 2,
                actual: 1
            }
        );
    }
}
