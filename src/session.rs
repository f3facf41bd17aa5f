// src/session.rs

use std::sync::Arc;

use serde::Serialize;

use crate::{
    engine::WrongAnswerPenalty,
    error::AppError,
    manager::{CompletionOutcome, ProgressManager},
};

/// Phases of a single quiz run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizPhase {
    Intro,
    Practice,
    Quiz,
    Result,
}

/// Drives `intro -> practice -> quiz -> result` for one level.
///
/// Wrong answers in the `quiz` phase are penalized on the spot through the
/// manager. `finish` is the only transition that applies the completion.
pub struct QuizSession {
    manager: Arc<ProgressManager>,
    level_number: u32,
    total_questions: u32,
    base_xp: u32,
    phase: QuizPhase,
    answered: u32,
    correct: u32,
    xp_lost: u32,
    hearts_lost: u32,
}

impl QuizSession {
    /// Opens a session for `level_number`. Locked levels are refused here.
    pub async fn start(
        manager: Arc<ProgressManager>,
        level_number: u32,
        total_questions: u32,
        base_xp: u32,
    ) -> Result<Self, AppError> {
        if total_questions == 0 {
            return Err(AppError::InvalidAttempt(
                "a quiz needs at least one question".to_string(),
            ));
        }

        let snapshot = manager.snapshot().await;
        if !crate::engine::is_level_unlocked(&snapshot, level_number) {
            return Err(AppError::LevelLocked {
                level: level_number,
                highest_unlocked: snapshot.highest_unlocked_level(),
            });
        }

        Ok(Self {
            manager,
            level_number,
            total_questions,
            base_xp,
            phase: QuizPhase::Intro,
            answered: 0,
            correct: 0,
            xp_lost: 0,
            hearts_lost: 0,
        })
    }

    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    pub fn level_number(&self) -> u32 {
        self.level_number
    }

    pub fn answered(&self) -> u32 {
        self.answered
    }

    pub fn correct(&self) -> u32 {
        self.correct
    }

    /// XP removed by wrong answers so far.
    pub fn xp_lost(&self) -> u32 {
        self.xp_lost
    }

    pub fn hearts_lost(&self) -> u32 {
        self.hearts_lost
    }

    pub fn start_practice(&mut self) -> Result<(), AppError> {
        self.transition(&[QuizPhase::Intro], QuizPhase::Practice)
    }

    /// Practice is optional, so the quiz can start from either phase.
    pub fn start_quiz(&mut self) -> Result<(), AppError> {
        self.transition(&[QuizPhase::Intro, QuizPhase::Practice], QuizPhase::Quiz)
    }

    /// Records one answer of the scored quiz.
    pub async fn answer(&mut self, correct: bool) -> Result<Option<WrongAnswerPenalty>, AppError> {
        self.expect_phase(QuizPhase::Quiz)?;
        if self.answered >= self.total_questions {
            return Err(AppError::InvalidAttempt(format!(
                "all {} questions already answered",
                self.total_questions
            )));
        }

        self.answered += 1;
        if correct {
            self.correct += 1;
        }

        let penalty = self
            .manager
            .record_answer(self.level_number, correct, self.answered, self.total_questions)
            .await;

        if let Some(p) = penalty {
            self.xp_lost += p.xp_deducted;
            self.hearts_lost += u32::from(p.heart_lost);
        }
        Ok(penalty)
    }

    /// Ends the quiz and applies the attempt. Unanswered questions count as wrong
    /// for scoring but carry no penalty.
    pub async fn finish(&mut self) -> Result<CompletionOutcome, AppError> {
        self.expect_phase(QuizPhase::Quiz)?;

        let outcome = self
            .manager
            .complete_level(self.level_number, self.correct, self.total_questions, self.base_xp)
            .await?;

        self.phase = QuizPhase::Result;
        Ok(outcome)
    }

    fn expect_phase(&self, expected: QuizPhase) -> Result<(), AppError> {
        if self.phase != expected {
            return Err(AppError::InvalidAttempt(format!(
                "expected {:?} phase, quiz is in {:?}",
                expected, self.phase
            )));
        }
        Ok(())
    }

    fn transition(&mut self, from: &[QuizPhase], to: QuizPhase) -> Result<(), AppError> {
        if !from.contains(&self.phase) {
            return Err(AppError::InvalidAttempt(format!(
                "cannot move from {:?} to {:?}",
                self.phase, to
            )));
        }
        self.phase = to;
        Ok(())
    }
}
