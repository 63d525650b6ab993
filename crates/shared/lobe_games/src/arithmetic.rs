use crate::latch::OnceLatch;
use crate::prng::Prng;
use crate::stats::GameStats;
use crate::{Effect, Region, Timer, TimerKind};
use core::time::Duration;
use serde::Serialize;

pub const TARGET_SCORE: u32 = 5;
pub const NEXT_PROBLEM_DELAY: Duration = Duration::from_millis(1200);

/// Operands are drawn from `1..=OPERAND_MAX`.
const OPERAND_MAX: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Add,
    Subtract,
}

impl Operator {
    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Problem {
    pub operand_a: i32,
    pub operand_b: i32,
    pub operator: Operator,
}

impl Problem {
    pub fn answer(&self) -> i32 {
        match self.operator {
            Operator::Add => self.operand_a + self.operand_b,
            Operator::Subtract => self.operand_a - self.operand_b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizPhase {
    Answering,
    /// Solved; the next problem is scheduled.
    AwaitingNext,
    /// Terminal.
    Activated,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArithmeticView {
    pub problem: Problem,
    pub display: String,
    pub score: u32,
    pub target_score: u32,
    pub message: String,
    pub phase: QuizPhase,
    pub stats: GameStats,
}

/// Addition/subtraction quiz: solve `TARGET_SCORE` problems to activate the region.
#[derive(Debug)]
pub struct ArithmeticQuiz {
    rng: Prng,
    problem: Problem,
    score: u32,
    message: String,
    phase: QuizPhase,
    epoch: u32,
    completion: OnceLatch,
    pub stats: GameStats,
}

impl ArithmeticQuiz {
    pub fn new(seed: u64) -> Self {
        let mut q = Self {
            rng: Prng::new(seed),
            problem: Problem {
                operand_a: 0,
                operand_b: 0,
                operator: Operator::Add,
            },
            score: 0,
            message: String::new(),
            phase: QuizPhase::Answering,
            epoch: 0,
            completion: OnceLatch::new(),
            stats: GameStats::new(),
        };
        q.generate_problem();
        q
    }

    /// Replace the current problem. Subtraction operands are ordered so the
    /// answer is never negative.
    pub fn generate_problem(&mut self) {
        let operator = if self.rng.coin() {
            Operator::Add
        } else {
            Operator::Subtract
        };
        let a = self.rng.gen_range_u32(1, OPERAND_MAX + 1) as i32;
        let b = self.rng.gen_range_u32(1, OPERAND_MAX + 1) as i32;
        let (operand_a, operand_b) = if operator == Operator::Subtract && b > a {
            (b, a)
        } else {
            (a, b)
        };

        self.problem = Problem {
            operand_a,
            operand_b,
            operator,
        };
        self.message.clear();
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Check a typed answer against the current problem.
    ///
    /// Input that does not parse as an integer counts as a wrong answer.
    pub fn submit_answer(&mut self, raw: &str) -> Vec<Effect> {
        if self.phase != QuizPhase::Answering {
            return Vec::new();
        }

        let is_correct = raw
            .trim()
            .parse::<i32>()
            .is_ok_and(|v| v == self.problem.answer());
        self.stats.record_trial(is_correct);

        if !is_correct {
            self.message = "Try again.".to_string();
            return Vec::new();
        }

        self.score += 1;
        if self.score >= TARGET_SCORE {
            self.phase = QuizPhase::Activated;
            self.message = format!("{} Activated ✨", Region::Prefrontal.title());
            let mut effects = Vec::new();
            if self.completion.fire() {
                effects.push(Effect::RecordCompletion(Region::Prefrontal));
            }
            return effects;
        }

        self.phase = QuizPhase::AwaitingNext;
        self.message = "Correct! ✔".to_string();
        vec![Effect::schedule(
            NEXT_PROBLEM_DELAY,
            TimerKind::NextProblem,
            self.epoch,
        )]
    }

    pub fn on_timer(&mut self, timer: Timer) -> Vec<Effect> {
        if timer.kind == TimerKind::NextProblem
            && timer.epoch == self.epoch
            && self.phase == QuizPhase::AwaitingNext
        {
            self.generate_problem();
            self.phase = QuizPhase::Answering;
        }
        Vec::new()
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase == QuizPhase::Activated
    }

    pub fn view(&self) -> ArithmeticView {
        ArithmeticView {
            problem: self.problem,
            display: format!(
                "{} {} {}",
                self.problem.operand_a,
                self.problem.operator.symbol(),
                self.problem.operand_b
            ),
            score: self.score,
            target_score: TARGET_SCORE,
            message: self.message.clone(),
            phase: self.phase,
            stats: self.stats.clone(),
        }
    }
}
