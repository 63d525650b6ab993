use crate::latch::OnceLatch;
use crate::prng::Prng;
use crate::stats::GameStats;
use crate::{Effect, Region, Timer, TimerKind};
use core::time::Duration;
use serde::Serialize;

pub const MAX_LEVEL: u32 = 5;
pub const GRID_SIZE: usize = 9;

/// How long each playback cell stays lit.
pub const HIGHLIGHT: Duration = Duration::from_millis(800);
/// Dark pause after each lit cell.
pub const GAP: Duration = Duration::from_millis(300);
pub const NEXT_LEVEL_DELAY: Duration = Duration::from_millis(1000);
pub const START_DELAY: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecallPhase {
    Idle,
    /// Start pressed; first element pending.
    Starting,
    /// Sequence is being revealed; input is ignored.
    Playback,
    AwaitingInput,
    /// Level cleared; next element pending.
    Advancing,
    Failed,
    Complete,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecallView {
    pub level: u32,
    pub max_level: u32,
    pub grid_size: usize,
    pub phase: RecallPhase,
    pub message: String,
    pub active_cell: Option<usize>,
    pub sequence_len: usize,
    pub input_len: usize,
    pub stats: GameStats,
}

/// "Simon"-style memory game on a 3x3 grid.
///
/// Each level appends one random cell, plays the whole sequence back, then
/// waits for the player to reproduce it. Any wrong cell sends the player back
/// to level 1 with an empty sequence.
#[derive(Debug)]
pub struct SequenceRecallGame {
    rng: Prng,
    sequence: Vec<usize>,
    user_input: Vec<usize>,
    level: u32,
    phase: RecallPhase,

    // Playback cursor into `sequence`; `lit` is true while the cell is shown.
    cursor: usize,
    lit: bool,

    message: String,
    epoch: u32,
    completion: OnceLatch,
    pub stats: GameStats,
}

impl SequenceRecallGame {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Prng::new(seed),
            sequence: Vec::with_capacity(MAX_LEVEL as usize),
            user_input: Vec::with_capacity(MAX_LEVEL as usize),
            level: 1,
            phase: RecallPhase::Idle,
            cursor: 0,
            lit: false,
            message: "Click Start to Begin".to_string(),
            epoch: 0,
            completion: OnceLatch::new(),
            stats: GameStats::new(),
        }
    }

    /// Begin (or restart) a session. Ignored once the region is calibrated.
    pub fn start(&mut self) -> Vec<Effect> {
        if self.phase == RecallPhase::Complete {
            return Vec::new();
        }

        self.sequence.clear();
        self.user_input.clear();
        self.level = 1;
        self.lit = false;
        self.cursor = 0;
        self.completion.reset();
        self.epoch = self.epoch.wrapping_add(1);
        self.phase = RecallPhase::Starting;
        self.message = "Initializing...".to_string();

        vec![Effect::schedule(START_DELAY, TimerKind::NextLevel, self.epoch)]
    }

    pub fn on_timer(&mut self, timer: Timer) -> Vec<Effect> {
        if timer.epoch != self.epoch {
            return Vec::new();
        }

        match (timer.kind, self.phase) {
            (TimerKind::NextLevel, RecallPhase::Starting | RecallPhase::Advancing) => {
                self.extend_sequence()
            }
            (TimerKind::PlaybackStep, RecallPhase::Playback) => self.advance_playback(),
            _ => Vec::new(),
        }
    }

    fn extend_sequence(&mut self) -> Vec<Effect> {
        if self.level > MAX_LEVEL {
            return Vec::new();
        }

        let next = self.rng.gen_range_usize(0, GRID_SIZE);
        self.sequence.push(next);
        self.user_input.clear();

        self.phase = RecallPhase::Playback;
        self.cursor = 0;
        self.lit = true;
        self.message = "Watch Carefully".to_string();

        vec![Effect::schedule(HIGHLIGHT, TimerKind::PlaybackStep, self.epoch)]
    }

    fn advance_playback(&mut self) -> Vec<Effect> {
        if self.lit {
            self.lit = false;
            return vec![Effect::schedule(GAP, TimerKind::PlaybackStep, self.epoch)];
        }

        self.cursor += 1;
        if self.cursor < self.sequence.len() {
            self.lit = true;
            return vec![Effect::schedule(HIGHLIGHT, TimerKind::PlaybackStep, self.epoch)];
        }

        self.phase = RecallPhase::AwaitingInput;
        self.message = "Now Your Turn".to_string();
        Vec::new()
    }

    /// Register a click on grid cell `index`.
    ///
    /// Indices outside the grid never match and therefore count as a mistake.
    pub fn click(&mut self, index: usize) -> Vec<Effect> {
        if self.phase != RecallPhase::AwaitingInput {
            return Vec::new();
        }

        self.user_input.push(index);
        let pos = self.user_input.len() - 1;
        let is_correct = self.sequence.get(pos) == Some(&index);
        self.stats.record_trial(is_correct);

        if !is_correct {
            self.message = "Calibration Failed. Resetting Neurons.".to_string();
            self.sequence.clear();
            self.user_input.clear();
            self.level = 1;
            self.phase = RecallPhase::Failed;
            return Vec::new();
        }

        if self.user_input.len() < self.sequence.len() {
            return Vec::new();
        }

        if self.level >= MAX_LEVEL {
            self.level = MAX_LEVEL + 1;
            self.phase = RecallPhase::Complete;
            self.message = format!("{} Calibrated ✨", Region::Temporal.title());
            let mut effects = Vec::new();
            if self.completion.fire() {
                effects.push(Effect::RecordCompletion(Region::Temporal));
            }
            return effects;
        }

        self.level += 1;
        self.phase = RecallPhase::Advancing;
        self.message = format!("Success. Calibrating Level {}...", self.level);
        vec![Effect::schedule(
            NEXT_LEVEL_DELAY,
            TimerKind::NextLevel,
            self.epoch,
        )]
    }

    /// The cell currently lit by playback, if any.
    pub fn active_cell(&self) -> Option<usize> {
        if self.phase == RecallPhase::Playback && self.lit {
            self.sequence.get(self.cursor).copied()
        } else {
            None
        }
    }

    pub fn sequence(&self) -> &[usize] {
        &self.sequence
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn phase(&self) -> RecallPhase {
        self.phase
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_complete(&self) -> bool {
        self.phase == RecallPhase::Complete
    }

    pub fn view(&self) -> RecallView {
        RecallView {
            level: self.level,
            max_level: MAX_LEVEL,
            grid_size: GRID_SIZE,
            phase: self.phase,
            message: self.message.clone(),
            active_cell: self.active_cell(),
            sequence_len: self.sequence.len(),
            input_len: self.user_input.len(),
            stats: self.stats.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fire scheduled timers until the game stops asking for more, recording
    /// every lit cell along the way.
    fn run_timers(g: &mut SequenceRecallGame, mut effects: Vec<Effect>) -> Vec<usize> {
        let mut revealed = Vec::new();
        while let Some(Effect::Schedule { timer, .. }) = effects.pop() {
            effects = g.on_timer(timer);
            if let Some(c) = g.active_cell() {
                revealed.push(c);
            }
        }
        revealed
    }

    #[test]
    fn playback_reveals_in_order_and_ignores_input() {
        let mut g = SequenceRecallGame::new(5);
        let effects = g.start();
        assert_eq!(g.message(), "Initializing...");

        let Effect::Schedule { timer, after } = effects[0].clone() else {
            panic!("start should schedule the first level");
        };
        assert_eq!(after, START_DELAY);
        let effects = g.on_timer(timer);
        assert_eq!(g.phase(), RecallPhase::Playback);
        assert_eq!(g.message(), "Watch Carefully");

        // Clicks during playback are dropped.
        assert!(g.click(g.sequence()[0]).is_empty());
        assert_eq!(g.view().input_len, 0);

        let mut revealed = vec![g.active_cell().unwrap()];
        revealed.extend(run_timers(&mut g, effects));
        assert_eq!(revealed, g.sequence());
        assert_eq!(g.phase(), RecallPhase::AwaitingInput);
        assert_eq!(g.message(), "Now Your Turn");
    }

    #[test]
    fn sequence_length_tracks_level_through_completion() {
        let mut g = SequenceRecallGame::new(77);
        let mut effects = g.start();
        let mut completions = 0;

        for level in 1..=MAX_LEVEL {
            run_timers(&mut g, effects);
            assert_eq!(g.phase(), RecallPhase::AwaitingInput);
            assert_eq!(g.level(), level);
            assert_eq!(g.sequence().len(), level as usize);
            assert!(g.sequence().iter().all(|&c| c < GRID_SIZE));

            effects = Vec::new();
            for c in g.sequence().to_vec() {
                effects = g.click(c);
            }
            completions += effects
                .iter()
                .filter(|e| matches!(e, Effect::RecordCompletion(Region::Temporal)))
                .count();
            if level < MAX_LEVEL {
                assert_eq!(g.message(), format!("Success. Calibrating Level {}...", level + 1));
            }
        }

        assert!(g.is_complete());
        assert_eq!(g.level(), MAX_LEVEL + 1);
        assert_eq!(completions, 1);
        assert_eq!(g.message(), "Temporal Lobe Calibrated ✨");

        // Terminal: start and clicks are ignored.
        assert!(g.start().is_empty());
        assert!(g.click(0).is_empty());
    }

    #[test]
    fn wrong_cell_at_level_three_resets_everything() {
        let mut g = SequenceRecallGame::new(1);
        g.sequence = vec![2, 5, 1];
        g.level = 3;
        g.phase = RecallPhase::AwaitingInput;

        assert!(g.click(2).is_empty());
        assert!(g.click(5).is_empty());
        assert_eq!(g.level(), 3);

        assert!(g.click(9).is_empty());
        assert_eq!(g.level(), 1);
        assert!(g.sequence().is_empty());
        assert_eq!(g.phase(), RecallPhase::Failed);
        assert_eq!(g.message(), "Calibration Failed. Resetting Neurons.");

        // Further clicks do nothing until the player starts again.
        assert!(g.click(2).is_empty());
        assert_eq!(g.stats.incorrect, 1);
    }

    #[test]
    fn mistake_at_any_position_resets() {
        for wrong_at in 0..4 {
            let mut g = SequenceRecallGame::new(9);
            g.sequence = vec![0, 1, 2, 3];
            g.level = 4;
            g.phase = RecallPhase::AwaitingInput;

            for (i, &c) in [0usize, 1, 2, 3].iter().enumerate() {
                let cell = if i == wrong_at { (c + 1) % GRID_SIZE } else { c };
                g.click(cell);
                if i == wrong_at {
                    break;
                }
            }
            assert_eq!(g.level(), 1);
            assert!(g.sequence().is_empty());
        }
    }

    #[test]
    fn restart_discards_stale_timers() {
        let mut g = SequenceRecallGame::new(3);
        let first = g.start();
        let Effect::Schedule { timer: stale, .. } = first[0] else {
            panic!("expected a timer");
        };
        let _ = g.start();

        assert!(g.on_timer(stale).is_empty());
        assert_eq!(g.phase(), RecallPhase::Starting);
        assert!(g.sequence().is_empty());
    }
}
