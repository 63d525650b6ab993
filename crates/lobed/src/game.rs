//! The mounted mini-game and the player actions routed to it.
//!
//! Game logic lives in `crates/shared/lobe_games`; this module only maps
//! regions and protocol actions onto those state machines.

use lobe_games::arithmetic::{ArithmeticQuiz, ArithmeticView};
use lobe_games::matching::{MatchingGame, MatchingView};
use lobe_games::recall::{RecallView, SequenceRecallGame};
use lobe_games::target::{TargetClickGame, TargetView};
use lobe_games::tracing_session::{ShapeTracingSession, TracingView};
use lobe_games::{Effect, Region, Timer};
use serde::Serialize;

#[derive(Debug)]
pub enum ActiveGame {
    Arithmetic(ArithmeticQuiz),
    Recall(SequenceRecallGame),
    Matching(MatchingGame),
    Target(TargetClickGame),
    Tracing(ShapeTracingSession),
}

/// Snapshot of the mounted game for clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "region", rename_all = "lowercase")]
pub enum GameView {
    Prefrontal(ArithmeticView),
    Temporal(RecallView),
    Occipital(MatchingView),
    Cerebellum(TargetView),
    Parietal(TracingView),
}

/// Player input, already decoded from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameAction {
    Submit(String),
    RecallStart,
    RecallClick(usize),
    Flip(usize),
    MatchingRestart,
    TargetStart,
    TargetClick,
}

impl GameAction {
    /// The region whose game understands this action.
    pub fn region(&self) -> Region {
        match self {
            GameAction::Submit(_) => Region::Prefrontal,
            GameAction::RecallStart | GameAction::RecallClick(_) => Region::Temporal,
            GameAction::Flip(_) | GameAction::MatchingRestart => Region::Occipital,
            GameAction::TargetStart | GameAction::TargetClick => Region::Cerebellum,
        }
    }
}

impl ActiveGame {
    pub fn new(region: Region, seed: u64) -> Self {
        match region {
            Region::Prefrontal => ActiveGame::Arithmetic(ArithmeticQuiz::new(seed)),
            Region::Temporal => ActiveGame::Recall(SequenceRecallGame::new(seed)),
            Region::Occipital => ActiveGame::Matching(MatchingGame::new(seed)),
            Region::Cerebellum => ActiveGame::Target(TargetClickGame::new(seed)),
            Region::Parietal => ActiveGame::Tracing(ShapeTracingSession::new()),
        }
    }

    pub fn region(&self) -> Region {
        match self {
            ActiveGame::Arithmetic(_) => Region::Prefrontal,
            ActiveGame::Recall(_) => Region::Temporal,
            ActiveGame::Matching(_) => Region::Occipital,
            ActiveGame::Target(_) => Region::Cerebellum,
            ActiveGame::Tracing(_) => Region::Parietal,
        }
    }

    pub fn is_complete(&self) -> bool {
        match self {
            ActiveGame::Arithmetic(g) => g.is_complete(),
            ActiveGame::Recall(g) => g.is_complete(),
            ActiveGame::Matching(g) => g.is_complete(),
            ActiveGame::Target(g) => g.is_complete(),
            ActiveGame::Tracing(g) => g.is_complete(),
        }
    }

    pub fn on_timer(&mut self, timer: Timer) -> Vec<Effect> {
        match self {
            ActiveGame::Arithmetic(g) => g.on_timer(timer),
            ActiveGame::Recall(g) => g.on_timer(timer),
            ActiveGame::Matching(g) => g.on_timer(timer),
            ActiveGame::Tracing(g) => g.on_timer(timer),
            // The target game has no timers.
            ActiveGame::Target(_) => Vec::new(),
        }
    }

    /// Route a player action to the game. Fails if this game doesn't take it.
    pub fn apply(&mut self, action: GameAction) -> Result<Vec<Effect>, String> {
        let effects = match (self, action) {
            (ActiveGame::Arithmetic(g), GameAction::Submit(answer)) => g.submit_answer(&answer),
            (ActiveGame::Recall(g), GameAction::RecallStart) => g.start(),
            (ActiveGame::Recall(g), GameAction::RecallClick(index)) => g.click(index),
            (ActiveGame::Matching(g), GameAction::Flip(index)) => g.flip(index),
            (ActiveGame::Matching(g), GameAction::MatchingRestart) => {
                g.restart();
                Vec::new()
            }
            (ActiveGame::Target(g), GameAction::TargetStart) => {
                g.start();
                Vec::new()
            }
            (ActiveGame::Target(g), GameAction::TargetClick) => g.click(),
            (game, action) => {
                return Err(format!(
                    "{} is not mounted (current game: {})",
                    action.region().title(),
                    game.region().title()
                ))
            }
        };
        Ok(effects)
    }

    pub fn view(&self) -> GameView {
        match self {
            ActiveGame::Arithmetic(g) => GameView::Prefrontal(g.view()),
            ActiveGame::Recall(g) => GameView::Temporal(g.view()),
            ActiveGame::Matching(g) => GameView::Occipital(g.view()),
            ActiveGame::Target(g) => GameView::Cerebellum(g.view()),
            ActiveGame::Tracing(g) => GameView::Parietal(g.view()),
        }
    }
}
