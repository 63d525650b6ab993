use crate::latch::OnceLatch;
use crate::prng::Prng;
use crate::stats::GameStats;
use crate::{Effect, Region, Timer, TimerKind};
use core::time::Duration;
use serde::Serialize;

/// How long a mismatched pair stays face-up.
pub const MISMATCH_REVERT: Duration = Duration::from_millis(1000);

/// `(pair key, image)` for each pair in the deck.
pub const PAIRS: [(&str, &str); 4] = [
    ("TwelveLabs", "/sponsors/twelvelabs.png"),
    ("Backboard", "/sponsors/backboard.png"),
    ("Valkey", "/sponsors/valkey.avif"),
    ("AWS", "/sponsors/aws.png"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tile {
    pub id: u32,
    pub pair_key: String,
    pub image_ref: String,
    pub matched: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TileView {
    pub id: u32,
    /// `None` while face-down.
    pub pair_key: Option<String>,
    pub image_ref: Option<String>,
    pub face_up: bool,
    pub matched: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchingView {
    pub tiles: Vec<TileView>,
    pub completed: bool,
    pub stats: GameStats,
}

fn build_deck(rng: &mut Prng) -> Vec<Tile> {
    let mut deck: Vec<Tile> = PAIRS
        .iter()
        .enumerate()
        .flat_map(|(i, (key, image))| {
            (0..2).map(move |k| Tile {
                id: (i * 2 + k) as u32,
                pair_key: key.to_string(),
                image_ref: image.to_string(),
                matched: false,
            })
        })
        .collect();
    rng.shuffle(&mut deck);
    deck
}

/// Memory pairs over a shuffled deck of eight tiles.
#[derive(Debug)]
pub struct MatchingGame {
    rng: Prng,
    tiles: Vec<Tile>,
    // Indices of face-up, unmatched tiles (at most two).
    flipped: Vec<usize>,
    completed: bool,
    epoch: u32,
    completion: OnceLatch,
    pub stats: GameStats,
}

impl MatchingGame {
    pub fn new(seed: u64) -> Self {
        let mut rng = Prng::new(seed);
        let tiles = build_deck(&mut rng);
        Self {
            rng,
            tiles,
            flipped: Vec::with_capacity(2),
            completed: false,
            epoch: 0,
            completion: OnceLatch::new(),
            stats: GameStats::new(),
        }
    }

    /// Turn tile `index` face-up.
    ///
    /// No-op while a pair is already showing, or when the tile is face-up,
    /// matched, or out of range.
    pub fn flip(&mut self, index: usize) -> Vec<Effect> {
        if self.completed
            || self.flipped.len() == 2
            || self.flipped.contains(&index)
            || self.tiles.get(index).is_none_or(|t| t.matched)
        {
            return Vec::new();
        }

        self.flipped.push(index);
        if self.flipped.len() < 2 {
            return Vec::new();
        }

        let (first, second) = (self.flipped[0], self.flipped[1]);
        let is_match = self.tiles[first].pair_key == self.tiles[second].pair_key;
        self.stats.record_trial(is_match);

        if !is_match {
            return vec![Effect::schedule(
                MISMATCH_REVERT,
                TimerKind::RevertFlip,
                self.epoch,
            )];
        }

        self.tiles[first].matched = true;
        self.tiles[second].matched = true;
        self.flipped.clear();

        let mut effects = Vec::new();
        if self.tiles.iter().all(|t| t.matched) {
            self.completed = true;
            if self.completion.fire() {
                effects.push(Effect::RecordCompletion(Region::Occipital));
            }
        }
        effects
    }

    pub fn on_timer(&mut self, timer: Timer) -> Vec<Effect> {
        if timer.kind == TimerKind::RevertFlip && timer.epoch == self.epoch {
            self.flipped.clear();
        }
        Vec::new()
    }

    /// Deal a freshly shuffled deck and start a new session.
    pub fn restart(&mut self) {
        self.tiles = build_deck(&mut self.rng);
        self.flipped.clear();
        self.completed = false;
        self.completion.reset();
        self.stats = GameStats::new();
        self.epoch = self.epoch.wrapping_add(1);
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn face_up(&self) -> &[usize] {
        &self.flipped
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn view(&self) -> MatchingView {
        let tiles = self
            .tiles
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let face_up = t.matched || self.flipped.contains(&i);
                TileView {
                    id: t.id,
                    pair_key: face_up.then(|| t.pair_key.clone()),
                    image_ref: face_up.then(|| t.image_ref.clone()),
                    face_up,
                    matched: t.matched,
                }
            })
            .collect();

        MatchingView {
            tiles,
            completed: self.completed,
            stats: self.stats.clone(),
        }
    }
}
