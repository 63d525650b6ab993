use serde::Serialize;

/// Attempt counters for one game session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GameStats {
    pub correct: u32,
    pub incorrect: u32,
    pub attempts: u32,
}

impl GameStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_trial(&mut self, is_correct: bool) {
        if is_correct {
            self.correct += 1;
        } else {
            self.incorrect += 1;
        }
        self.attempts += 1;
    }

    /// Fraction of correct attempts; 0 before the first attempt.
    pub fn accuracy(&self) -> f32 {
        if self.attempts == 0 {
            0.0
        } else {
            self.correct as f32 / self.attempts as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_tracks_trials() {
        let mut s = GameStats::new();
        assert_eq!(s.accuracy(), 0.0);
        s.record_trial(true);
        s.record_trial(false);
        s.record_trial(true);
        s.record_trial(true);
        assert_eq!(s.attempts, 4);
        assert_eq!(s.incorrect, 1);
        assert!((s.accuracy() - 0.75).abs() < 1e-6);
    }
}
