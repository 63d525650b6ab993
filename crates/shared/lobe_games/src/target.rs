use crate::latch::OnceLatch;
use crate::prng::Prng;
use crate::{Effect, Region};
use serde::Serialize;

pub const TOTAL_CLICKS: u32 = 5;

/// Accuracy score sent to the report generator. Every target is hit by
/// construction, so the scan always reports full accuracy.
pub const REPORT_ACCURACY: u32 = 100;

pub const FALLBACK_REPORT: &str = "Scan complete. System stabilized under the Carolina haze.";

// Screen-safe placement, in percent of the play area.
const TOP_MIN: u32 = 15;
const TOP_SPAN: u32 = 75;
const LEFT_MIN: u32 = 10;
const LEFT_SPAN: u32 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetPosition {
    pub top_pct: u32,
    pub left_pct: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPhase {
    Idle,
    Testing,
    AwaitingReport,
    Reported,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetView {
    pub phase: TargetPhase,
    pub position: TargetPosition,
    pub clicks_remaining: u32,
    pub pulse: u32,
    pub total_clicks: u32,
    pub report: Option<String>,
}

/// Motor-coordination scan: hit a target that jumps around `TOTAL_CLICKS`
/// times, then show a generated report.
#[derive(Debug)]
pub struct TargetClickGame {
    rng: Prng,
    phase: TargetPhase,
    position: TargetPosition,
    clicks_remaining: u32,
    report: Option<String>,
    epoch: u32,
    completion: OnceLatch,
}

impl TargetClickGame {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Prng::new(seed),
            phase: TargetPhase::Idle,
            position: TargetPosition {
                top_pct: 50,
                left_pct: 50,
            },
            clicks_remaining: TOTAL_CLICKS,
            report: None,
            epoch: 0,
            completion: OnceLatch::new(),
        }
    }

    /// Start a scan, or re-test after a report. Ignored mid-scan.
    pub fn start(&mut self) {
        if matches!(
            self.phase,
            TargetPhase::Testing | TargetPhase::AwaitingReport
        ) {
            return;
        }
        self.phase = TargetPhase::Testing;
        self.clicks_remaining = TOTAL_CLICKS;
        self.report = None;
        self.completion.reset();
        self.epoch = self.epoch.wrapping_add(1);
        self.move_target();
    }

    fn move_target(&mut self) {
        self.position = TargetPosition {
            top_pct: self.rng.gen_range_u32(TOP_MIN, TOP_MIN + TOP_SPAN),
            left_pct: self.rng.gen_range_u32(LEFT_MIN, LEFT_MIN + LEFT_SPAN),
        };
    }

    /// A hit on the current target.
    pub fn click(&mut self) -> Vec<Effect> {
        if self.phase != TargetPhase::Testing {
            return Vec::new();
        }

        self.clicks_remaining = self.clicks_remaining.saturating_sub(1);
        if self.clicks_remaining > 0 {
            self.move_target();
            return Vec::new();
        }

        self.phase = TargetPhase::AwaitingReport;
        let mut effects = vec![Effect::RequestReport {
            accuracy: REPORT_ACCURACY,
            epoch: self.epoch,
        }];
        if self.completion.fire() {
            effects.push(Effect::RecordCompletion(Region::Cerebellum));
        }
        effects
    }

    /// Deliver the report generator's answer for the scan started at `epoch`.
    ///
    /// A failed or empty report is replaced by [`FALLBACK_REPORT`].
    pub fn on_report<E>(&mut self, epoch: u32, result: Result<String, E>) {
        if epoch != self.epoch || self.phase != TargetPhase::AwaitingReport {
            return;
        }
        let text = match result {
            Ok(text) if !text.trim().is_empty() => text,
            _ => FALLBACK_REPORT.to_string(),
        };
        self.report = Some(text);
        self.phase = TargetPhase::Reported;
    }

    pub fn phase(&self) -> TargetPhase {
        self.phase
    }

    pub fn position(&self) -> TargetPosition {
        self.position
    }

    pub fn clicks_remaining(&self) -> u32 {
        self.clicks_remaining
    }

    pub fn report(&self) -> Option<&str> {
        self.report.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        matches!(
            self.phase,
            TargetPhase::AwaitingReport | TargetPhase::Reported
        )
    }

    /// 1-based number of the target currently shown.
    pub fn pulse(&self) -> u32 {
        (TOTAL_CLICKS - self.clicks_remaining + 1).min(TOTAL_CLICKS)
    }

    pub fn view(&self) -> TargetView {
        TargetView {
            phase: self.phase,
            position: self.position,
            clicks_remaining: self.clicks_remaining,
            pulse: self.pulse(),
            total_clicks: TOTAL_CLICKS,
            report: self.report.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_requests(effects: &[Effect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, Effect::RequestReport { .. }))
            .count()
    }

    #[test]
    fn clicks_before_start_are_ignored() {
        let mut g = TargetClickGame::new(1);
        assert!(g.click().is_empty());
        assert_eq!(g.clicks_remaining(), TOTAL_CLICKS);
        assert_eq!(g.phase(), TargetPhase::Idle);
    }

    #[test]
    fn target_stays_in_safe_region() {
        let mut g = TargetClickGame::new(2024);
        for _ in 0..200 {
            g.start();
            for _ in 0..TOTAL_CLICKS - 1 {
                let p = g.position();
                assert!((15..90).contains(&p.top_pct), "{p:?}");
                assert!((10..90).contains(&p.left_pct), "{p:?}");
                g.click();
            }
            g.click();
            g.on_report::<()>(g.epoch, Ok("ok".to_string()));
        }
    }

    #[test]
    fn five_clicks_request_exactly_one_report() {
        let mut g = TargetClickGame::new(5);
        g.start();
        let mut requests = 0;
        let mut completions = 0;
        for i in 0..TOTAL_CLICKS {
            assert_eq!(g.pulse(), i + 1);
            let effects = g.click();
            requests += report_requests(&effects);
            completions += effects
                .iter()
                .filter(|e| matches!(e, Effect::RecordCompletion(Region::Cerebellum)))
                .count();
        }
        assert_eq!(requests, 1);
        assert_eq!(completions, 1);
        assert_eq!(g.phase(), TargetPhase::AwaitingReport);

        // Extra clicks after the scan do nothing.
        assert!(g.click().is_empty());
        assert!(g.is_complete());
    }

    #[test]
    fn report_text_is_shown_verbatim() {
        let mut g = TargetClickGame::new(6);
        g.start();
        let mut effects = Vec::new();
        for _ in 0..TOTAL_CLICKS {
            effects = g.click();
        }
        let Some(Effect::RequestReport { accuracy, epoch }) = effects.first().cloned() else {
            panic!("expected a report request");
        };
        assert_eq!(accuracy, REPORT_ACCURACY);

        g.on_report::<()>(epoch, Ok("The hands never lie.".to_string()));
        assert_eq!(g.report(), Some("The hands never lie."));
        assert_eq!(g.phase(), TargetPhase::Reported);
    }

    #[test]
    fn failed_report_falls_back() {
        let mut g = TargetClickGame::new(7);
        g.start();
        for _ in 0..TOTAL_CLICKS {
            g.click();
        }
        g.on_report(g.epoch, Err("service unavailable"));
        assert_eq!(g.report(), Some(FALLBACK_REPORT));
        assert!(!FALLBACK_REPORT.is_empty());
    }

    #[test]
    fn report_for_previous_scan_is_discarded() {
        let mut g = TargetClickGame::new(8);
        g.start();
        for _ in 0..TOTAL_CLICKS {
            g.click();
        }
        let old_epoch = g.epoch;
        g.on_report::<()>(old_epoch, Ok(String::new()));
        assert_eq!(g.report(), Some(FALLBACK_REPORT));

        // Re-test, then a late duplicate answer for the old scan arrives.
        g.start();
        g.on_report::<()>(old_epoch, Ok("late".to_string()));
        assert_eq!(g.report(), None);
        assert_eq!(g.phase(), TargetPhase::Testing);
    }
}
