use crate::latch::OnceLatch;
use crate::{Effect, Region, Timer, TimerKind};
use core::time::Duration;
use serde::{Deserialize, Serialize};

pub const REQUIRED_SHAPES: usize = 3;

/// Cadence at which the runtime offers camera frames to the recognizer.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Pause between a completed shape and the request for the next one.
pub const RESET_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeStatus {
    Completed,
    /// Any status other than `completed` means the shape is still being traced.
    #[serde(other)]
    InProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TracingPhase {
    Connecting,
    Tracing,
    CameraDenied,
    /// Recognizer unreachable or hung up; inert until remounted.
    Disconnected,
    Complete,
}

#[derive(Debug, Clone, Serialize)]
pub struct TracingView {
    pub phase: TracingPhase,
    pub message: String,
    pub completed_shapes: Vec<String>,
    pub required_shapes: usize,
    pub current_shape: Option<String>,
    pub last_image: Option<String>,
}

/// Progress of a camera shape-tracing session.
///
/// The recognizer decides what shape to draw and when it is done; this type
/// only tracks which distinct shapes have been completed and what to ask the
/// recognizer next.
#[derive(Debug)]
pub struct ShapeTracingSession {
    // Insertion-ordered set.
    completed: Vec<String>,
    current_shape: Option<String>,
    last_image: Option<String>,
    message: String,
    phase: TracingPhase,
    epoch: u32,
    completion: OnceLatch,
}

impl Default for ShapeTracingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ShapeTracingSession {
    pub fn new() -> Self {
        Self {
            completed: Vec::with_capacity(REQUIRED_SHAPES),
            current_shape: None,
            last_image: None,
            message: "Initializing camera...".to_string(),
            phase: TracingPhase::Connecting,
            epoch: 0,
            completion: OnceLatch::new(),
        }
    }

    pub fn on_connected(&mut self) {
        if self.phase == TracingPhase::Connecting {
            self.phase = TracingPhase::Tracing;
            self.message = "Connected. Draw the shapes!".to_string();
        }
    }

    /// The camera could not be opened. The session stays inert until remounted.
    pub fn on_camera_denied(&mut self) {
        if self.phase != TracingPhase::Complete {
            self.phase = TracingPhase::CameraDenied;
            self.message = "Error: Webcam access denied.".to_string();
        }
    }

    /// The recognizer could not be reached or closed the channel.
    ///
    /// Returns `true` if the session left an active phase.
    pub fn on_disconnected(&mut self) -> bool {
        if !matches!(self.phase, TracingPhase::Connecting | TracingPhase::Tracing) {
            return false;
        }
        self.phase = TracingPhase::Disconnected;
        self.message = "Error: Shape recognizer unavailable.".to_string();
        true
    }

    /// Whether the runtime should keep emitting frames.
    pub fn wants_frame(&self) -> bool {
        self.phase == TracingPhase::Tracing
    }

    pub fn on_frame_result(
        &mut self,
        image: String,
        shape_name: &str,
        status: ShapeStatus,
    ) -> Vec<Effect> {
        if matches!(
            self.phase,
            TracingPhase::Complete | TracingPhase::CameraDenied | TracingPhase::Disconnected
        ) {
            return Vec::new();
        }
        self.last_image = Some(image);

        if self.completed.iter().any(|s| s == shape_name) {
            // The recognizer sometimes repeats a finished shape; skip it.
            self.message = format!("Skipping {shape_name} (already done)...");
            return vec![Effect::ResetShape];
        }

        self.current_shape = Some(shape_name.to_string());
        match status {
            ShapeStatus::InProgress => {
                self.message = format!(
                    "Draw a {shape_name} ({}/{REQUIRED_SHAPES})",
                    self.completed.len()
                );
                Vec::new()
            }
            ShapeStatus::Completed => {
                self.completed.push(shape_name.to_string());
                if self.completed.len() < REQUIRED_SHAPES {
                    self.message = format!("Correct! You drew a {shape_name}. fetching next...");
                    return vec![Effect::schedule(
                        RESET_DELAY,
                        TimerKind::ShapeReset,
                        self.epoch,
                    )];
                }

                self.phase = TracingPhase::Complete;
                self.message = format!("{} Activated! All shapes completed.", Region::Parietal.title());
                let mut effects = vec![Effect::StopCapture];
                if self.completion.fire() {
                    effects.push(Effect::RecordCompletion(Region::Parietal));
                }
                effects
            }
        }
    }

    pub fn on_timer(&mut self, timer: Timer) -> Vec<Effect> {
        if timer.kind == TimerKind::ShapeReset
            && timer.epoch == self.epoch
            && self.phase == TracingPhase::Tracing
        {
            return vec![Effect::ResetShape];
        }
        Vec::new()
    }

    pub fn completed_shapes(&self) -> &[String] {
        &self.completed
    }

    pub fn phase(&self) -> TracingPhase {
        self.phase
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_complete(&self) -> bool {
        self.phase == TracingPhase::Complete
    }

    pub fn view(&self) -> TracingView {
        TracingView {
            phase: self.phase,
            message: self.message.clone(),
            completed_shapes: self.completed.clone(),
            required_shapes: REQUIRED_SHAPES,
            current_shape: self.current_shape.clone(),
            last_image: self.last_image.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> ShapeTracingSession {
        let mut s = ShapeTracingSession::new();
        s.on_connected();
        s
    }

    fn frame(s: &mut ShapeTracingSession, shape: &str, status: ShapeStatus) -> Vec<Effect> {
        s.on_frame_result(format!("data:{shape}"), shape, status)
    }

    #[test]
    fn status_parses_unknown_values_as_in_progress() {
        let done: ShapeStatus = serde_json::from_str("\"completed\"").unwrap();
        let busy: ShapeStatus = serde_json::from_str("\"in_progress\"").unwrap();
        let other: ShapeStatus = serde_json::from_str("\"tracking\"").unwrap();
        assert_eq!(done, ShapeStatus::Completed);
        assert_eq!(busy, ShapeStatus::InProgress);
        assert_eq!(other, ShapeStatus::InProgress);
    }

    #[test]
    fn frames_flow_only_while_tracing() {
        let mut s = ShapeTracingSession::new();
        assert!(!s.wants_frame());
        s.on_connected();
        assert!(s.wants_frame());
        assert_eq!(s.message(), "Connected. Draw the shapes!");
    }

    #[test]
    fn in_progress_updates_prompt() {
        let mut s = connected();
        assert!(frame(&mut s, "circle", ShapeStatus::InProgress).is_empty());
        assert_eq!(s.message(), "Draw a circle (0/3)");
        assert_eq!(s.view().last_image.as_deref(), Some("data:circle"));
    }

    #[test]
    fn new_completion_schedules_reset() {
        let mut s = connected();
        let effects = frame(&mut s, "circle", ShapeStatus::Completed);
        let [Effect::Schedule { after, timer }] = effects.as_slice() else {
            panic!("expected delayed reset, got {effects:?}");
        };
        assert_eq!(*after, RESET_DELAY);
        assert_eq!(s.completed_shapes(), &["circle".to_string()]);
        assert_eq!(s.message(), "Correct! You drew a circle. fetching next...");
        assert_eq!(s.on_timer(*timer), vec![Effect::ResetShape]);
    }

    #[test]
    fn duplicate_completion_resets_immediately_without_counting() {
        let mut s = connected();
        frame(&mut s, "circle", ShapeStatus::Completed);
        let effects = frame(&mut s, "circle", ShapeStatus::Completed);
        assert_eq!(effects, vec![Effect::ResetShape]);
        assert_eq!(s.completed_shapes().len(), 1);
        assert_eq!(s.message(), "Skipping circle (already done)...");

        // Same for an in-progress report of a finished shape.
        let effects = frame(&mut s, "circle", ShapeStatus::InProgress);
        assert_eq!(effects, vec![Effect::ResetShape]);
        assert_eq!(s.completed_shapes().len(), 1);
    }

    #[test]
    fn three_distinct_shapes_complete_the_session() {
        let mut s = connected();
        frame(&mut s, "circle", ShapeStatus::Completed);
        frame(&mut s, "square", ShapeStatus::Completed);
        let effects = frame(&mut s, "triangle", ShapeStatus::Completed);

        assert_eq!(
            effects,
            vec![Effect::StopCapture, Effect::RecordCompletion(Region::Parietal)]
        );
        assert!(s.is_complete());
        assert!(!s.wants_frame());
        assert_eq!(s.message(), "Parietal Lobe Activated! All shapes completed.");

        // Terminal: nothing more is counted or reset.
        assert!(frame(&mut s, "star", ShapeStatus::Completed).is_empty());
        assert_eq!(s.completed_shapes().len(), REQUIRED_SHAPES);
    }

    #[test]
    fn completed_set_never_exceeds_limit_or_repeats() {
        let shapes = ["circle", "square", "circle", "triangle", "square", "star", "hexagon"];
        let mut s = connected();
        for shape in shapes.iter().cycle().take(40) {
            frame(&mut s, shape, ShapeStatus::Completed);
            let done = s.completed_shapes();
            assert!(done.len() <= REQUIRED_SHAPES);
            for (i, a) in done.iter().enumerate() {
                assert!(!done[i + 1..].contains(a));
            }
        }
        assert!(s.is_complete());
    }

    #[test]
    fn camera_denied_is_persistent() {
        let mut s = ShapeTracingSession::new();
        s.on_camera_denied();
        s.on_connected();
        assert_eq!(s.phase(), TracingPhase::CameraDenied);
        assert_eq!(s.message(), "Error: Webcam access denied.");
        assert!(!s.wants_frame());
        assert!(frame(&mut s, "circle", ShapeStatus::Completed).is_empty());
    }

    #[test]
    fn losing_the_recognizer_stops_tracing() {
        let mut s = connected();
        frame(&mut s, "circle", ShapeStatus::Completed);
        assert!(s.on_disconnected());
        assert_eq!(s.phase(), TracingPhase::Disconnected);
        assert_eq!(s.message(), "Error: Shape recognizer unavailable.");
        assert!(!s.wants_frame());

        // Late results and reset timers are ignored.
        assert!(frame(&mut s, "square", ShapeStatus::Completed).is_empty());
        assert_eq!(s.completed_shapes().len(), 1);
        assert!(!s.on_disconnected());
    }

    #[test]
    fn disconnect_before_connecting_and_after_completion() {
        let mut s = ShapeTracingSession::new();
        assert!(s.on_disconnected());
        s.on_connected();
        assert_eq!(s.phase(), TracingPhase::Disconnected);

        let mut s = connected();
        for shape in ["circle", "square", "triangle"] {
            frame(&mut s, shape, ShapeStatus::Completed);
        }
        assert!(!s.on_disconnected());
        assert!(s.is_complete());
    }
}
