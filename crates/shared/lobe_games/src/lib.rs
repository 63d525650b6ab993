//! Turn-based mini-games for the five brain regions.
//!
//! Every game here is a synchronous state machine. Transitions never sleep or
//! perform I/O; instead they return [`Effect`]s which the hosting runtime
//! executes (timers, completion calls, report requests, recognition resets).

use core::time::Duration;
use serde::{Deserialize, Serialize};

pub mod arithmetic;
pub mod latch;
pub mod matching;
pub mod prng;
pub mod recall;
pub mod region;
pub mod stats;
pub mod target;
pub mod tracing_session;

pub use region::Region;

/// Which delayed transition a [`Timer`] drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerKind {
    /// Arithmetic: replace the solved problem.
    NextProblem,
    /// Recall: extend the sequence and begin playback.
    NextLevel,
    /// Recall: advance the playback highlight.
    PlaybackStep,
    /// Matching: turn a mismatched pair face-down again.
    RevertFlip,
    /// Tracing: ask the recognizer for a new target shape.
    ShapeReset,
}

/// A delayed transition request.
///
/// `epoch` is the game's round counter at scheduling time; a game ignores a
/// timer whose epoch no longer matches (the round was restarted meanwhile).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    pub kind: TimerKind,
    pub epoch: u32,
}

/// Side effects requested by a game transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Call the game's `on_timer` with `timer` once `after` has elapsed.
    Schedule { after: Duration, timer: Timer },
    /// Record that the region was completed for the current user.
    RecordCompletion(Region),
    /// Ask the report generator for a text report for this accuracy score.
    RequestReport { accuracy: u32, epoch: u32 },
    /// Ask the recognizer for a new target shape.
    ResetShape,
    /// Stop emitting frames and release the camera.
    StopCapture,
}

impl Effect {
    pub fn schedule(after: Duration, kind: TimerKind, epoch: u32) -> Self {
        Effect::Schedule {
            after,
            timer: Timer { kind, epoch },
        }
    }
}
