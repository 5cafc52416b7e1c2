//! Squat, counted when the hips come level with the knees.
//!
//! A rep counts the moment `|hip_y - knee_y|` drops under `level`, after which
//! counting is locked until the hips rise more than `reset` away again.

use super::{AdviceKind, Step};
use crate::pose::{KeypointKind, PoseFrame};

pub const JOINTS: [KeypointKind; 8] = [
    KeypointKind::LeftShoulder,
    KeypointKind::RightShoulder,
    KeypointKind::LeftHip,
    KeypointKind::RightHip,
    KeypointKind::LeftKnee,
    KeypointKind::RightKnee,
    KeypointKind::LeftAnkle,
    KeypointKind::RightAnkle,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub level: f32,
    pub reset: f32,
    pub narrow: f32,
    pub wide: f32,
    pub lean: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            level: 0.02,
            reset: 0.05,
            narrow: 0.8,
            wide: 1.5,
            lean: 0.10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Countable,
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Squat {
    thresholds: Thresholds,
    phase: Phase,
}

impl Squat {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            phase: Phase::Countable,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn form(&self, frame: &PoseFrame) -> Option<AdviceKind> {
        use KeypointKind::*;

        let t = &self.thresholds;
        let shoulder_span = frame.span(LeftShoulder, RightShoulder);
        let foot_span = frame.span(LeftAnkle, RightAnkle);
        let (shoulder_x, _) = frame.midpoint(LeftShoulder, RightShoulder);
        let (knee_x, _) = frame.midpoint(LeftKnee, RightKnee);
        let (ankle_x, _) = frame.midpoint(LeftAnkle, RightAnkle);

        if foot_span < shoulder_span * t.narrow {
            Some(AdviceKind::FeetTooNarrow)
        } else if foot_span > shoulder_span * t.wide {
            Some(AdviceKind::FeetTooWide)
        } else if knee_x - ankle_x > t.lean {
            Some(AdviceKind::LeanBack)
        } else if shoulder_x - knee_x > t.lean {
            Some(AdviceKind::LeanForward)
        } else {
            None
        }
    }

    pub(super) fn step(&mut self, frame: &PoseFrame) -> Step {
        use KeypointKind::*;

        let (_, hip_y) = frame.midpoint(LeftHip, RightHip);
        let (_, knee_y) = frame.midpoint(LeftKnee, RightKnee);
        let depth = (hip_y - knee_y).abs();

        let rep_completed = match self.phase {
            Phase::Countable if depth < self.thresholds.level => {
                self.phase = Phase::Locked;
                true
            }
            Phase::Locked if depth > self.thresholds.reset => {
                self.phase = Phase::Countable;
                false
            }
            _ => false,
        };

        Step {
            rep_completed,
            violation: self.form(frame),
        }
    }
}
