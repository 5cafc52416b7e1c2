//! Push-up, tracked by the distance from the shoulder midpoint to the wrist
//! midpoint. The body dropping close to the hands arms a rep; pushing back up
//! past `up_dist` completes it.

use super::{AdviceKind, Step};
use crate::pose::{KeypointKind, PoseFrame};

pub const JOINTS: [KeypointKind; 4] = [
    KeypointKind::LeftShoulder,
    KeypointKind::RightShoulder,
    KeypointKind::LeftWrist,
    KeypointKind::RightWrist,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub down_dist: f32,
    pub up_dist: f32,
    /// Wrist span below this multiple of shoulder span is too narrow.
    pub narrow: f32,
    /// Wrist span above this multiple of shoulder span is too wide.
    pub wide: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            down_dist: 0.15,
            up_dist: 0.30,
            narrow: 0.6,
            wide: 1.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Up,
    GoingDown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PushUp {
    thresholds: Thresholds,
    phase: Phase,
}

impl PushUp {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            phase: Phase::Up,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(super) fn step(&mut self, frame: &PoseFrame) -> Step {
        use KeypointKind::*;

        let shoulder_span = frame.span(LeftShoulder, RightShoulder);
        let wrist_span = frame.span(LeftWrist, RightWrist);
        let violation = if wrist_span < shoulder_span * self.thresholds.narrow {
            Some(AdviceKind::HandsTooNarrow)
        } else if wrist_span > shoulder_span * self.thresholds.wide {
            Some(AdviceKind::HandsTooWide)
        } else {
            None
        };

        let (shoulder_x, shoulder_y) = frame.midpoint(LeftShoulder, RightShoulder);
        let (wrist_x, wrist_y) = frame.midpoint(LeftWrist, RightWrist);
        let dist = (wrist_x - shoulder_x).hypot(wrist_y - shoulder_y);

        if dist < self.thresholds.down_dist {
            self.phase = Phase::GoingDown;
        }
        let rep_completed = self.phase == Phase::GoingDown && dist > self.thresholds.up_dist;
        if rep_completed {
            self.phase = Phase::Up;
        }

        Step {
            rep_completed,
            violation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Phase, PushUp, Thresholds};
    use crate::{
        exercise::AdviceKind,
        pose::{Keypoint, KeypointKind, PoseFrame, NUM_KEYPOINTS},
    };

    fn plank(drop: f32, wrist_half_span: f32) -> PoseFrame {
        let mut keypoints = [Keypoint {
            x: 0.5,
            y: 0.5,
            score: 0.9,
        }; NUM_KEYPOINTS];
        keypoints[KeypointKind::LeftShoulder.idx()].x = 0.4;
        keypoints[KeypointKind::RightShoulder.idx()].x = 0.6;
        keypoints[KeypointKind::LeftWrist.idx()].x = 0.5 - wrist_half_span;
        keypoints[KeypointKind::RightWrist.idx()].x = 0.5 + wrist_half_span;
        keypoints[KeypointKind::LeftWrist.idx()].y = 0.5 + drop;
        keypoints[KeypointKind::RightWrist.idx()].y = 0.5 + drop;
        PoseFrame::new(keypoints)
    }

    #[test]
    fn counts_on_the_way_back_up() {
        let mut pushup = PushUp::new(Thresholds::default());
        assert!(!pushup.step(&plank(0.35, 0.1)).rep_completed);
        assert!(!pushup.step(&plank(0.2, 0.1)).rep_completed);
        assert!(!pushup.step(&plank(0.1, 0.1)).rep_completed);
        assert_eq!(pushup.phase(), Phase::GoingDown);
        assert!(!pushup.step(&plank(0.25, 0.1)).rep_completed);
        assert!(pushup.step(&plank(0.35, 0.1)).rep_completed);
        assert_eq!(pushup.phase(), Phase::Up);
        assert!(!pushup.step(&plank(0.4, 0.1)).rep_completed);
    }

    #[test]
    fn staying_up_never_counts() {
        let mut pushup = PushUp::new(Thresholds::default());
        for _ in 0..10 {
            assert!(!pushup.step(&plank(0.35, 0.1)).rep_completed);
        }
    }

    #[test]
    fn hand_width_advice() {
        let mut pushup = PushUp::new(Thresholds::default());
        // shoulder span is 0.2
        assert_eq!(
            pushup.step(&plank(0.35, 0.05)).violation,
            Some(AdviceKind::HandsTooNarrow)
        );
        assert_eq!(
            pushup.step(&plank(0.35, 0.2)).violation,
            Some(AdviceKind::HandsTooWide)
        );
        assert_eq!(pushup.step(&plank(0.35, 0.1)).violation, None);
    }
}
