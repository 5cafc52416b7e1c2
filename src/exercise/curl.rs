//! Bicep curl, tracked on the right arm.
//!
//! The signal is the signed height of the wrist above the elbow. Raising the
//! wrist past `min_up_dist` arms a rep; lowering it past `down_reset_dist`
//! below the elbow completes it.

use super::{AdviceKind, Step};
use crate::pose::{KeypointKind, PoseFrame};

pub const JOINTS: [KeypointKind; 3] = [
    KeypointKind::RightWrist,
    KeypointKind::RightElbow,
    KeypointKind::RightShoulder,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub min_up_dist: f32,
    pub down_reset_dist: f32,
    /// Largest elbow movement between two observed frames before advising.
    pub elbow_drift: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_up_dist: 0.05,
            down_reset_dist: 0.03,
            elbow_drift: 0.02,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Curl {
    thresholds: Thresholds,
    phase: Phase,
}

impl Curl {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            phase: Phase::Down,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(super) fn step(&mut self, frame: &PoseFrame, last_elbow_y: &mut Option<f32>) -> Step {
        let wrist = frame.get(KeypointKind::RightWrist);
        let elbow = frame.get(KeypointKind::RightElbow);

        let drifted = last_elbow_y
            .map(|y| (elbow.y - y).abs() > self.thresholds.elbow_drift)
            .unwrap_or(false);
        *last_elbow_y = Some(elbow.y);

        // y grows downwards
        let lift = elbow.y - wrist.y;
        let rep_completed = match self.phase {
            Phase::Down => {
                if lift > self.thresholds.min_up_dist {
                    self.phase = Phase::Up;
                }
                false
            }
            Phase::Up => {
                if -lift > self.thresholds.down_reset_dist {
                    self.phase = Phase::Down;
                    true
                } else {
                    false
                }
            }
        };

        Step {
            rep_completed,
            violation: if drifted {
                Some(AdviceKind::StopMovingElbow)
            } else {
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Curl, Phase, Thresholds};
    use crate::{
        exercise::AdviceKind,
        pose::{Keypoint, KeypointKind, PoseFrame, NUM_KEYPOINTS},
    };

    fn arm(wrist_y: f32, elbow_y: f32) -> PoseFrame {
        let mut keypoints = [Keypoint {
            x: 0.5,
            y: 0.5,
            score: 0.9,
        }; NUM_KEYPOINTS];
        keypoints[KeypointKind::RightWrist.idx()].y = wrist_y;
        keypoints[KeypointKind::RightElbow.idx()].y = elbow_y;
        keypoints[KeypointKind::RightShoulder.idx()].y = 0.3;
        PoseFrame::new(keypoints)
    }

    #[test]
    fn arms_then_completes() {
        let mut curl = Curl::new(Thresholds::default());
        let mut last = None;

        assert!(!curl.step(&arm(0.7, 0.5), &mut last).rep_completed);
        assert_eq!(curl.phase(), Phase::Down);

        assert!(!curl.step(&arm(0.4, 0.5), &mut last).rep_completed);
        assert_eq!(curl.phase(), Phase::Up);

        assert!(curl.step(&arm(0.6, 0.5), &mut last).rep_completed);
        assert_eq!(curl.phase(), Phase::Down);
    }

    #[test]
    fn hovering_between_thresholds_never_counts() {
        let mut curl = Curl::new(Thresholds::default());
        let mut last = None;
        // lift of 0.04 is short of arming, -0.02 is short of completing
        for &wrist_y in [0.46, 0.52, 0.47, 0.51, 0.5].iter().cycle().take(40) {
            assert!(!curl.step(&arm(wrist_y, 0.5), &mut last).rep_completed);
            assert_eq!(curl.phase(), Phase::Down);
        }
    }

    #[test]
    fn hovering_while_up_counts_once() {
        let mut curl = Curl::new(Thresholds::default());
        let mut last = None;

        assert!(!curl.step(&arm(0.4, 0.5), &mut last).rep_completed);
        assert_eq!(curl.phase(), Phase::Up);

        // wrist sags to just short of the reset distance below the elbow
        let sag = [0.52, 0.529, 0.45, 0.525, 0.5, 0.528];
        for &wrist_y in sag.iter().cycle().take(30) {
            assert!(!curl.step(&arm(wrist_y, 0.5), &mut last).rep_completed);
            assert_eq!(curl.phase(), Phase::Up);
        }

        let completed = (0..5)
            .filter(|_| curl.step(&arm(0.6, 0.5), &mut last).rep_completed)
            .count();
        assert_eq!(completed, 1);
        assert_eq!(curl.phase(), Phase::Down);
    }

    #[test]
    fn elbow_drift_is_reported() {
        let mut curl = Curl::new(Thresholds::default());
        let mut last = None;

        assert_eq!(curl.step(&arm(0.7, 0.5), &mut last).violation, None);
        assert_eq!(curl.step(&arm(0.7, 0.51), &mut last).violation, None);
        assert_eq!(
            curl.step(&arm(0.7, 0.56), &mut last).violation,
            Some(AdviceKind::StopMovingElbow)
        );
        assert_eq!(last, Some(0.56));
    }
}
