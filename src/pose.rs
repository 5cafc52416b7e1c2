use crate::error::Error;
use num_traits::cast::FromPrimitive;
use ordered_float::NotNan;

/// Keypoints below this score are not trusted by any exercise.
pub const CONF_THRESHOLD: f32 = 0.2;

pub const NUM_KEYPOINTS: usize = 17;

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, num_derive::FromPrimitive, num_derive::ToPrimitive,
)]
pub enum KeypointKind {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl KeypointKind {
    #[inline]
    pub fn idx(self) -> usize {
        self as usize
    }

    pub fn from_idx(index: usize) -> Result<Self, Error> {
        Self::from_usize(index).ok_or(Error::ConvertUSizeToKeypointKind(index))
    }
}

/// One joint's normalized image position (top-left origin) and model confidence.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, score: f32) -> Result<Self, Error> {
        Ok(Self {
            x,
            y,
            score: NotNan::new(score)
                .map_err(|e| Error::ConstructNotNan(e, score))?
                .into_inner(),
        })
    }

    #[inline]
    pub fn is_confident(&self, threshold: f32) -> bool {
        self.score >= threshold
    }
}

pub type Keypoints = [Keypoint; NUM_KEYPOINTS];

/// The full result of one inference: every joint in COCO order.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct PoseFrame {
    keypoints: Keypoints,
}

impl PoseFrame {
    pub fn new(keypoints: Keypoints) -> Self {
        Self { keypoints }
    }

    #[inline]
    pub fn get(&self, kind: KeypointKind) -> &Keypoint {
        &self.keypoints[kind.idx()]
    }

    pub fn keypoints(&self) -> &Keypoints {
        &self.keypoints
    }

    pub fn iter(&self) -> impl Iterator<Item = (KeypointKind, &Keypoint)> + '_ {
        self.keypoints
            .iter()
            .enumerate()
            .filter_map(|(i, keypoint)| KeypointKind::from_usize(i).map(|kind| (kind, keypoint)))
    }

    /// Whether every joint in `kinds` clears `threshold`.
    pub fn all_confident(&self, kinds: &[KeypointKind], threshold: f32) -> bool {
        kinds
            .iter()
            .all(|&kind| self.get(kind).is_confident(threshold))
    }

    pub fn midpoint(&self, a: KeypointKind, b: KeypointKind) -> (f32, f32) {
        let (a, b) = (self.get(a), self.get(b));
        ((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
    }

    /// Horizontal distance between two joints.
    pub fn span(&self, a: KeypointKind, b: KeypointKind) -> f32 {
        (self.get(a).x - self.get(b).x).abs()
    }
}

/// Skeleton edges whose endpoints are both confident.
pub fn visible_bones(
    frame: &PoseFrame,
    threshold: f32,
) -> impl Iterator<Item = (KeypointKind, KeypointKind)> + '_ {
    constants::SKELETON
        .iter()
        .copied()
        .filter(move |&(a, b)| frame.all_confident(&[a, b], threshold))
}

pub mod constants {
    use crate::pose::KeypointKind::{self, *};

    pub const SKELETON: [(KeypointKind, KeypointKind); 16] = [
        // head
        (Nose, LeftEye),
        (Nose, RightEye),
        (LeftEye, LeftEar),
        (RightEye, RightEar),
        // shoulders and arms
        (LeftShoulder, RightShoulder),
        (LeftShoulder, LeftElbow),
        (LeftElbow, LeftWrist),
        (RightShoulder, RightElbow),
        (RightElbow, RightWrist),
        // torso
        (LeftShoulder, LeftHip),
        (RightShoulder, RightHip),
        (LeftHip, RightHip),
        // legs
        (LeftHip, LeftKnee),
        (LeftKnee, LeftAnkle),
        (RightHip, RightKnee),
        (RightKnee, RightAnkle),
    ];
}

#[cfg(test)]
mod tests {
    use super::{constants::SKELETON, visible_bones, Keypoint, KeypointKind, PoseFrame};
    use crate::pose::NUM_KEYPOINTS;

    #[test]
    fn keypoint_kind_round_trips_through_index() {
        for i in 0..NUM_KEYPOINTS {
            assert_eq!(KeypointKind::from_idx(i).unwrap().idx(), i);
        }
        assert!(KeypointKind::from_idx(NUM_KEYPOINTS).is_err());
    }

    #[test]
    fn coco_layout() {
        assert_eq!(KeypointKind::LeftShoulder.idx(), 5);
        assert_eq!(KeypointKind::RightElbow.idx(), 8);
        assert_eq!(KeypointKind::RightWrist.idx(), 10);
        assert_eq!(KeypointKind::RightAnkle.idx(), 16);
    }

    #[test]
    fn nan_score_is_rejected() {
        assert!(Keypoint::new(0.5, 0.5, f32::NAN).is_err());
        assert!(Keypoint::new(0.5, 0.5, -3.0).is_ok());
    }

    #[test]
    fn skeleton_has_no_self_edges_or_duplicates() {
        for (i, &(a, b)) in SKELETON.iter().enumerate() {
            assert_ne!(a, b);
            assert!(SKELETON[i + 1..]
                .iter()
                .all(|&(c, d)| (c, d) != (a, b) && (c, d) != (b, a)));
        }
    }

    #[test]
    fn only_confident_bones_are_visible() {
        let mut keypoints = [Keypoint {
            x: 0.5,
            y: 0.5,
            score: 0.9,
        }; NUM_KEYPOINTS];
        keypoints[KeypointKind::LeftKnee.idx()].score = 0.1;
        let frame = PoseFrame::new(keypoints);

        let bones = visible_bones(&frame, 0.2).collect::<Vec<_>>();
        assert_eq!(bones.len(), SKELETON.len() - 2);
        assert!(bones
            .iter()
            .all(|&(a, b)| a != KeypointKind::LeftKnee && b != KeypointKind::LeftKnee));
    }

    #[test]
    fn midpoint_and_span() {
        let mut keypoints = [Keypoint::default(); NUM_KEYPOINTS];
        keypoints[KeypointKind::LeftShoulder.idx()] = Keypoint {
            x: 0.4,
            y: 0.2,
            score: 1.0,
        };
        keypoints[KeypointKind::RightShoulder.idx()] = Keypoint {
            x: 0.6,
            y: 0.4,
            score: 1.0,
        };
        let frame = PoseFrame::new(keypoints);
        let (x, y) = frame.midpoint(KeypointKind::LeftShoulder, KeypointKind::RightShoulder);
        assert_approx_eq::assert_approx_eq!(x, 0.5);
        assert_approx_eq::assert_approx_eq!(y, 0.3);
        assert_approx_eq::assert_approx_eq!(
            frame.span(KeypointKind::LeftShoulder, KeypointKind::RightShoulder),
            0.2
        );
    }
}
