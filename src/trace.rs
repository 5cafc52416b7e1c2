//! Keypoint traces for replaying a workout without a camera.
//!
//! A trace file holds one frame per line, each a JSON array of 17
//! `[x, y, score]` triples in COCO order. [`TraceModel`] renders those frames
//! back into heat-maps so replay exercises the same decode path as a live model.

use crate::{
    engine::PoseModel,
    error::Error,
    exercise::Exercise,
    pose::{Keypoint, KeypointKind, Keypoints, PoseFrame, NUM_KEYPOINTS},
};
use ndarray::{Array3, Axis};
use std::{
    f32::consts::PI,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};
use tracing::{debug, info};

/// HRNet output grid.
pub const HEATMAP_ROWS: usize = 64;
pub const HEATMAP_COLS: usize = 48;

/// Gaussian spread of a rendered joint, in cells.
const SIGMA: f32 = 1.5;
const SCORE: f32 = 0.9;

/// Upper bound on a scripted trace, about nine hours at 30 fps.
pub const MAX_SYNTHETIC_FRAMES: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    frames: Vec<PoseFrame>,
}

impl Trace {
    pub fn new(frames: Vec<PoseFrame>) -> Result<Self, Error> {
        if frames.is_empty() {
            return Err(Error::EmptyTrace);
        }
        Ok(Self { frames })
    }

    pub fn load<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::ReadTrace(e, path.to_path_buf()))?;

        let mut frames = Vec::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| Error::ReadTrace(e, path.to_path_buf()))?;
            if line.trim().is_empty() {
                continue;
            }
            frames.push(parse_frame(&line, i + 1)?);
        }

        info!(message = "loaded trace", path = ?path, frames = frames.len());
        Self::new(frames)
    }

    /// A scripted workout of `reps` clean repetitions, `ticks_per_rep` frames
    /// each, ending back in the starting position.
    pub fn synthetic(exercise: Exercise, reps: u32, ticks_per_rep: u32) -> Result<Self, Error> {
        let ticks_per_rep = ticks_per_rep.max(1);
        let total = reps
            .checked_mul(ticks_per_rep)
            .filter(|&total| total as usize <= MAX_SYNTHETIC_FRAMES)
            .ok_or(Error::TraceTooLong(reps, ticks_per_rep, MAX_SYNTHETIC_FRAMES))?;
        let frames = (0..=total)
            .map(|tick| {
                let phase = (tick % ticks_per_rep) as f32 / ticks_per_rep as f32;
                synthetic_frame(exercise, phase)
            })
            .collect();
        Self::new(frames)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[PoseFrame] {
        &self.frames
    }

    pub fn get(&self, index: usize) -> Option<&PoseFrame> {
        self.frames.get(index)
    }
}

fn parse_frame(line: &str, line_number: usize) -> Result<PoseFrame, Error> {
    let triples: Vec<[f32; 3]> =
        serde_json::from_str(line).map_err(|e| Error::ParseTrace(e, line_number))?;
    if triples.len() != NUM_KEYPOINTS {
        return Err(Error::TraceFrameLength(
            line_number,
            triples.len(),
            NUM_KEYPOINTS,
        ));
    }

    let mut keypoints: Keypoints = Default::default();
    for (keypoint, &[x, y, score]) in keypoints.iter_mut().zip(triples.iter()) {
        *keypoint = Keypoint::new(x, y, score)?;
    }
    Ok(PoseFrame::new(keypoints))
}

/// A relaxed standing pose, facing the camera.
fn standing() -> Keypoints {
    use KeypointKind::*;

    let mut keypoints: Keypoints = Default::default();
    for &(kind, x, y) in [
        (Nose, 0.50, 0.10),
        (LeftEye, 0.48, 0.08),
        (RightEye, 0.52, 0.08),
        (LeftEar, 0.46, 0.09),
        (RightEar, 0.54, 0.09),
        (LeftShoulder, 0.40, 0.30),
        (RightShoulder, 0.60, 0.30),
        (LeftElbow, 0.38, 0.45),
        (RightElbow, 0.62, 0.45),
        (LeftWrist, 0.37, 0.60),
        (RightWrist, 0.63, 0.60),
        (LeftHip, 0.44, 0.60),
        (RightHip, 0.56, 0.60),
        (LeftKnee, 0.44, 0.75),
        (RightKnee, 0.56, 0.75),
        (LeftAnkle, 0.44, 0.90),
        (RightAnkle, 0.56, 0.90),
    ]
    .iter()
    {
        keypoints[kind.idx()] = Keypoint { x, y, score: SCORE };
    }
    keypoints
}

/// The pose `phase` of the way through one clean rep, `phase` in `[0, 1)`.
///
/// Phase 0 is the starting position and 0.5 the far end of the movement.
pub fn synthetic_frame(exercise: Exercise, phase: f32) -> PoseFrame {
    use KeypointKind::*;

    let mut keypoints = standing();
    let mut set = |kind: KeypointKind, x: f32, y: f32| {
        keypoints[kind.idx()] = Keypoint { x, y, score: SCORE };
    };
    let swing = (2.0 * PI * phase).cos();

    match exercise {
        Exercise::Curl => {
            set(RightShoulder, 0.50, 0.30);
            set(RightElbow, 0.50, 0.50);
            set(RightWrist, 0.50, 0.50 + 0.20 * swing);
        }
        Exercise::PushUp => {
            let drop = 0.20 + 0.15 * swing;
            set(LeftShoulder, 0.40, 0.50);
            set(RightShoulder, 0.60, 0.50);
            set(LeftWrist, 0.40, 0.50 + drop);
            set(RightWrist, 0.60, 0.50 + drop);
        }
        Exercise::Squat => {
            let height = 0.125 + 0.125 * swing;
            set(LeftShoulder, 0.40, 0.30);
            set(RightShoulder, 0.60, 0.30);
            set(LeftHip, 0.44, 0.70 - height);
            set(RightHip, 0.56, 0.70 - height);
            set(LeftKnee, 0.40, 0.70);
            set(RightKnee, 0.60, 0.70);
            set(LeftAnkle, 0.38, 0.90);
            set(RightAnkle, 0.62, 0.90);
        }
    }
    PoseFrame::new(keypoints)
}

/// Replays a [`Trace`] as if it were a pose model. The image is a frame index;
/// indices past the end wrap around.
#[derive(Debug)]
pub struct TraceModel {
    trace: Trace,
    rows: usize,
    cols: usize,
    closed: bool,
}

impl TraceModel {
    pub fn new(trace: Trace) -> Self {
        Self::with_grid(trace, HEATMAP_ROWS, HEATMAP_COLS)
    }

    pub fn with_grid(trace: Trace, rows: usize, cols: usize) -> Self {
        Self {
            trace,
            rows,
            cols,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn render(&self, frame: &PoseFrame) -> Array3<f32> {
        let (rows, cols) = (self.rows as f32, self.cols as f32);
        let denom = 2.0 * SIGMA * SIGMA;
        let mut heat = Array3::zeros((self.rows, self.cols, NUM_KEYPOINTS));

        for (j, keypoint) in frame.keypoints().iter().enumerate() {
            let (cy, cx) = (keypoint.y * rows, keypoint.x * cols);
            for ((r, c), value) in heat.index_axis_mut(Axis(2), j).indexed_iter_mut() {
                let dy = r as f32 + 0.5 - cy;
                let dx = c as f32 + 0.5 - cx;
                *value = keypoint.score * (-(dy * dy + dx * dx) / denom).exp();
            }
        }
        heat
    }
}

impl PoseModel for TraceModel {
    type Image = usize;

    fn output_shape(&self) -> (usize, usize, usize) {
        (self.rows, self.cols, NUM_KEYPOINTS)
    }

    fn infer(&mut self, image: &usize) -> Result<Array3<f32>, Error> {
        if self.closed {
            return Err(Error::ModelClosed);
        }
        let frame = self
            .trace
            .get(image % self.trace.len())
            .ok_or(Error::EmptyTrace)?;
        Ok(self.render(frame))
    }

    fn close(&mut self) {
        self.closed = true;
        debug!(message = "closed trace model", frames = self.trace.len());
    }
}

#[cfg(test)]
mod tests {
    use super::{synthetic_frame, Trace, TraceModel, HEATMAP_COLS, HEATMAP_ROWS};
    use crate::{
        decode::{ArgmaxDecoder, Decoder},
        engine::PoseModel,
        error::Error,
        exercise::{Exercise, Session},
        pose::{KeypointKind, NUM_KEYPOINTS},
    };
    use std::{io::Write, time::Instant};

    fn write_trace(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn line(x: f32, y: f32, score: f32, n: usize) -> String {
        let triples = vec![format!("[{},{},{}]", x, y, score); n];
        format!("[{}]\n", triples.join(","))
    }

    #[test]
    fn loads_json_lines() {
        let file = write_trace(&(line(0.25, 0.5, 0.8, 17) + "\n" + &line(0.5, 0.75, 0.1, 17)));
        let trace = Trace::load(file.path()).unwrap();
        assert_eq!(trace.len(), 2);
        let nose = trace.frames()[1].get(KeypointKind::Nose);
        assert_approx_eq::assert_approx_eq!(nose.x, 0.5);
        assert_approx_eq::assert_approx_eq!(nose.y, 0.75);
        assert_approx_eq::assert_approx_eq!(nose.score, 0.1);
    }

    #[test]
    fn short_frame_is_rejected_with_its_line() {
        let file = write_trace(&(line(0.5, 0.5, 0.9, 17) + &line(0.5, 0.5, 0.9, 16)));
        assert!(matches!(
            Trace::load(file.path()),
            Err(Error::TraceFrameLength(2, 16, 17))
        ));
    }

    #[test]
    fn garbage_and_empty_files_are_rejected() {
        let file = write_trace("not json\n");
        assert!(matches!(
            Trace::load(file.path()),
            Err(Error::ParseTrace(_, 1))
        ));

        let file = write_trace("\n\n");
        assert!(matches!(Trace::load(file.path()), Err(Error::EmptyTrace)));

        assert!(matches!(
            Trace::load("/definitely/not/here.jsonl"),
            Err(Error::ReadTrace(..))
        ));
    }

    #[test]
    fn rendered_heatmap_decodes_near_the_source() {
        let frame = synthetic_frame(Exercise::Squat, 0.25);
        let mut model = TraceModel::new(Trace::new(vec![frame]).unwrap());
        assert_eq!(
            model.output_shape(),
            (HEATMAP_ROWS, HEATMAP_COLS, NUM_KEYPOINTS)
        );

        let heat = model.infer(&0).unwrap();
        let decoded = ArgmaxDecoder.decode(heat.view()).unwrap();
        for ((_, want), (_, got)) in frame.iter().zip(decoded.iter()) {
            assert!((want.x - got.x).abs() <= 1.0 / HEATMAP_COLS as f32);
            assert!((want.y - got.y).abs() <= 1.0 / HEATMAP_ROWS as f32);
            assert!(got.score > 0.5);
        }
    }

    #[test]
    fn closed_model_refuses_inference() {
        let mut model = TraceModel::new(Trace::synthetic(Exercise::Curl, 1, 4).unwrap());
        model.close();
        assert!(model.is_closed());
        assert!(matches!(model.infer(&0), Err(Error::ModelClosed)));
    }

    mod synthetic {
        use super::*;

        fn replay(exercise: Exercise, reps: u32) -> (u32, u32, usize) {
            let trace = Trace::synthetic(exercise, reps, 16).unwrap();
            let mut session = Session::new(exercise.config(), reps).unwrap();
            let now = Instant::now();
            let mut summaries = 0;
            for frame in trace.frames() {
                summaries += session.update(frame, now).summary.into_iter().count();
            }
            (session.reps(), session.errors(), summaries)
        }

        #[test]
        fn curl_trace_counts_every_rep_cleanly() {
            assert_eq!(replay(Exercise::Curl, 3), (3, 0, 1));
        }

        #[test]
        fn pushup_trace_counts_every_rep_cleanly() {
            assert_eq!(replay(Exercise::PushUp, 4), (4, 0, 1));
        }

        #[test]
        fn squat_trace_counts_every_rep_cleanly() {
            assert_eq!(replay(Exercise::Squat, 5), (5, 0, 1));
        }

        #[test]
        fn oversized_script_is_rejected() {
            assert!(matches!(
                Trace::synthetic(Exercise::Curl, 10, 2_000_000_000),
                Err(Error::TraceTooLong(10, 2_000_000_000, _))
            ));
            assert!(matches!(
                Trace::synthetic(Exercise::Squat, 100, 20_000),
                Err(Error::TraceTooLong(..))
            ));
        }

        #[test]
        fn ends_where_it_starts() {
            let trace = Trace::synthetic(Exercise::Curl, 2, 8).unwrap();
            assert_eq!(trace.len(), 17);
            assert_eq!(trace.frames()[0], trace.frames()[16]);
        }
    }
}
