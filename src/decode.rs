use crate::{
    error::Error,
    pose::{self, Keypoint, KeypointKind, PoseFrame},
};
use ndarray::{ArrayView3, Axis};
use num_traits::cast::ToPrimitive;
use ordered_float::NotNan;

pub trait Decoder {
    /// Return the number of joint channels the decoder expects to operate on.
    fn expected_joints(&self) -> usize {
        pose::NUM_KEYPOINTS
    }

    /// Decode a `[rows, cols, joints]` heat-map into a pose.
    fn decode(&self, heatmaps: ArrayView3<f32>) -> Result<PoseFrame, Error>;

    /// Validate that the model produces heat-maps of a shape this decoder can read.
    fn validate_output_shape(&self, shape: (usize, usize, usize)) -> Result<(), Error> {
        let (rows, cols, joints) = shape;
        let expected = self.expected_joints();
        if joints != expected {
            Err(Error::HeatmapShape {
                expected,
                got: shape,
            })
        } else if rows == 0 || cols == 0 {
            Err(Error::EmptyHeatmap(rows, cols))
        } else {
            Ok(())
        }
    }
}

/// Per-channel argmax decoding.
///
/// Each joint lands on the centre of its highest-scoring cell and takes that
/// cell's value as its score. Equal maxima resolve to the first cell in
/// row-major order. There is no sub-cell refinement and no coupling between
/// joints, so a channel with two similar peaks (occlusion, a second person)
/// picks whichever peak is scanned first.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgmaxDecoder;

impl Decoder for ArgmaxDecoder {
    fn decode(&self, heatmaps: ArrayView3<f32>) -> Result<PoseFrame, Error> {
        self.validate_output_shape(heatmaps.dim())?;

        let (rows, cols, _) = heatmaps.dim();
        let rows_f = rows.to_f32().ok_or(Error::EmptyHeatmap(rows, cols))?;
        let cols_f = cols.to_f32().ok_or(Error::EmptyHeatmap(rows, cols))?;

        let mut keypoints: pose::Keypoints = Default::default();

        for (joint, channel) in heatmaps.axis_iter(Axis(2)).enumerate() {
            let kind = KeypointKind::from_idx(joint)?;

            let mut best: Option<((usize, usize), NotNan<f32>)> = None;
            for (cell, &value) in channel.indexed_iter() {
                let value = NotNan::new(value)
                    .map_err(|e| Error::ConstructNotNan(e, value))?;
                // strict comparison keeps the first-seen maximum
                if best.map_or(true, |(_, current)| value > current) {
                    best = Some((cell, value));
                }
            }
            let (best_cell, best) = best.ok_or(Error::EmptyHeatmap(rows, cols))?;

            let (row, col) = best_cell;
            let row = row.to_f32().ok_or(Error::EmptyHeatmap(rows, cols))?;
            let col = col.to_f32().ok_or(Error::EmptyHeatmap(rows, cols))?;
            keypoints[kind.idx()] =
                Keypoint::new((col + 0.5) / cols_f, (row + 0.5) / rows_f, best.into_inner())?;
        }

        Ok(PoseFrame::new(keypoints))
    }
}
