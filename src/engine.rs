use crate::{
    decode::{ArgmaxDecoder, Decoder},
    error::Error,
    pose::PoseFrame,
};
use ndarray::Array3;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// An opaque pose-estimation model: image in, `[rows, cols, joints]` heat-map out.
pub trait PoseModel: Send {
    type Image: Send;

    /// The heat-map shape every successful `infer` call produces.
    fn output_shape(&self) -> (usize, usize, usize);

    fn infer(&mut self, image: &Self::Image) -> Result<Array3<f32>, Error>;

    /// Release the model's resources. Called at most once by [`Engine`].
    fn close(&mut self);
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Timing {
    pub inference: Duration,
    pub frames: usize,
}

impl Timing {
    pub fn fps(&self) -> f64 {
        let secs = self.inference.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

/// A pose model plus the decoder for its output.
pub struct Engine<M: PoseModel, D = ArgmaxDecoder> {
    model: Option<M>,
    decoder: D,
    timing: Timing,
}

impl<M, D> Engine<M, D>
where
    M: PoseModel,
    D: Decoder,
{
    pub fn new(model: M, decoder: D) -> Result<Self, Error> {
        decoder.validate_output_shape(model.output_shape())?;

        Ok(Self {
            model: Some(model),
            decoder,
            timing: Default::default(),
        })
    }

    #[instrument(name = "Engine::detect_pose", skip(self, image), level = "debug")]
    pub fn detect_pose(&mut self, image: &M::Image) -> Result<PoseFrame, Error> {
        let model = self.model.as_mut().ok_or(Error::ModelClosed)?;

        let start_inference = Instant::now();
        let heatmaps = model.infer(image)?;
        self.timing.inference += start_inference.elapsed();
        self.timing.frames += 1;

        self.decoder.decode(heatmaps.view())
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn is_closed(&self) -> bool {
        self.model.is_none()
    }

    /// Release the model. Safe to call any number of times.
    pub fn close(&mut self) {
        if let Some(mut model) = self.model.take() {
            model.close();
            debug!(message = "closed pose model", frames = self.timing.frames);
        }
    }
}

impl<M: PoseModel, D> Drop for Engine<M, D> {
    fn drop(&mut self) {
        if let Some(mut model) = self.model.take() {
            model.close();
        }
    }
}
