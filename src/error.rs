use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("expected heat-map with {expected} joint channels, got shape {got:?}")]
    HeatmapShape {
        expected: usize,
        got: (usize, usize, usize),
    },

    #[error("heat-map has an empty spatial grid: {0} rows x {1} cols")]
    EmptyHeatmap(usize, usize),

    #[error("failed to construct NotNan from f32: {1}")]
    ConstructNotNan(#[source] ordered_float::FloatIsNan, f32),

    #[error("failed to convert usize value to keypoint kind: {0}")]
    ConvertUSizeToKeypointKind(usize),

    #[error("goal must be between {min} and {max} reps, got {goal}")]
    InvalidGoal { goal: u32, min: u32, max: u32 },

    #[error("frame sample factor must be at least 1")]
    InvalidFrameSample,

    #[error("pose model inference failed: {0}")]
    Inference(String),

    #[error("pose model has already been closed")]
    ModelClosed,

    #[error("inference pipeline has been shut down")]
    PipelineClosed,

    #[error("failed to read trace file: {1:?}")]
    ReadTrace(#[source] std::io::Error, PathBuf),

    #[error("failed to parse trace line {1}")]
    ParseTrace(#[source] serde_json::Error, usize),

    #[error("trace line {0} has {1} keypoints, expected {2}")]
    TraceFrameLength(usize, usize, usize),

    #[error("synthetic trace of {0} reps x {1} frames exceeds {2} frames")]
    TraceTooLong(u32, u32, usize),

    #[error("trace contains no frames")]
    EmptyTrace,

    #[error("failed to open stats file: {1:?}")]
    OpenStats(#[source] std::io::Error, PathBuf),

    #[error("failed to write stats record")]
    WriteStats(#[source] std::io::Error),

    #[error("failed to serialize stats record")]
    SerializeStats(#[source] serde_json::Error),

    #[error("failed to parse stats line {1}")]
    ParseStats(#[source] serde_json::Error, usize),
}
