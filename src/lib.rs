//! Turns a stream of pose-model heat-maps into counted, coached repetitions.

pub mod decode;
pub mod engine;
pub mod error;
pub mod exercise;
pub mod pipeline;
pub mod pose;
pub mod stats;
pub mod throttle;
pub mod trace;

pub use error::Error;
