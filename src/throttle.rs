use crate::error::Error;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tracing::trace;

pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Holds the scheduler's busy flag for one in-flight inference.
///
/// Dropping the guard clears the flag, so every way an inference can end
/// (decoded, failed, cancelled, or lost in a closed channel) releases the
/// session for the next tick.
#[derive(Debug)]
pub struct BusyGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// The outcome of one camera tick.
#[derive(Debug)]
pub enum Tick {
    /// Not an Nth frame.
    Sampled,
    /// An inference is still in flight; the frame is dropped.
    Busy,
    /// Too soon after the last inference.
    TooSoon,
    /// Run inference on this frame. Hold the guard until the result is applied.
    Proceed(BusyGuard),
}

impl Tick {
    pub fn proceeds(&self) -> bool {
        matches!(self, Self::Proceed(_))
    }
}

/// Decides which camera frames reach the pose model.
#[derive(Debug)]
pub struct Throttle {
    frame_sample: u32,
    min_interval: Duration,
    frame_counter: u64,
    last_inference: Option<Instant>,
    busy: Arc<AtomicBool>,
}

impl Throttle {
    pub fn new(frame_sample: u32, min_interval: Duration) -> Result<Self, Error> {
        if frame_sample == 0 {
            return Err(Error::InvalidFrameSample);
        }
        Ok(Self {
            frame_sample,
            min_interval,
            frame_counter: 0,
            last_inference: None,
            busy: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn tick(&mut self, now: Instant) -> Tick {
        self.frame_counter = self.frame_counter.wrapping_add(1);
        if self.frame_counter % u64::from(self.frame_sample) != 0 {
            return Tick::Sampled;
        }

        if self.busy.swap(true, Ordering::AcqRel) {
            trace!(message = "inference in flight, dropping frame", frame = self.frame_counter);
            return Tick::Busy;
        }

        if let Some(last) = self.last_inference {
            if now.saturating_duration_since(last) < self.min_interval {
                self.busy.store(false, Ordering::Release);
                return Tick::TooSoon;
            }
        }

        self.last_inference = Some(now);
        Tick::Proceed(BusyGuard {
            busy: self.busy.clone(),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Start counting afresh, e.g. after a camera switch.
    ///
    /// The busy flag is left alone: an inference already in flight still owns
    /// it and releases it when its guard drops.
    pub fn reset(&mut self) {
        self.frame_counter = 0;
        self.last_inference = None;
    }
}
