use crate::{
    decode::Decoder,
    engine::{Engine, PoseModel},
    error::Error,
    pose::PoseFrame,
    throttle::BusyGuard,
};
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use tracing::{debug, error, instrument};

struct Request<I> {
    seq: u64,
    image: I,
    guard: BusyGuard,
}

/// A finished inference, success or not.
///
/// Holds the scheduler's busy flag until dropped, so apply the pose before
/// letting go of it.
#[derive(Debug)]
pub struct Completion {
    pub seq: u64,
    pub result: Result<PoseFrame, Error>,
    pub inference: Duration,
    _guard: BusyGuard,
}

/// Runs the engine on its own thread so frame delivery never waits on the model.
pub struct Pipeline<I> {
    requests: Option<Sender<Request<I>>>,
    cancelled: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    next_seq: u64,
}

impl<I> Pipeline<I>
where
    I: Send + 'static,
{
    /// Move `engine` onto a worker thread. Completions are sent to `completions`.
    pub fn spawn<M, D>(mut engine: Engine<M, D>, completions: Sender<Completion>) -> Self
    where
        M: PoseModel<Image = I> + 'static,
        D: Decoder + Send + 'static,
    {
        let (requests, incoming): (Sender<Request<I>>, Receiver<Request<I>>) = unbounded();
        let cancelled = Arc::new(AtomicBool::new(false));
        let worker_cancelled = cancelled.clone();

        let worker = thread::spawn(move || {
            while let Ok(Request { seq, image, guard }) = incoming.recv() {
                if worker_cancelled.load(Ordering::SeqCst) {
                    debug!(message = "dropping request after cancellation", seq);
                    break;
                }

                let start = Instant::now();
                let result = engine.detect_pose(&image);
                let completion = Completion {
                    seq,
                    result,
                    inference: start.elapsed(),
                    _guard: guard,
                };

                if completions.send(completion).is_err() {
                    debug!(message = "completion receiver gone, stopping worker", seq);
                    break;
                }
            }
            engine.close();
        });

        Self {
            requests: Some(requests),
            cancelled,
            worker: Some(worker),
            next_seq: 0,
        }
    }
}

impl<I> Pipeline<I> {
    /// Hand one frame to the worker. `guard` comes from a proceeding
    /// [`Tick`](crate::throttle::Tick) and is released when the completion drops.
    #[instrument(name = "Pipeline::submit", skip(self, image, guard), level = "debug")]
    pub fn submit(&mut self, image: I, guard: BusyGuard) -> Result<u64, Error> {
        let requests = self.requests.as_ref().ok_or(Error::PipelineClosed)?;
        let seq = self.next_seq;
        requests
            .send(Request { seq, image, guard })
            .map_err(|_| Error::PipelineClosed)?;
        self.next_seq += 1;
        Ok(seq)
    }

    pub fn is_running(&self) -> bool {
        self.requests.is_some()
    }

    /// Cancel pending work, stop the worker and release the model.
    ///
    /// An inference already running is allowed to finish; its completion is
    /// discarded if nobody is listening. Calling this again does nothing.
    pub fn shutdown(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!(message = "inference worker panicked");
            }
        }
    }
}

impl<I> Drop for Pipeline<I> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
