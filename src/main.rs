use anyhow::{anyhow, ensure, Context, Result};
use crossbeam::channel::{bounded, never, select, unbounded, TrySendError};
use indicatif::{ProgressBar, ProgressStyle};
use rep_coach::{
    decode::ArgmaxDecoder,
    engine::{Engine, Timing},
    exercise::{clamp_goal, Exercise, ExerciseConfig, Session, Update, WorkoutSummary},
    pipeline::{Completion, Pipeline},
    stats::{JsonStore, StatsStore},
    throttle::{Throttle, Tick},
    trace::{Trace, TraceModel},
};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use structopt::StructOpt;
use tracing::{debug, info, trace, warn};
use tracing_subscriber::layer::SubscriberExt;

/// How long one scripted rep takes when no trace file is given.
const SYNTHETIC_REP_SECS: f64 = 2.0;

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long, default_value = "info", env = "RUST_LOG")]
    log_level: tracing_subscriber::filter::EnvFilter,

    /// Where finished workouts are recorded, one JSON object per line.
    #[structopt(long, default_value = "workout_stats.jsonl")]
    stats_path: PathBuf,

    #[structopt(short, long, default_value = "guest")]
    user: String,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Count reps from a keypoint trace played back at camera speed.
    Workout(WorkoutOpt),

    /// Show totals for every exercise the user has recorded.
    Stats,
}

#[derive(structopt::StructOpt)]
struct WorkoutOpt {
    /// curl, pushup or squat.
    #[structopt(short, long)]
    exercise: Exercise,

    /// Number of reps to finish the workout; clamped to 1..=100.
    #[structopt(short, long, default_value = "10", allow_hyphen_values = true)]
    goal: i64,

    /// JSON-lines keypoint trace. A scripted clean workout is used when absent.
    #[structopt(long)]
    trace: Option<PathBuf>,

    /// Camera frame rate of the replay.
    #[structopt(long, default_value = "30")]
    fps: f64,

    /// Run inference on every Nth frame instead of the exercise default.
    #[structopt(long)]
    frame_sample: Option<u32>,

    #[structopt(long)]
    min_interval_ms: Option<u64>,

    /// Keypoint score threshold.
    #[structopt(short, long)]
    threshold: Option<f32>,

    /// How long a piece of advice stays on screen.
    #[structopt(long)]
    advice_secs: Option<f64>,

    #[structopt(long, default_value = "64")]
    heatmap_rows: usize,

    #[structopt(long, default_value = "48")]
    heatmap_cols: usize,

    #[structopt(short, long)]
    show_progress: bool,
}

impl WorkoutOpt {
    fn config(&self) -> Result<ExerciseConfig> {
        let mut config = self.exercise.config();
        if let Some(frame_sample) = self.frame_sample {
            config.frame_sample = frame_sample;
        }
        if let Some(ms) = self.min_interval_ms {
            config.min_interval = Duration::from_millis(ms);
        }
        if let Some(threshold) = self.threshold {
            config.confidence_threshold = threshold;
        }
        if let Some(secs) = self.advice_secs {
            ensure!(
                secs.is_finite() && secs >= 0.0,
                "advice duration must be a non-negative number of seconds, got {}",
                secs
            );
            config.advice_duration = Duration::from_secs_f64(secs);
        }
        Ok(config)
    }
}

fn stars(count: u8) -> String {
    let count = usize::from(count.min(5));
    format!("{}{}", "★".repeat(count), "☆".repeat(5 - count))
}

fn print_summary(summary: &WorkoutSummary) {
    println!(
        "{} done: {} reps, {} with form errors, {} {}",
        summary.exercise,
        summary.total_reps,
        summary.total_errors,
        stars(summary.stars),
        summary.message(),
    );
    println!("most common error: {}", summary.common_error_label());
}

fn report(update: &Update, session: &Session, pb: Option<&ProgressBar>) {
    if update.reps_changed {
        match pb {
            Some(pb) => pb.set_position(u64::from(session.reps())),
            None => info!(
                message = "rep",
                reps = session.reps(),
                goal = session.goal(),
                progress = session.progress_percent(),
            ),
        }
    }
    if let Some(advice) = update.advice {
        match pb {
            Some(pb) => pb.set_message(advice.label()),
            None => info!(message = "advice", advice = %advice),
        }
    }
}

fn workout(
    opt: WorkoutOpt,
    user: &str,
    stats_path: PathBuf,
    running: Arc<AtomicBool>,
) -> Result<()> {
    ensure!(
        opt.fps.is_finite() && opt.fps > 0.0,
        "fps must be positive, got {}",
        opt.fps
    );
    let config = opt.config()?;
    let goal = clamp_goal(opt.goal);
    let exercise = opt.exercise;

    let trace = match &opt.trace {
        Some(path) => Trace::load(path).context("failed loading trace")?,
        None => {
            let ticks_per_rep = (opt.fps * SYNTHETIC_REP_SECS).round().max(1.0) as u32;
            Trace::synthetic(exercise, goal, ticks_per_rep)
                .context("failed building synthetic trace")?
        }
    };
    let frame_count = trace.len();

    let mut session = Session::new(config, goal).context("failed starting session")?;
    let mut throttle = Throttle::new(config.frame_sample, config.min_interval)
        .context("failed constructing scheduler")?;
    let engine = Engine::new(
        TraceModel::with_grid(trace, opt.heatmap_rows, opt.heatmap_cols),
        ArgmaxDecoder,
    )
    .context("failed constructing engine")?;

    let (completions_tx, completions_rx) = unbounded::<Completion>();
    let mut pipeline = Pipeline::spawn(engine, completions_tx);
    let mut store = JsonStore::new(&stats_path);

    info!(
        message = "starting workout",
        exercise = %exercise,
        goal,
        frames = frame_count,
        frame_sample = config.frame_sample,
    );

    let pb = if opt.show_progress {
        let pb = ProgressBar::new(u64::from(goal)).with_style(
            ProgressStyle::default_bar()
                .template("{prefix:.bold.dim} [{bar:30}] {pos}/{len} {wide_msg}")
                .progress_chars("=> "),
        );
        pb.set_prefix(exercise.label());
        Some(pb)
    } else {
        None
    };

    let frame_period = Duration::from_secs_f64(1.0 / opt.fps);
    let mut timing = Timing::default();
    let camera_running = running.clone();

    crossbeam::thread::scope(|scope| {
        let (frames_tx, frames_rx) = bounded::<usize>(1);

        scope.spawn(move |_| {
            for index in 0..frame_count {
                if !camera_running.load(Ordering::SeqCst) {
                    break;
                }
                match frames_tx.try_send(index) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        trace!(message = "apply loop behind, dropping frame", index)
                    }
                    Err(TrySendError::Disconnected(_)) => break,
                }
                std::thread::sleep(frame_period);
            }
        });

        let no_frames = never::<usize>();
        let mut camera_done = false;

        while running.load(Ordering::SeqCst) && !session.is_complete() {
            if camera_done && !throttle.is_busy() {
                break;
            }
            let frames = if camera_done { &no_frames } else { &frames_rx };

            select! {
                recv(frames) -> msg => match msg {
                    Ok(index) => {
                        if let Tick::Proceed(guard) = throttle.tick(Instant::now()) {
                            pipeline.submit(index, guard).context("failed submitting frame")?;
                        }
                    }
                    Err(_) => {
                        debug!(message = "trace exhausted", frames = throttle.frame_counter());
                        camera_done = true;
                    }
                },
                recv(completions_rx) -> msg => {
                    let completion = msg.context("inference worker hung up")?;
                    timing.inference += completion.inference;
                    timing.frames += 1;

                    match &completion.result {
                        Ok(frame) => {
                            let update = session.update(frame, Instant::now());
                            report(&update, &session, pb.as_ref());
                            if let Some(summary) = update.summary {
                                store
                                    .record(user, &summary)
                                    .context("failed recording workout")?;
                                if let Some(pb) = &pb {
                                    pb.finish_with_message(summary.message());
                                }
                                print_summary(&summary);
                            }
                        }
                        Err(e) => {
                            warn!(message = "dropping frame", seq = completion.seq, error = %e)
                        }
                    }
                },
                default(Duration::from_millis(100)) => {},
            }
        }

        Ok::<_, anyhow::Error>(())
    })
    .map_err(|_| anyhow!("camera thread panicked"))??;

    pipeline.shutdown();

    if !session.is_complete() {
        if let Some(pb) = &pb {
            pb.abandon();
        }
        info!(
            message = "workout ended before the goal",
            reps = session.reps(),
            goal = session.goal(),
            errors = session.errors(),
        );
    }

    info!(
        message = "inference timing",
        frames = timing.frames,
        model_fps = %format!("{:.1}", timing.fps()),
    );
    Ok(())
}

fn stats(user: &str, stats_path: PathBuf) -> Result<()> {
    let rows = JsonStore::new(&stats_path)
        .query_stats(user)
        .context("failed reading workout stats")?;

    if rows.is_empty() {
        println!("no workouts recorded for {}", user);
        return Ok(());
    }

    for exercise in Exercise::ALL.iter() {
        if let Some(row) = rows.iter().find(|row| row.exercise == *exercise) {
            println!(
                "{:<8} {:>5} reps  {} ({:.1})  most common error: {}",
                row.exercise.label(),
                row.total_reps,
                stars(row.rounded_stars()),
                row.avg_stars,
                row.common_error,
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    tracing::subscriber::set_global_default(
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(opt.log_level),
    )?;

    let running = Arc::new(AtomicBool::new(true));
    let running_ctrl_c = running.clone();

    ctrlc::set_handler(move || {
        running_ctrl_c.store(false, Ordering::SeqCst);
    })
    .context("failed setting Ctrl-C handler")?;

    match opt.command {
        Command::Workout(workout_opt) => workout(workout_opt, &opt.user, opt.stats_path, running),
        Command::Stats => stats(&opt.user, opt.stats_path),
    }
}
