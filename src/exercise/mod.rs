//! Rep counting and form advice.
//!
//! One [`Session`] drives any exercise; the exercise only decides which joints
//! are read, how a rep is armed and completed, and which form rules apply.

use crate::{
    error::Error,
    pose::{KeypointKind, PoseFrame, CONF_THRESHOLD},
    throttle::DEFAULT_MIN_INTERVAL,
};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    str::FromStr,
    time::{Duration, Instant},
};
use tracing::{debug, info, trace};

pub mod curl;
pub mod pushup;
pub mod squat;

pub const MIN_GOAL: u32 = 1;
pub const MAX_GOAL: u32 = 100;
pub const DEFAULT_GOAL: u32 = 10;
pub const DEFAULT_ADVICE_DURATION: Duration = Duration::from_secs(5);

/// Clamp a user-entered goal into the accepted range.
pub fn clamp_goal(raw: i64) -> u32 {
    raw.clamp(i64::from(MIN_GOAL), i64::from(MAX_GOAL)) as u32
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exercise {
    Curl,
    PushUp,
    Squat,
}

impl Exercise {
    pub const ALL: [Exercise; 3] = [Exercise::PushUp, Exercise::Curl, Exercise::Squat];

    pub fn label(self) -> &'static str {
        match self {
            Self::Curl => "Curls",
            Self::PushUp => "Pushups",
            Self::Squat => "Squats",
        }
    }

    pub fn config(self) -> ExerciseConfig {
        let (rules, frame_sample) = match self {
            Self::Curl => (Rules::Curl(Default::default()), 1),
            Self::PushUp => (Rules::PushUp(Default::default()), 5),
            Self::Squat => (Rules::Squat(Default::default()), 1),
        };
        ExerciseConfig {
            rules,
            frame_sample,
            min_interval: DEFAULT_MIN_INTERVAL,
            advice_duration: DEFAULT_ADVICE_DURATION,
            confidence_threshold: CONF_THRESHOLD,
        }
    }
}

impl fmt::Display for Exercise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Exercise {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "curl" | "curls" => Ok(Self::Curl),
            "pushup" | "pushups" | "push-up" | "push-ups" => Ok(Self::PushUp),
            "squat" | "squats" => Ok(Self::Squat),
            other => Err(format!("unknown exercise: {}", other)),
        }
    }
}

/// A form correction shown to the user.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdviceKind {
    StopMovingElbow,
    HandsTooNarrow,
    HandsTooWide,
    FeetTooNarrow,
    FeetTooWide,
    LeanForward,
    LeanBack,
}

impl AdviceKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::StopMovingElbow => "Avoid moving your elbows",
            Self::HandsTooNarrow => "Hands too narrow",
            Self::HandsTooWide => "Hands too wide",
            Self::FeetTooNarrow => "Feet too narrow",
            Self::FeetTooWide => "Feet too wide",
            Self::LeanForward => "Lean forward",
            Self::LeanBack => "Lean back",
        }
    }
}

impl fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-exercise geometry thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rules {
    Curl(curl::Thresholds),
    PushUp(pushup::Thresholds),
    Squat(squat::Thresholds),
}

impl Rules {
    pub fn exercise(&self) -> Exercise {
        match self {
            Self::Curl(_) => Exercise::Curl,
            Self::PushUp(_) => Exercise::PushUp,
            Self::Squat(_) => Exercise::Squat,
        }
    }

    /// Joints that must all be confident before a frame is interpreted.
    pub fn joints(&self) -> &'static [KeypointKind] {
        match self {
            Self::Curl(_) => &curl::JOINTS,
            Self::PushUp(_) => &pushup::JOINTS,
            Self::Squat(_) => &squat::JOINTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExerciseConfig {
    pub rules: Rules,
    /// Run inference on every Nth camera frame.
    pub frame_sample: u32,
    pub min_interval: Duration,
    pub advice_duration: Duration,
    pub confidence_threshold: f32,
}

/// What one exercise concluded from one confident frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct Step {
    pub(crate) rep_completed: bool,
    pub(crate) violation: Option<AdviceKind>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Motion {
    Curl(curl::Curl),
    PushUp(pushup::PushUp),
    Squat(squat::Squat),
}

impl From<Rules> for Motion {
    fn from(rules: Rules) -> Self {
        match rules {
            Rules::Curl(t) => Self::Curl(curl::Curl::new(t)),
            Rules::PushUp(t) => Self::PushUp(pushup::PushUp::new(t)),
            Rules::Squat(t) => Self::Squat(squat::Squat::new(t)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ActiveAdvice {
    kind: AdviceKind,
    expires_at: Instant,
}

/// The result of feeding one frame to a [`Session`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Update {
    pub reps_changed: bool,
    /// Newly raised advice, if any.
    pub advice: Option<AdviceKind>,
    pub session_complete: bool,
    /// Present exactly once, on the update that reaches the goal.
    pub summary: Option<WorkoutSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSummary {
    pub exercise: Exercise,
    pub total_reps: u32,
    pub total_errors: u32,
    pub stars: u8,
    pub common_error: Option<AdviceKind>,
}

impl WorkoutSummary {
    pub fn message(&self) -> &'static str {
        match self.stars {
            5 => "Awesome! Perfect Score!",
            4 => "Nice! Well Done!",
            3 => "Great! Almost There",
            2 => "Keep At It!",
            1 => "Keep Trying!",
            _ => "Don't Give Up!",
        }
    }

    pub fn common_error_label(&self) -> &'static str {
        self.common_error.map_or("None", AdviceKind::label)
    }
}

/// Map rep accuracy onto 0 to 5 stars.
pub fn star_rating(reps: u32, errors: u32) -> u8 {
    if reps == 0 {
        return 0;
    }
    let accuracy = f64::from(reps.saturating_sub(errors)) / f64::from(reps);
    match accuracy {
        a if a >= 0.95 => 5,
        a if a >= 0.80 => 4,
        a if a >= 0.60 => 3,
        a if a >= 0.40 => 2,
        a if a >= 0.20 => 1,
        _ => 0,
    }
}

/// One workout in progress.
///
/// Updates must all be applied from a single thread; the session is not
/// synchronized.
#[derive(Debug, Clone)]
pub struct Session {
    config: ExerciseConfig,
    goal: u32,
    reps: u32,
    errors: u32,
    motion: Motion,
    last_observed_y: Option<f32>,
    advice: Option<ActiveAdvice>,
    rep_has_error: bool,
    // first-seen order, so ties go to the earliest advice
    advice_tally: Vec<(AdviceKind, u32)>,
    complete: bool,
}

impl Session {
    pub fn new(config: ExerciseConfig, goal: u32) -> Result<Self, Error> {
        if !(MIN_GOAL..=MAX_GOAL).contains(&goal) {
            return Err(Error::InvalidGoal {
                goal,
                min: MIN_GOAL,
                max: MAX_GOAL,
            });
        }
        Ok(Self {
            motion: Motion::from(config.rules),
            config,
            goal,
            reps: 0,
            errors: 0,
            last_observed_y: None,
            advice: None,
            rep_has_error: false,
            advice_tally: Vec::new(),
            complete: false,
        })
    }

    pub fn exercise(&self) -> Exercise {
        self.config.rules.exercise()
    }

    pub fn config(&self) -> &ExerciseConfig {
        &self.config
    }

    pub fn goal(&self) -> u32 {
        self.goal
    }

    pub fn reps(&self) -> u32 {
        self.reps
    }

    pub fn errors(&self) -> u32 {
        self.errors
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn progress_percent(&self) -> u8 {
        (self.reps.min(self.goal) * 100 / self.goal) as u8
    }

    /// The advice currently on screen, if it has not expired.
    pub fn current_advice(&self, now: Instant) -> Option<AdviceKind> {
        self.advice
            .filter(|advice| now < advice.expires_at)
            .map(|advice| advice.kind)
    }

    pub fn update(&mut self, frame: &PoseFrame, now: Instant) -> Update {
        if self.complete {
            return Update {
                session_complete: true,
                ..Default::default()
            };
        }

        if self
            .advice
            .map_or(false, |advice| now >= advice.expires_at)
        {
            self.advice = None;
        }

        if !frame.all_confident(self.config.rules.joints(), self.config.confidence_threshold) {
            trace!(message = "pose not confidently observed", exercise = %self.exercise());
            self.advice = None;
            return Update::default();
        }

        let step = match &mut self.motion {
            Motion::Curl(curl) => curl.step(frame, &mut self.last_observed_y),
            Motion::PushUp(pushup) => pushup.step(frame),
            Motion::Squat(squat) => squat.step(frame),
        };

        let mut update = Update {
            advice: self.raise_advice(step.violation, now),
            ..Default::default()
        };

        if step.rep_completed {
            self.reps += 1;
            if self.rep_has_error {
                self.errors += 1;
            }
            self.rep_has_error = false;
            update.reps_changed = true;
            debug!(
                message = "rep completed",
                exercise = %self.exercise(),
                reps = self.reps,
                errors = self.errors,
            );

            if self.reps >= self.goal {
                self.complete = true;
                let summary = self.summary();
                info!(
                    message = "goal reached",
                    exercise = %summary.exercise,
                    reps = summary.total_reps,
                    errors = summary.total_errors,
                    stars = summary.stars,
                );
                update.session_complete = true;
                update.summary = Some(summary);
            }
        }

        update
    }

    fn raise_advice(&mut self, violation: Option<AdviceKind>, now: Instant) -> Option<AdviceKind> {
        let kind = match violation {
            Some(kind) => kind,
            None => {
                self.advice = None;
                return None;
            }
        };

        self.rep_has_error = true;
        if self.advice.map_or(false, |advice| advice.kind == kind) {
            return None;
        }

        self.advice = Some(ActiveAdvice {
            kind,
            expires_at: now + self.config.advice_duration,
        });
        match self.advice_tally.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, count)) => *count += 1,
            None => self.advice_tally.push((kind, 1)),
        }
        debug!(message = "advice raised", advice = %kind);
        Some(kind)
    }

    fn most_common_advice(&self) -> Option<AdviceKind> {
        self.advice_tally
            .iter()
            .fold(None, |best: Option<(AdviceKind, u32)>, &(kind, count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((kind, count)),
            })
            .map(|(kind, _)| kind)
    }

    pub fn summary(&self) -> WorkoutSummary {
        WorkoutSummary {
            exercise: self.exercise(),
            total_reps: self.reps,
            total_errors: self.errors,
            stars: star_rating(self.reps, self.errors),
            common_error: self.most_common_advice(),
        }
    }
}
