//! Per-user workout history and the aggregates shown on a stats screen.

use crate::{
    error::Error,
    exercise::{Exercise, WorkoutSummary},
};
use serde::{Deserialize, Serialize};
use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

/// One persisted workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRecord {
    pub username: String,
    pub exercise: Exercise,
    pub reps: u32,
    pub stars: u8,
    pub error: String,
}

impl StatsRecord {
    pub fn new(username: &str, summary: &WorkoutSummary) -> Self {
        Self {
            username: username.to_owned(),
            exercise: summary.exercise,
            reps: summary.total_reps,
            stars: summary.stars,
            error: summary.common_error_label().to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseStats {
    pub exercise: Exercise,
    pub total_reps: u64,
    pub avg_stars: f64,
    pub common_error: String,
}

impl ExerciseStats {
    /// Average stars rounded half up, for drawing a row of whole stars.
    pub fn rounded_stars(&self) -> u8 {
        (self.avg_stars + 0.5).floor() as u8
    }
}

pub trait StatsStore {
    fn record(&mut self, username: &str, summary: &WorkoutSummary) -> Result<(), Error>;

    fn query_stats(&self, username: &str) -> Result<Vec<ExerciseStats>, Error>;
}

/// In-memory aggregation over completed workouts.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    records: Vec<StatsRecord>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: StatsRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Totals per exercise, in the order each exercise was first recorded.
    ///
    /// The common error is the most frequent label; ties go to the label seen
    /// first.
    pub fn query(&self, username: &str) -> Vec<ExerciseStats> {
        let mut groups: Vec<(Exercise, Vec<&StatsRecord>)> = Vec::new();
        for record in self.records.iter().filter(|r| r.username == username) {
            match groups.iter_mut().find(|(e, _)| *e == record.exercise) {
                Some((_, records)) => records.push(record),
                None => groups.push((record.exercise, vec![record])),
            }
        }

        groups
            .into_iter()
            .map(|(exercise, records)| {
                let total_reps = records.iter().map(|r| u64::from(r.reps)).sum();
                let avg_stars = records.iter().map(|r| f64::from(r.stars)).sum::<f64>()
                    / records.len() as f64;
                ExerciseStats {
                    exercise,
                    total_reps,
                    avg_stars,
                    common_error: mode(records.iter().map(|r| r.error.as_str()))
                        .unwrap_or("None")
                        .to_owned(),
                }
            })
            .collect()
    }
}

fn mode<'a>(labels: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for label in labels {
        match counts.iter_mut().find(|(l, _)| *l == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label, 1)),
        }
    }
    counts
        .into_iter()
        .fold(None, |best: Option<(&str, usize)>, (label, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((label, count)),
        })
        .map(|(label, _)| label)
}

impl StatsStore for Aggregator {
    fn record(&mut self, username: &str, summary: &WorkoutSummary) -> Result<(), Error> {
        self.push(StatsRecord::new(username, summary));
        Ok(())
    }

    fn query_stats(&self, username: &str) -> Result<Vec<ExerciseStats>, Error> {
        Ok(self.query(username))
    }
}

/// Workout history kept as one JSON record per line.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new<P>(path: P) -> Self
    where
        P: AsRef<Path>,
    {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self) -> Result<Aggregator, Error> {
        let mut aggregator = Aggregator::new();
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(aggregator),
            Err(e) => return Err(Error::OpenStats(e, self.path.clone())),
        };

        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| Error::OpenStats(e, self.path.clone()))?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line)
                .map_err(|e| Error::ParseStats(e, i + 1))?;
            aggregator.push(record);
        }
        Ok(aggregator)
    }
}

impl StatsStore for JsonStore {
    fn record(&mut self, username: &str, summary: &WorkoutSummary) -> Result<(), Error> {
        let record = StatsRecord::new(username, summary);
        let mut line = serde_json::to_string(&record).map_err(Error::SerializeStats)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::OpenStats(e, self.path.clone()))?;
        file.write_all(line.as_bytes()).map_err(Error::WriteStats)?;
        debug!(message = "recorded workout", path = ?self.path, exercise = %record.exercise);
        Ok(())
    }

    fn query_stats(&self, username: &str) -> Result<Vec<ExerciseStats>, Error> {
        Ok(self.load()?.query(username))
    }
}

#[cfg(test)]
mod tests {
    use super::{Aggregator, JsonStore, StatsStore};
    use crate::exercise::{AdviceKind, Exercise, WorkoutSummary};
    use assert_approx_eq::assert_approx_eq;

    fn summary(
        exercise: Exercise,
        reps: u32,
        stars: u8,
        error: Option<AdviceKind>,
    ) -> WorkoutSummary {
        WorkoutSummary {
            exercise,
            total_reps: reps,
            total_errors: 0,
            stars,
            common_error: error,
        }
    }

    #[test]
    fn aggregates_per_exercise_for_one_user() {
        let mut store = Aggregator::new();
        store
            .record("ana", &summary(Exercise::Squat, 10, 5, None))
            .unwrap();
        store
            .record("ana", &summary(Exercise::Curl, 12, 3, Some(AdviceKind::StopMovingElbow)))
            .unwrap();
        store
            .record("ana", &summary(Exercise::Squat, 20, 4, Some(AdviceKind::LeanBack)))
            .unwrap();
        store
            .record("ana", &summary(Exercise::Squat, 5, 2, Some(AdviceKind::LeanBack)))
            .unwrap();
        store
            .record("bo", &summary(Exercise::Squat, 99, 0, None))
            .unwrap();

        let stats = store.query_stats("ana").unwrap();
        assert_eq!(stats.len(), 2);

        let squats = &stats[0];
        assert_eq!(squats.exercise, Exercise::Squat);
        assert_eq!(squats.total_reps, 35);
        assert_approx_eq!(squats.avg_stars, 11.0 / 3.0);
        assert_eq!(squats.rounded_stars(), 4);
        assert_eq!(squats.common_error, "Lean back");

        let curls = &stats[1];
        assert_eq!(curls.exercise, Exercise::Curl);
        assert_eq!(curls.total_reps, 12);
        assert_eq!(curls.common_error, "Avoid moving your elbows");
    }

    #[test]
    fn common_error_ties_go_to_first_seen() {
        let mut store = Aggregator::new();
        store
            .record("ana", &summary(Exercise::PushUp, 10, 4, Some(AdviceKind::HandsTooWide)))
            .unwrap();
        store
            .record("ana", &summary(Exercise::PushUp, 10, 4, Some(AdviceKind::HandsTooNarrow)))
            .unwrap();
        let stats = store.query_stats("ana").unwrap();
        assert_eq!(stats[0].common_error, "Hands too wide");
    }

    #[test]
    fn unknown_user_has_no_stats() {
        let store = Aggregator::new();
        assert!(store.query_stats("nobody").unwrap().is_empty());
    }

    #[test]
    fn rounded_stars_rounds_half_up() {
        let mut store = Aggregator::new();
        store
            .record("ana", &summary(Exercise::Curl, 1, 2, None))
            .unwrap();
        store
            .record("ana", &summary(Exercise::Curl, 1, 3, None))
            .unwrap();
        assert_eq!(store.query("ana")[0].rounded_stars(), 3);
    }

    #[test]
    fn json_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.jsonl");

        let mut store = JsonStore::new(&path);
        assert!(store.query_stats("ana").unwrap().is_empty());
        store
            .record("ana", &summary(Exercise::Curl, 8, 5, None))
            .unwrap();
        store
            .record("ana", &summary(Exercise::Curl, 4, 3, Some(AdviceKind::StopMovingElbow)))
            .unwrap();

        let reopened = JsonStore::new(&path);
        let aggregator = reopened.load().unwrap();
        assert_eq!(aggregator.len(), 2);
        let stats = reopened.query_stats("ana").unwrap();
        assert_eq!(stats[0].total_reps, 12);
        assert_approx_eq!(stats[0].avg_stars, 4.0);
        // one "None" and one elbow record tie, first seen wins
        assert_eq!(stats[0].common_error, "None");
    }

    #[test]
    fn corrupt_line_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.jsonl");
        std::fs::write(&path, "{\"not\": \"a record\"}\n").unwrap();
        assert!(matches!(
            JsonStore::new(&path).load(),
            Err(crate::error::Error::ParseStats(_, 1))
        ));
    }
}
