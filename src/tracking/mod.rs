//! Experiment tracking.

pub use crate::{config::TrainerConfig, error::Error};

use rand::Rng;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// A sink of scalars tracked over iterations.
pub trait Tracker {
    /// The identifier of the run.
    fn run_id(&self) -> &str;

    /// Tracking the scalars at the iteration.
    fn log(
        &mut self,
        iteration: u64,
        scalars: &[(&str, f64)],
    ) -> Result<(), Error>;
}

/// A run tracked as JSON lines in the run directory.
///
/// ## Layout
///
/// ```plaintext
/// <run_dir>/tracking/latest-run/config.json
/// <run_dir>/tracking/latest-run/run-<id>.jsonl
/// ```
#[derive(Debug)]
pub struct RunTracker {
    is_resumed: bool,
    path: PathBuf,
    run_id: String,
    writer: BufWriter<fs::File>,
}

impl RunTracker {
    pub const RUN_ID_LENGTH: usize = 8;
    const RUN_ID_CHARSET: &'static [u8] =
        b"abcdefghijklmnopqrstuvwxyz0123456789";

    /// Initializing a run, resuming the latest one if it is found.
    pub fn init(
        run_dir: &Path,
        project: &str,
        config: &TrainerConfig,
    ) -> Result<Self, Error> {
        let directory = run_dir.join("tracking").join("latest-run");
        let resumed_id = Self::find_run_id(&directory)?;
        let is_resumed = resumed_id.is_some();
        let run_id = resumed_id.unwrap_or_else(Self::new_run_id);

        fs::create_dir_all(&directory)?;
        let mut header = JsonMap::new();
        header.insert("project".into(), project.into());
        header.insert("run_id".into(), run_id.to_owned().into());
        header.insert("config".into(), config.to_json()?);
        fs::write(
            directory.join("config.json"),
            serde_json::to_vec_pretty(&JsonValue::Object(header))?,
        )?;

        let path = directory.join(format!("run-{run_id}.jsonl"));
        let file = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)?;

        if is_resumed {
            log::info!(
                target: "gausplat::feedforward::tracking",
                "Resuming the run {run_id} of project {project}",
            );
        } else {
            log::info!(
                target: "gausplat::feedforward::tracking",
                "Starting the run {run_id} of project {project}",
            );
        }

        Ok(Self {
            is_resumed,
            path,
            run_id,
            writer: BufWriter::new(file),
        })
    }

    #[inline]
    pub fn is_resumed(&self) -> bool {
        self.is_resumed
    }

    /// The path of the JSON lines.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn find_run_id(directory: &Path) -> Result<Option<String>, Error> {
        if !directory.is_dir() {
            return Ok(None);
        }

        for entry in fs::read_dir(directory)? {
            let name = entry?.file_name();
            let run_id = name
                .to_str()
                .and_then(|name| name.strip_prefix("run-"))
                .and_then(|name| name.strip_suffix(".jsonl"));
            if let Some(run_id) = run_id.filter(|id| !id.is_empty()) {
                return Ok(Some(run_id.to_owned()));
            }
        }

        Ok(None)
    }

    fn new_run_id() -> String {
        let mut rng = rand::thread_rng();
        (0..Self::RUN_ID_LENGTH)
            .map(|_| {
                let index = rng.gen_range(0..Self::RUN_ID_CHARSET.len());
                Self::RUN_ID_CHARSET[index] as char
            })
            .collect()
    }
}

impl Tracker for RunTracker {
    #[inline]
    fn run_id(&self) -> &str {
        &self.run_id
    }

    fn log(
        &mut self,
        iteration: u64,
        scalars: &[(&str, f64)],
    ) -> Result<(), Error> {
        let mut line = JsonMap::with_capacity(scalars.len() + 1);
        line.insert("iteration".into(), iteration.into());
        scalars.iter().for_each(|&(name, value)| {
            line.insert(name.into(), value.into());
        });

        serde_json::to_writer(&mut self.writer, &line)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_then_resume() {
        let directory = tempfile::tempdir().unwrap();
        let config = TrainerConfig::default();

        let mut tracker =
            RunTracker::init(directory.path(), "gs_pred", &config).unwrap();
        assert!(!tracker.is_resumed());
        assert_eq!(tracker.run_id().len(), RunTracker::RUN_ID_LENGTH);
        assert!(tracker
            .run_id()
            .bytes()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        tracker.log(1, &[("training_loss", -1.5)]).unwrap();
        let run_id = tracker.run_id().to_owned();
        drop(tracker);

        let mut tracker =
            RunTracker::init(directory.path(), "gs_pred", &config).unwrap();
        assert!(tracker.is_resumed());
        assert_eq!(tracker.run_id(), run_id);
        tracker.log(2, &[("PSNR_novel", 20.0)]).unwrap();

        let lines = fs::read_to_string(tracker.path()).unwrap();
        let lines = lines
            .lines()
            .map(|line| serde_json::from_str::<JsonValue>(line).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["iteration"], 1);
        assert_eq!(lines[0]["training_loss"], -1.5);
        assert_eq!(lines[1]["PSNR_novel"], 20.0);

        let header = fs::read(
            directory.path().join("tracking/latest-run/config.json"),
        )
        .unwrap();
        let header = serde_json::from_slice::<JsonValue>(&header).unwrap();
        assert_eq!(header["project"], "gs_pred");
        assert_eq!(header["config"]["opt"]["batch_size"], 8);
    }

    #[test]
    fn start_when_tracking_has_no_run() {
        let directory = tempfile::tempdir().unwrap();
        fs::create_dir_all(directory.path().join("tracking/latest-run"))
            .unwrap();

        let tracker = RunTracker::init(
            directory.path(),
            "gs_pred",
            &TrainerConfig::default(),
        )
        .unwrap();
        assert!(!tracker.is_resumed());
    }
}
