//! Repeated timing of the program under test.
//!
//! Observations are written as CSV rows (`classname,file,bytes,action,time`)
//! and flushed one at a time, so rows survive a later fatal error. Order is
//! file, then action, then repetition.

use std::fs;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use tracing::info;

use crate::action::ActionKind;
use crate::command::{CommandBuilder, OutputSink};
use crate::error::{HarnessError, Result};
use crate::program::CompiledProgram;
use crate::timer::Timer;

/// One timed execution of one action against one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingObservation {
    #[serde(rename = "classname")]
    pub program: String,
    pub file: String,
    pub bytes: u64,
    #[serde(serialize_with = "serialize_action")]
    pub action: ActionKind,
    /// Seconds.
    pub time: f64,
}

fn serialize_action<S: serde::Serializer>(action: &ActionKind, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(action.symbol())
}

/// CSV sink for observations; every row is flushed as soon as it is written.
pub struct ObservationWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl<W: Write> ObservationWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            inner: csv::Writer::from_writer(out),
        }
    }

    pub fn write(&mut self, observation: &TimingObservation) -> Result<()> {
        self.inner.serialize(observation)?;
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.inner
            .into_inner()
            .map_err(|e| HarnessError::Io(e.into_error()))
    }
}

/// Durations of one (file, action) group, in seconds.
#[derive(Debug, Clone)]
pub struct GroupTimings {
    pub file: PathBuf,
    pub action: ActionKind,
    pub durations: Vec<f64>,
}

pub struct BenchmarkRunner<'a> {
    program: &'a CompiledProgram,
    timer: Timer,
    repeat: usize,
    actions: Vec<ActionKind>,
    show_progress: bool,
}

impl<'a> BenchmarkRunner<'a> {
    pub fn new(program: &'a CompiledProgram, timer: Timer, repeat: usize) -> Result<Self> {
        if repeat == 0 {
            return Err(HarnessError::Config("repeat count must be at least 1".into()));
        }
        Ok(Self {
            program,
            timer,
            repeat,
            actions: ActionKind::ALL.to_vec(),
            show_progress: true,
        })
    }

    /// Restrict the actions timed per file. An empty list keeps the default.
    pub fn with_actions(mut self, actions: Vec<ActionKind>) -> Self {
        if !actions.is_empty() {
            self.actions = actions;
        }
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn run<W: Write>(
        &self,
        files: &[PathBuf],
        out: &mut ObservationWriter<W>,
    ) -> Result<Vec<GroupTimings>> {
        info!(
            program = self.program.name(),
            repeat = self.repeat,
            files = files.len(),
            "running benchmark"
        );
        let builder = CommandBuilder::new(self.program);
        let mut groups = Vec::with_capacity(files.len() * self.actions.len());

        for file in files {
            for &action in &self.actions {
                let invocation = builder.build(action, file, OutputSink::Discard)?;
                let bytes = file_size(file)?;
                let progress = self.progress(file, action);
                let mut durations = Vec::with_capacity(self.repeat);

                for _ in 0..self.repeat {
                    let elapsed = self.timer.time(&invocation)?.as_secs_f64();
                    out.write(&TimingObservation {
                        program: self.program.name().to_string(),
                        file: file.display().to_string(),
                        bytes,
                        action,
                        time: elapsed,
                    })?;
                    durations.push(elapsed);
                    progress.tick();
                }
                progress.finish();

                groups.push(GroupTimings {
                    file: file.clone(),
                    action,
                    durations,
                });
            }
        }
        Ok(groups)
    }

    fn progress(&self, file: &Path, action: ActionKind) -> Progress {
        if !self.show_progress {
            return Progress::Hidden;
        }
        let prefix = format!("{} {} {}", self.program.name(), action, file.display());
        if !std::io::stderr().is_terminal() {
            eprint!("{prefix} ");
            return Progress::Plain;
        }
        let bar = ProgressBar::with_draw_target(Some(self.repeat as u64), ProgressDrawTarget::stderr());
        if let Ok(style) = ProgressStyle::with_template("{prefix} [{bar:30}] {pos}/{len} {elapsed}") {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_prefix(prefix);
        Progress::Bar(bar)
    }
}

/// Per-group progress on stderr: a bar on a terminal, one `.` per
/// observation otherwise.
enum Progress {
    Bar(ProgressBar),
    Plain,
    Hidden,
}

impl Progress {
    fn tick(&self) {
        match self {
            Progress::Bar(bar) => bar.inc(1),
            Progress::Plain => eprint!("."),
            Progress::Hidden => {}
        }
    }

    fn finish(&self) {
        match self {
            Progress::Bar(bar) => bar.finish(),
            Progress::Plain => eprintln!(),
            Progress::Hidden => {}
        }
    }
}

fn file_size(path: &Path) -> Result<u64> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(HarnessError::MissingFile(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}
