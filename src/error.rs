use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    /// The build command for the program under test exited nonzero.
    #[error("build of {program} failed ({status}): {command}")]
    BuildFailure {
        program: String,
        status: String,
        command: String,
    },

    /// An input file was absent when an invocation was prepared.
    #[error("missing input file: {}", .0.display())]
    MissingFile(PathBuf),

    /// The compiled artifact was absent when an invocation was prepared.
    #[error("missing compiled artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    /// Action symbol outside `-`, `+`, `-+`.
    #[error("unrecognized action: {0:?}")]
    InvalidAction(String),

    /// A child process exited nonzero or was killed by a signal.
    #[error("subprocess failed with {}: {command}", describe_code(.code))]
    SubprocessFailure { code: Option<i32>, command: String },

    /// Discovery found nothing to test.
    #[error("no cases found in {} ({what})", .dir.display())]
    EmptyCorpus { dir: PathBuf, what: String },

    /// Standard deviation needs at least two observations.
    #[error("statistics undefined for {0} observation(s)")]
    StatsUndefined(usize),

    /// A child process ran past the configured limit and was killed.
    #[error("subprocess exceeded {limit:?}: {command}")]
    Timeout { command: String, limit: Duration },

    /// Invalid or unreadable configuration.
    #[error("config error: {0}")]
    Config(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Propagated I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "termination by signal".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
