use std::fmt;
use std::io;
use std::path::Path;

use crate::error::HarnessError;

#[derive(Debug)]
pub struct CliError {
    pub msg: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.msg.fmt(f)
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Format a user friendly I/O error message with suggestions.
pub fn format_io_error(operation: &str, path: &Path, err: &io::Error) -> String {
    use io::ErrorKind::*;
    let suggestion = match err.kind() {
        NotFound => "Check that the file exists and the path is correct.",
        PermissionDenied => "Check permissions or run as a different user.",
        WriteZero => "Disk may be full. Free up space and try again.",
        _ => "Check permissions or free up disk space.",
    };
    format!("Error {} '{}': {}. {}", operation, path.display(), err, suggestion)
}

/// Convert an I/O error into a CLI error with context.
pub fn io_cli_error(operation: &str, path: &Path, err: io::Error) -> CliError {
    CliError {
        msg: format_io_error(operation, path, &err),
        source: Some(Box::new(err)),
    }
}

/// Simple CLI error from string.
pub fn simple_cli_error(msg: &str) -> CliError {
    CliError {
        msg: msg.to_string(),
        source: None,
    }
}

/// Convert a harness error into a CLI error with a hint.
pub fn harness_cli_error(context: &str, err: HarnessError) -> CliError {
    CliError {
        msg: format!("{}: {}", context, cli_hint(&err)),
        source: Some(Box::new(err)),
    }
}

/// Return an actionable hint for a harness error variant.
pub fn cli_hint(err: &HarnessError) -> String {
    use HarnessError::*;
    match err {
        BuildFailure { .. } => format!("{err}. Fix the compile errors and retry."),
        MissingFile(_) => format!("{err}. Check that the file exists and the path is correct."),
        MissingArtifact(_) => format!("{err}. The build did not produce it; check the toolchain suffix."),
        InvalidAction(_) => format!("{err}. Use -, + or -+."),
        SubprocessFailure { .. } => format!("{err}. The program under test crashed or rejected its input."),
        EmptyCorpus { .. } => format!("{err}. Nothing was tested."),
        StatsUndefined(_) => format!("{err}. Repeat at least twice for a standard deviation."),
        Timeout { .. } => format!("{err}. Raise --timeout or fix the hang."),
        Config(_) => format!("{err}. Check the config file and flags."),
        Csv(_) | Io(_) => err.to_string(),
    }
}
