//! Invocations of the program under test.
//!
//! Encode and decode run one process with stdin redirected from the input
//! file. Encode-then-decode spawns two processes and connects the first
//! one's stdout to the second one's stdin; no intermediate file is written.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::action::ActionKind;
use crate::error::{HarnessError, Result};
use crate::program::CompiledProgram;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Where the last stage's stdout goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSink {
    /// Collected and returned to the caller for comparison.
    Capture,
    /// Thrown away; only the duration matters.
    Discard,
}

/// A fully resolved invocation, ready to spawn.
#[derive(Debug, Clone)]
pub struct Invocation {
    stages: Vec<Vec<String>>,
    input: PathBuf,
    sink: OutputSink,
    work_dir: PathBuf,
}

/// Resolves (action, input) pairs into invocations of one compiled program.
pub struct CommandBuilder<'a> {
    program: &'a CompiledProgram,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(program: &'a CompiledProgram) -> Self {
        Self { program }
    }

    pub fn build(&self, action: ActionKind, input: &Path, sink: OutputSink) -> Result<Invocation> {
        if !input.is_file() {
            return Err(HarnessError::MissingFile(input.to_path_buf()));
        }
        let artifact = self.program.artifact_path();
        if !artifact.is_file() {
            return Err(HarnessError::MissingArtifact(artifact.to_path_buf()));
        }

        let toolchain = self.program.toolchain();
        let launch = toolchain.run_command(self.program.name())?;
        let stage = |flag: &str| {
            let mut argv = launch.clone();
            argv.push(flag.to_string());
            argv
        };
        let stages = match action {
            ActionKind::Encode => vec![stage("-")],
            ActionKind::Decode => vec![stage("+")],
            ActionKind::EncodeThenDecode => vec![stage("-"), stage("+")],
        };

        // The child runs in the work dir, so relative inputs are resolved here.
        let input = std::path::absolute(input)?;
        Ok(Invocation {
            stages,
            input,
            sink,
            work_dir: toolchain.work_dir.clone(),
        })
    }

    /// Same as [`CommandBuilder::build`], taking the action as its symbol.
    pub fn build_symbol(&self, symbol: &str, input: &Path, sink: OutputSink) -> Result<Invocation> {
        self.build(ActionKind::from_symbol(symbol)?, input, sink)
    }
}

impl Invocation {
    pub fn stages(&self) -> &[Vec<String>] {
        &self.stages
    }

    /// Shell-like rendering used in error messages and logs.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (i, argv) in self.stages.iter().enumerate() {
            if i == 0 {
                out.push_str(&format!("{} < {}", argv.join(" "), self.input.display()));
            } else {
                out.push_str(&format!(" | {}", argv.join(" ")));
            }
        }
        if self.sink == OutputSink::Discard {
            out.push_str(" > /dev/null");
        }
        out
    }

    /// Spawn every stage and start collecting output. With a timeout, each
    /// stage leads its own process group so that expiry also reaches any
    /// processes the stage forked.
    pub fn spawn(&self, timeout: Option<Duration>) -> Result<Running> {
        debug!(command = %self.describe(), ?timeout, "spawning");
        let mut children: Vec<Child> = Vec::with_capacity(self.stages.len());
        let mut upstream: Option<ChildStdout> = None;

        for (i, argv) in self.stages.iter().enumerate() {
            let last = i + 1 == self.stages.len();
            let stdin = match upstream.take() {
                Some(pipe) => Stdio::from(pipe),
                None => Stdio::from(File::open(&self.input)?),
            };
            let stdout = if !last || self.sink == OutputSink::Capture {
                Stdio::piped()
            } else {
                Stdio::null()
            };
            let mut command = Command::new(&argv[0]);
            command
                .args(&argv[1..])
                .current_dir(&self.work_dir)
                .stdin(stdin)
                .stdout(stdout)
                .stderr(Stdio::inherit());
            #[cfg(unix)]
            if timeout.is_some() {
                use std::os::unix::process::CommandExt;
                command.process_group(0);
            }
            let spawned = command.spawn();
            let mut child = match spawned {
                Ok(child) => child,
                Err(e) => {
                    kill_all(&mut children);
                    return Err(e.into());
                }
            };
            if !last {
                upstream = child.stdout.take();
            }
            children.push(child);
        }

        let reader = match children.last_mut().and_then(|c| c.stdout.take()) {
            Some(mut stdout) => Some(thread::spawn(move || {
                let mut buf = Vec::new();
                stdout.read_to_end(&mut buf).map(|_| buf)
            })),
            None => None,
        };

        Ok(Running {
            children,
            reader,
            command: self.describe(),
            timeout,
        })
    }
}

/// Spawned stages of an [`Invocation`].
pub struct Running {
    children: Vec<Child>,
    reader: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    command: String,
    timeout: Option<Duration>,
}

impl Running {
    /// Block until every stage exits. Returns captured output (empty for a
    /// discarded sink). The first stage to exit nonzero decides the error.
    pub fn wait(mut self) -> Result<Vec<u8>> {
        let statuses = match self.timeout {
            None => self
                .children
                .iter_mut()
                .map(Child::wait)
                .collect::<std::io::Result<Vec<_>>>()?,
            Some(limit) => match wait_with_deadline(&mut self.children, Instant::now() + limit) {
                Ok(Some(statuses)) => statuses,
                Ok(None) => {
                    self.abort();
                    return Err(HarnessError::Timeout {
                        command: self.command,
                        limit,
                    });
                }
                Err(e) => {
                    self.abort();
                    return Err(e);
                }
            },
        };

        let output = self.join_reader()?;
        if let Some(failed) = statuses.iter().find(|s| !s.success()) {
            return Err(HarnessError::SubprocessFailure {
                code: failed.code(),
                command: self.command,
            });
        }
        Ok(output)
    }

    /// Kill every stage's group and reap the stages. A process that left
    /// its group may still hold the output pipe, so the reader is abandoned
    /// rather than joined.
    fn abort(&mut self) {
        kill_groups(&mut self.children);
        drop(self.reader.take());
    }

    fn join_reader(&mut self) -> Result<Vec<u8>> {
        match self.reader.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| std::io::Error::other("output reader panicked"))?
                .map_err(HarnessError::from),
            None => Ok(Vec::new()),
        }
    }
}

/// Poll until all children exit. `None` means the deadline passed first.
fn wait_with_deadline(children: &mut [Child], deadline: Instant) -> Result<Option<Vec<ExitStatus>>> {
    let mut statuses: Vec<Option<ExitStatus>> = vec![None; children.len()];
    loop {
        for (child, status) in children.iter_mut().zip(statuses.iter_mut()) {
            if status.is_none() {
                *status = child.try_wait()?;
            }
        }
        if statuses.iter().all(Option::is_some) {
            return Ok(Some(statuses.into_iter().flatten().collect()));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kill each stage's process group, then reap the stages themselves.
fn kill_groups(children: &mut [Child]) {
    #[cfg(unix)]
    for child in children.iter() {
        // Each stage was spawned as the leader of its own group.
        unsafe {
            libc::kill(-(child.id() as libc::pid_t), libc::SIGKILL);
        }
    }
    kill_all(children);
}

fn kill_all(children: &mut [Child]) {
    for child in children.iter_mut() {
        let _ = child.kill();
        let _ = child.wait();
    }
}

/// Build, run and capture the output of one invocation.
pub fn run_capture(invocation: &Invocation, timeout: Option<Duration>) -> Result<Vec<u8>> {
    invocation.spawn(timeout)?.wait()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(stages: &[&[&str]], sink: OutputSink, input: &Path) -> Invocation {
        Invocation {
            stages: stages
                .iter()
                .map(|argv| argv.iter().map(|s| s.to_string()).collect())
                .collect(),
            input: input.to_path_buf(),
            sink,
            work_dir: PathBuf::from("."),
        }
    }

    #[test]
    fn pipeline_connects_stages() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::write(&input, b"hello").unwrap();
        let inv = invocation(
            &[&["tr", "a-z", "A-Z"], &["tr", "L", "_"]],
            OutputSink::Capture,
            &input,
        );
        assert_eq!(run_capture(&inv, None).unwrap(), b"HE__O");
    }

    #[test]
    fn discarded_output_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::write(&input, b"hello").unwrap();
        let inv = invocation(&[&["cat"]], OutputSink::Discard, &input);
        assert!(run_capture(&inv, None).unwrap().is_empty());
        assert!(inv.describe().ends_with("> /dev/null"));
    }

    #[test]
    fn nonzero_exit_carries_code() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::write(&input, b"").unwrap();
        let inv = invocation(&[&["sh", "-c", "exit 2"]], OutputSink::Discard, &input);
        match run_capture(&inv, None).unwrap_err() {
            HarnessError::SubprocessFailure { code, command } => {
                assert_eq!(code, Some(2));
                assert!(command.contains("exit 2"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn upstream_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::write(&input, b"").unwrap();
        let inv = invocation(
            &[&["sh", "-c", "exit 5"], &["cat"]],
            OutputSink::Capture,
            &input,
        );
        assert!(matches!(
            run_capture(&inv, None).unwrap_err(),
            HarnessError::SubprocessFailure { code: Some(5), .. }
        ));
    }

    #[test]
    fn deadline_kills_hung_child() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::write(&input, b"").unwrap();
        let inv = invocation(&[&["sleep", "5"]], OutputSink::Discard, &input);
        let start = Instant::now();
        let err = run_capture(&inv, Some(Duration::from_millis(100))).unwrap_err();
        assert!(matches!(err, HarnessError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn abort_reaps_all_stages() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::write(&input, b"").unwrap();
        let inv = invocation(
            &[&["sh", "-c", "sleep 5"], &["sh", "-c", "cat; sleep 5"]],
            OutputSink::Capture,
            &input,
        );
        let mut running = inv.spawn(Some(Duration::from_secs(60))).unwrap();
        let start = Instant::now();
        running.abort();
        assert!(running.reader.is_none());
        for child in running.children.iter_mut() {
            assert!(child.try_wait().unwrap().is_some());
        }
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn deadline_is_not_held_up_by_forked_writer() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::write(&input, b"").unwrap();
        let inv = invocation(
            &[&["sh", "-c", "sleep 3; echo done"]],
            OutputSink::Capture,
            &input,
        );
        let start = Instant::now();
        let err = run_capture(&inv, Some(Duration::from_millis(100))).unwrap_err();
        assert!(matches!(err, HarnessError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(2), "{:?}", start.elapsed());
    }

    #[test]
    fn deadline_kills_every_pipeline_stage() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::write(&input, b"").unwrap();
        let inv = invocation(
            &[&["sh", "-c", "sleep 3; echo done"], &["sh", "-c", "cat; sleep 3"]],
            OutputSink::Capture,
            &input,
        );
        let start = Instant::now();
        let err = run_capture(&inv, Some(Duration::from_millis(100))).unwrap_err();
        assert!(matches!(err, HarnessError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(2), "{:?}", start.elapsed());
    }
}
