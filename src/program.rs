//! Build and cleanup of the program under test.
//!
//! [`CompiledProgram::acquire`] runs the toolchain's build command and hands
//! back a guard. Artifacts are deleted by [`CompiledProgram::release`] or, on
//! any other exit path, when the guard is dropped.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::config::Toolchain;
use crate::error::{HarnessError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uncompiled,
    Compiled,
    CleanedUp,
}

/// An externally authored codec, identified by name.
#[derive(Debug, Clone)]
pub struct ProgramUnderTest {
    name: String,
    artifact: PathBuf,
    state: LifecycleState,
}

impl ProgramUnderTest {
    pub fn new(name: &str, toolchain: &Toolchain) -> Self {
        Self {
            name: name.to_string(),
            artifact: toolchain.artifact_path(name),
            state: LifecycleState::Uncompiled,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }
}

/// Scoped handle on a built program. Owns the artifacts until released.
#[derive(Debug)]
pub struct CompiledProgram {
    program: ProgramUnderTest,
    toolchain: Toolchain,
}

impl CompiledProgram {
    /// Build `name` with `toolchain`. A failed build leaves nothing behind.
    pub fn acquire(name: &str, toolchain: &Toolchain) -> Result<Self> {
        let argv = toolchain.build_command(name)?;
        let command = argv.join(" ");
        info!(program = name, %command, "building program under test");

        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .current_dir(&toolchain.work_dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| HarnessError::BuildFailure {
                program: name.to_string(),
                status: format!("could not start: {e}"),
                command: command.clone(),
            })?;

        let mut compiled = Self {
            program: ProgramUnderTest::new(name, toolchain),
            toolchain: toolchain.clone(),
        };
        compiled.program.state = LifecycleState::Compiled;

        // Compiler chatter goes to stderr; stdout may carry CSV rows.
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(&output.stdout)?;
        stderr.write_all(&output.stderr)?;
        drop(stderr);

        if !output.status.success() {
            compiled.release()?;
            return Err(HarnessError::BuildFailure {
                program: name.to_string(),
                status: output.status.to_string(),
                command,
            });
        }
        Ok(compiled)
    }

    pub fn name(&self) -> &str {
        self.program.name()
    }

    pub fn program(&self) -> &ProgramUnderTest {
        &self.program
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn artifact_path(&self) -> &Path {
        self.program.artifact()
    }

    /// Delete every artifact of this program. Returns how many files were
    /// removed; calling it again is a no-op.
    pub fn release(&mut self) -> Result<usize> {
        if self.program.state != LifecycleState::Compiled {
            return Ok(0);
        }
        let removed = remove_artifacts(&self.toolchain, self.program.name())?;
        self.program.state = LifecycleState::CleanedUp;
        debug!(program = self.program.name(), removed, "removed build artifacts");
        Ok(removed)
    }
}

impl Drop for CompiledProgram {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(program = self.program.name(), error = %e, "artifact cleanup failed");
        }
    }
}

fn remove_artifacts(toolchain: &Toolchain, program: &str) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(&toolchain.work_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if toolchain.is_artifact_of(program, name) && entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toolchain(dir: &Path, build: &[&str]) -> Toolchain {
        Toolchain {
            build: build.iter().map(|s| s.to_string()).collect(),
            run: vec!["sh".into(), "{program}.run".into()],
            artifact_suffix: ".run".into(),
            work_dir: dir.to_path_buf(),
            classpath: Vec::new(),
        }
    }

    #[test]
    fn release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let tc = toolchain(dir.path(), &["touch", "{program}.run", "{program}$1.run"]);
        let mut compiled = CompiledProgram::acquire("Codec", &tc).unwrap();
        assert!(compiled.artifact_path().exists());
        assert_eq!(compiled.release().unwrap(), 2);
        assert_eq!(compiled.release().unwrap(), 0);
        assert_eq!(compiled.program().state(), LifecycleState::CleanedUp);
    }

    #[test]
    fn drop_removes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Other.run"), b"").unwrap();
        let tc = toolchain(dir.path(), &["touch", "{program}.run"]);
        {
            let _compiled = CompiledProgram::acquire("Codec", &tc).unwrap();
            assert!(dir.path().join("Codec.run").exists());
        }
        assert!(!dir.path().join("Codec.run").exists());
        assert!(dir.path().join("Other.run").exists());
    }

    #[test]
    fn failed_build_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let tc = toolchain(dir.path(), &["sh", "-c", "touch {program}.run; exit 3"]);
        let err = CompiledProgram::acquire("Codec", &tc).unwrap_err();
        assert!(matches!(err, HarnessError::BuildFailure { ref program, .. } if program == "Codec"));
        assert!(!dir.path().join("Codec.run").exists());
    }

    #[test]
    fn unstartable_build_is_a_build_failure() {
        let dir = tempfile::tempdir().unwrap();
        let tc = toolchain(dir.path(), &["definitely-not-a-real-compiler-xyz"]);
        let err = CompiledProgram::acquire("Codec", &tc).unwrap_err();
        assert!(matches!(err, HarnessError::BuildFailure { .. }));
    }
}
