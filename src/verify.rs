//! Correctness checks against the reference corpus.
//!
//! A half-trip runs one direction of the program and compares with the
//! independently produced reference file; a round-trip pipes the program's
//! own encoding into its decoder and compares with the original input. Both
//! go through [`crate::compare::compare`]. Mismatches are collected per case;
//! subprocess and I/O errors abort the check.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::action::ActionKind;
use crate::command::{run_capture, CommandBuilder, OutputSink};
use crate::compare::{compare, ComparisonResult};
use crate::config::EqualityPolicy;
use crate::corpus::{discover_files, discover_pairs};
use crate::error::Result;
use crate::program::CompiledProgram;

/// Which half of the codec a half-trip exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encode,
    Decode,
}

impl Direction {
    pub fn action(self) -> ActionKind {
        match self {
            Direction::Encode => ActionKind::Encode,
            Direction::Decode => ActionKind::Decode,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Direction::Encode => "encoding",
            Direction::Decode => "decoding",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaseOutcome {
    pub input: PathBuf,
    pub action: ActionKind,
    pub result: ComparisonResult,
}

impl CaseOutcome {
    pub fn passed(&self) -> bool {
        self.result.passed()
    }
}

impl fmt::Display for CaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            ComparisonResult::Equal => write!(f, "ok   {} {}", self.action, self.input.display()),
            ComparisonResult::Relaxed => write!(
                f,
                "ok   {} {} (large output, not compared)",
                self.action,
                self.input.display()
            ),
            ComparisonResult::NotEqual(m) => {
                write!(f, "FAIL {} {}: {m}", self.action, self.input.display())
            }
        }
    }
}

/// Every case of one check, in corpus order.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub check: String,
    pub cases: Vec<CaseOutcome>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.cases.iter().all(CaseOutcome::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseOutcome> {
        self.cases.iter().filter(|c| !c.passed())
    }
}

fn check_case(
    program: &CompiledProgram,
    action: ActionKind,
    input: &Path,
    expected: &[u8],
    policy: &EqualityPolicy,
    timeout: Option<Duration>,
) -> Result<CaseOutcome> {
    let invocation = CommandBuilder::new(program).build(action, input, OutputSink::Capture)?;
    let actual = run_capture(&invocation, timeout)?;
    let result = compare(&actual, expected, policy);
    debug!(input = %input.display(), %action, passed = result.passed(), "case checked");
    Ok(CaseOutcome {
        input: input.to_path_buf(),
        action,
        result,
    })
}

/// One-direction comparison against reference files.
pub struct HalfTripVerifier<'a> {
    program: &'a CompiledProgram,
    policy: EqualityPolicy,
    timeout: Option<Duration>,
}

impl<'a> HalfTripVerifier<'a> {
    pub fn new(program: &'a CompiledProgram, policy: EqualityPolicy, timeout: Option<Duration>) -> Self {
        Self {
            program,
            policy,
            timeout,
        }
    }

    pub fn verify(&self, corpus: &Path, ext: &str, direction: Direction) -> Result<VerificationReport> {
        let mut cases = Vec::new();
        for pair in discover_pairs(corpus, ext)? {
            let (input, expected) = match direction {
                Direction::Encode => (&pair.raw, &pair.encoded),
                Direction::Decode => (&pair.encoded, &pair.raw),
            };
            let expected = fs::read(expected)?;
            cases.push(check_case(
                self.program,
                direction.action(),
                input,
                &expected,
                &self.policy,
                self.timeout,
            )?);
        }
        Ok(VerificationReport {
            check: direction.label().to_string(),
            cases,
        })
    }
}

/// Encode-then-decode comparison against the original input.
pub struct RoundTripVerifier<'a> {
    program: &'a CompiledProgram,
    policy: EqualityPolicy,
    timeout: Option<Duration>,
}

impl<'a> RoundTripVerifier<'a> {
    pub fn new(program: &'a CompiledProgram, policy: EqualityPolicy, timeout: Option<Duration>) -> Self {
        Self {
            program,
            policy,
            timeout,
        }
    }

    pub fn verify(&self, corpus: &Path) -> Result<VerificationReport> {
        let mut cases = Vec::new();
        for file in discover_files(corpus)? {
            let original = fs::read(&file)?;
            cases.push(check_case(
                self.program,
                ActionKind::EncodeThenDecode,
                &file,
                &original,
                &self.policy,
                self.timeout,
            )?);
        }
        Ok(VerificationReport {
            check: "roundtrip".to_string(),
            cases,
        })
    }
}
