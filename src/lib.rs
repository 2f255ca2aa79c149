//! Verification and benchmarking harness for external stream codecs.
//!
//! The program under test is built once per run, invoked with `-` to encode
//! and `+` to decode (stdin to stdout), checked against a reference corpus
//! or timed repeatedly, and its build artifacts are removed afterwards.

pub mod action;
pub mod bench;
pub mod command;
pub mod compare;
pub mod config;
pub mod corpus;
pub mod error;
pub mod io_utils;
pub mod program;
pub mod stats;
pub mod timer;
pub mod verify;

pub use action::ActionKind;
pub use bench::{BenchmarkRunner, GroupTimings, ObservationWriter, TimingObservation};
pub use command::{CommandBuilder, Invocation, OutputSink};
pub use compare::{compare, ComparisonResult, Mismatch};
pub use config::{EqualityPolicy, HarnessConfig, LargeInputCheck, Toolchain};
pub use corpus::{discover_files, discover_pairs, FilePair};
pub use error::HarnessError;
pub use program::{CompiledProgram, LifecycleState, ProgramUnderTest};
pub use stats::RunStatistics;
pub use timer::Timer;
pub use verify::{Direction, HalfTripVerifier, RoundTripVerifier, VerificationReport};
