use std::time::{Duration, Instant};

use crate::command::Invocation;
use crate::error::Result;

/// Wall-clock timing of single invocations.
///
/// The clock starts once the invocation is fully resolved, so argument
/// building and file checks are not counted; process start-up of the program
/// itself is. Any nonzero exit is returned as an error and the duration is
/// discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timer {
    timeout: Option<Duration>,
}

impl Timer {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn time(&self, invocation: &Invocation) -> Result<Duration> {
        let start = Instant::now();
        invocation.spawn(self.timeout)?.wait()?;
        Ok(start.elapsed())
    }
}
