//! Summary statistics over observed durations.

use std::fmt;
use std::io::{self, Write};

use crate::error::{HarnessError, Result};

/// Aggregate over the durations of one run, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStatistics {
    pub count: usize,
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
}

impl RunStatistics {
    /// Reduce `durations`. Fails with [`HarnessError::StatsUndefined`] for
    /// fewer than two values: the sample standard deviation divides by n - 1.
    pub fn from_durations(durations: &[f64]) -> Result<Self> {
        let count = durations.len();
        if count < 2 {
            return Err(HarnessError::StatsUndefined(count));
        }
        let mean = durations.iter().sum::<f64>() / count as f64;
        let variance =
            durations.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        let min = durations.iter().copied().fold(f64::INFINITY, f64::min);
        let max = durations.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok(Self {
            count,
            mean,
            stddev: variance.sqrt(),
            min,
            max,
        })
    }

    pub fn report<W: Write>(&self, mut out: W) -> io::Result<()> {
        write!(out, "{self}")
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "average: {}", self.mean)?;
        writeln!(f, "stddev : {}", self.stddev)?;
        writeln!(f, "obs    : {}", self.count)?;
        writeln!(f, "min    : {}", self.min)?;
        writeln!(f, "max    : {}", self.max)
    }
}
