//! Size-dependent output comparison.
//!
//! Up to `diff_limit` bytes of expected output, actual and expected must be
//! byte-for-byte identical and a mismatch reports where they diverge. Past
//! the limit, [`LargeInputCheck::Whole`] still requires equality but only
//! reports digests, while [`LargeInputCheck::Lenient`] accepts any non-empty
//! output. The lenient mode does not verify correctness.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::config::{EqualityPolicy, LargeInputCheck};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComparisonResult {
    Equal,
    NotEqual(Mismatch),
    /// Large input accepted by the lenient check without a byte comparison.
    Relaxed,
}

impl ComparisonResult {
    pub fn passed(&self) -> bool {
        !matches!(self, ComparisonResult::NotEqual(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// Small output: first differing offset and the bytes around it.
    Detailed {
        expected_len: usize,
        actual_len: usize,
        offset: usize,
        expected: Vec<u8>,
        actual: Vec<u8>,
    },
    /// Large output: lengths and SHA-256 digests only.
    Digest {
        expected_len: usize,
        actual_len: usize,
        expected: String,
        actual: String,
    },
    /// Lenient check on a large input, and the program printed nothing.
    NoOutput { expected_len: usize },
}

const CONTEXT: usize = 8;

pub fn compare(actual: &[u8], expected: &[u8], policy: &EqualityPolicy) -> ComparisonResult {
    if expected.len() <= policy.diff_limit {
        return match first_difference(actual, expected) {
            None => ComparisonResult::Equal,
            Some(offset) => ComparisonResult::NotEqual(Mismatch::Detailed {
                expected_len: expected.len(),
                actual_len: actual.len(),
                offset,
                expected: window(expected, offset),
                actual: window(actual, offset),
            }),
        };
    }
    match policy.large {
        LargeInputCheck::Whole if actual == expected => ComparisonResult::Equal,
        LargeInputCheck::Whole => ComparisonResult::NotEqual(Mismatch::Digest {
            expected_len: expected.len(),
            actual_len: actual.len(),
            expected: hex::encode(Sha256::digest(expected)),
            actual: hex::encode(Sha256::digest(actual)),
        }),
        LargeInputCheck::Lenient if actual.is_empty() => {
            ComparisonResult::NotEqual(Mismatch::NoOutput {
                expected_len: expected.len(),
            })
        }
        LargeInputCheck::Lenient => ComparisonResult::Relaxed,
    }
}

fn first_difference(a: &[u8], b: &[u8]) -> Option<usize> {
    match a.iter().zip(b).position(|(x, y)| x != y) {
        Some(i) => Some(i),
        None if a.len() != b.len() => Some(a.len().min(b.len())),
        None => None,
    }
}

fn window(bytes: &[u8], offset: usize) -> Vec<u8> {
    let start = offset.min(bytes.len());
    let end = (offset + CONTEXT).min(bytes.len());
    bytes[start..end].to_vec()
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Detailed {
                expected_len,
                actual_len,
                offset,
                expected,
                actual,
            } => write!(
                f,
                "differs at byte {offset} (expected {expected_len} bytes, got {actual_len}): expected {} got {}",
                hex::encode(expected),
                hex::encode(actual)
            ),
            Mismatch::Digest {
                expected_len,
                actual_len,
                expected,
                actual,
            } => write!(
                f,
                "expected {expected_len} bytes sha256 {expected}, got {actual_len} bytes sha256 {actual}"
            ),
            Mismatch::NoOutput { expected_len } => {
                write!(f, "no output (expected {expected_len} bytes)")
            }
        }
    }
}
