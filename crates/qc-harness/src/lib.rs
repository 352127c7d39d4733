//! QC Harness
//!
//! Seeded quick-check runner for property tests. A [`TestContext`] owns a list of
//! default generators, merges them with the generators given to a single check,
//! resolves a reproducible seed and hands everything to the proptest evaluator.
//!
//! # Usage
//!
//! ```rust
//! use qc_harness::prelude::*;
//!
//! let mut ctx = TestContext::new("addition", CheckConfig::new().cases(64));
//! ctx.set_default_generators(vec![Generator::i64_range(-1000, 1000)]);
//! ctx.quick_check(|a: i64, b: i64| a + b == b + a);
//! ctx.assert_passed();
//! ```
//!
//! A failed check does not stop the test; the context raises it when dropped,
//! or earlier from `assert_passed`. Export `TEST_SEED=<i64>` to replay a run;
//! every check logs the seed it used and the failure message repeats it.

use serde::{Deserialize, Serialize};
use std::num::ParseIntError;
use thiserror::Error;

pub mod generators;
pub mod property;
pub mod reporter;
pub mod reports;
pub mod runner;
pub mod seed;

pub use generators::{Generator, GeneratorRegistry};
pub use property::Property;
pub use reporter::{RecordingReporter, Reporter, TracingReporter};
pub use runner::{CheckConfig, CheckResult, TestContext};
pub use seed::{RandomSource, SeedResolver, SEED_ENV};

/// Malformed seed configuration. Never recovered from inside the harness.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeedError {
    #[error("invalid seed '{value}': {source}")]
    InvalidSeed {
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Outcome of a failed check, reported to the test reporter.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckError {
    #[error("property falsified: {reason}; minimal failing input: {counterexample}")]
    Falsified {
        reason: String,
        counterexample: String,
    },
    #[error("check aborted: {reason}")]
    Aborted { reason: String },
}

impl CheckError {
    pub fn counterexample(&self) -> Option<&str> {
        match self {
            CheckError::Falsified { counterexample, .. } => Some(counterexample),
            CheckError::Aborted { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CheckError>;

pub mod prelude {
    pub use crate::generators::Generator;
    pub use crate::reporter::{RecordingReporter, Reporter, TracingReporter};
    pub use crate::runner::{CheckConfig, CheckResult, TestContext};
    pub use crate::seed::{RandomSource, SeedResolver};
    pub use crate::{CheckError, SeedError};
    pub use proptest::prelude::RngCore;
    pub use proptest::test_runner::TestRng;
}

// Re-export proptest for custom strategies and Arbitrary impls
pub use proptest;
