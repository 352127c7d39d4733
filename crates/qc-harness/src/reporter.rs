//! Test-reporting sinks
//!
//! The runner needs three primitives: record an informational line, record a
//! failure, and close out the context. Recording a failure never stops the
//! test; closing a context with failures does.

use crate::CheckError;
use tracing::{error, info};

pub trait Reporter {
    /// Informational line, e.g. the seed used by a check.
    fn log(&mut self, line: &str);

    /// Record `err` as a failure of the check called `name`.
    fn record_failure(&mut self, name: &str, err: &CheckError);

    /// Called once when a context is dropped with unacknowledged failures.
    /// `summary` lists every check with its seed. Fails the running test.
    fn finish(&mut self, summary: &str) {
        panic!("{summary}");
    }
}

/// Emits through `tracing`. Default reporter for [`crate::TestContext`].
///
/// Seed lines are `info` events, so they only show up with a subscriber
/// installed. The failure raised by [`Reporter::finish`] repeats every seed.
#[derive(Debug, Default, Clone)]
pub struct TracingReporter {
    failures: usize,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> usize {
        self.failures
    }
}

impl Reporter for TracingReporter {
    fn log(&mut self, line: &str) {
        info!("{}", line);
    }

    fn record_failure(&mut self, name: &str, err: &CheckError) {
        self.failures += 1;
        match err.counterexample() {
            Some(input) => error!(check = name, counterexample = input, "{}", err),
            None => error!(check = name, "{}", err),
        }
    }
}

/// Keeps everything in memory. Failures are left for the owner to inspect, so
/// dropping a context with failures does not panic.
#[derive(Debug, Default, Clone)]
pub struct RecordingReporter {
    pub lines: Vec<String>,
    pub failures: Vec<(String, CheckError)>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds parsed back out of the recorded seed lines, in order.
    pub fn seeds(&self) -> Vec<i64> {
        self.lines
            .iter()
            .filter_map(|line| line.strip_prefix(crate::runner::SEED_LOG_PREFIX))
            .filter_map(|rest| rest.trim().parse().ok())
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn log(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn record_failure(&mut self, name: &str, err: &CheckError) {
        self.failures.push((name.to_string(), err.clone()));
    }

    fn finish(&mut self, _summary: &str) {}
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn log(&mut self, line: &str) {
        (**self).log(line);
    }

    fn record_failure(&mut self, name: &str, err: &CheckError) {
        (**self).record_failure(name, err);
    }

    fn finish(&mut self, summary: &str) {
        (**self).finish(summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_reporter_seeds() {
        let mut reporter = RecordingReporter::new();
        reporter.log("quick check rng seed: 42");
        reporter.log("unrelated");
        reporter.log("quick check rng seed: -7");
        assert_eq!(reporter.seeds(), vec![42, -7]);
    }

    #[test]
    fn test_tracing_reporter_counts_failures() {
        let mut reporter = TracingReporter::new();
        reporter.log("hello");
        reporter.record_failure(
            "ctx/0",
            &CheckError::Aborted {
                reason: "too many rejects".into(),
            },
        );
        assert_eq!(reporter.failures(), 1);
    }

    #[test]
    #[should_panic(expected = "seed 9")]
    fn test_tracing_reporter_finish_fails_the_test() {
        TracingReporter::new().finish("ctx: 1 checks, 0 passed, 1 failed\n  FAILED ctx/0 (seed 9)");
    }

    #[test]
    fn test_recording_reporter_finish_is_silent() {
        RecordingReporter::new().finish("ctx: 1 checks, 0 passed, 1 failed");
    }
}
