//! Quick-check runner
//!
//! A [`TestContext`] lives for one test. It holds the default generators,
//! merges them with per-call generators, seeds a fresh random source for every
//! check and translates the evaluator outcome into a [`CheckResult`].
//!
//! A failing check does not stop the test. The failure is raised when the
//! context goes out of scope, through [`Reporter::finish`].

use crate::generators::{Generator, GeneratorRegistry};
use crate::property::Property;
use crate::reporter::{Reporter, TracingReporter};
use crate::seed::{SeedResolver, SEED_ENV};
use crate::CheckError;
use proptest::test_runner::{RngAlgorithm, TestRunner};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Prefix of the line logged before every check.
pub const SEED_LOG_PREFIX: &str = "quick check rng seed: ";

// ============================================================================
// Configuration
// ============================================================================

/// Evaluator settings plus the injected seed override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Passing cases required per check
    pub cases: u32,
    /// Upper bound on shrink steps after a failure
    pub max_shrink_iters: u32,
    /// Raw seed override; `None` or empty means time-derived seeds
    pub seed_override: Option<String>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            cases: 100,
            max_shrink_iters: 1000,
            seed_override: None,
        }
    }
}

impl CheckConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with the override taken from `TEST_SEED`.
    pub fn from_env() -> Self {
        Self::default().with_seed_source(SeedResolver::from_env())
    }

    pub fn cases(mut self, n: u32) -> Self {
        self.cases = n;
        self
    }

    pub fn max_shrink_iters(mut self, n: u32) -> Self {
        self.max_shrink_iters = n;
        self
    }

    pub fn seed_override(mut self, value: impl Into<String>) -> Self {
        self.seed_override = Some(value.into());
        self
    }

    fn with_seed_source(mut self, resolver: SeedResolver) -> Self {
        self.seed_override = resolver.override_value().map(str::to_string);
        self
    }

    pub fn seed_resolver(&self) -> SeedResolver {
        SeedResolver::from_override(self.seed_override.clone())
    }

    /// Generate proptest config from this
    pub fn to_proptest_config(&self) -> proptest::test_runner::Config {
        let mut config = proptest::test_runner::Config::default();
        config.cases = self.cases;
        config.max_shrink_iters = self.max_shrink_iters;
        config.rng_algorithm = RngAlgorithm::ChaCha;
        config.failure_persistence = None;
        config
    }
}

// ============================================================================
// Results
// ============================================================================

/// Outcome of one quick check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// `<context>/<index>`
    pub name: String,
    /// Seed the random source was built from; export as `TEST_SEED` to replay
    pub seed: i64,
    /// Configured case count
    pub cases: u32,
    /// Labels of the effective generator list, in order
    pub generators: Vec<String>,
    pub passed: bool,
    pub failure: Option<CheckError>,
    pub duration_ms: u64,
    /// Unix ms at completion
    pub timestamp_ms: i64,
}

impl CheckResult {
    pub fn summary_line(&self) -> String {
        match &self.failure {
            None => format!("ok     {} (seed {}, {} cases)", self.name, self.seed, self.cases),
            Some(err) => format!("FAILED {} (seed {}): {}", self.name, self.seed, err),
        }
    }
}

// ============================================================================
// Test context
// ============================================================================

/// Per-test state. Not synchronized: callers sharing one context across
/// threads must serialize access themselves.
pub struct TestContext<R: Reporter = TracingReporter> {
    name: String,
    config: CheckConfig,
    seeds: SeedResolver,
    default_generators: Vec<Generator>,
    reporter: R,
    results: Vec<CheckResult>,
    checks: usize,
}

impl TestContext<TracingReporter> {
    pub fn new(name: &str, config: CheckConfig) -> Self {
        Self::with_reporter(name, config, TracingReporter::new())
    }
}

impl<R: Reporter> TestContext<R> {
    pub fn with_reporter(name: &str, config: CheckConfig, reporter: R) -> Self {
        let seeds = config.seed_resolver();
        Self {
            name: name.to_string(),
            config,
            seeds,
            default_generators: Vec::new(),
            reporter,
            results: Vec::new(),
            checks: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn reporter_mut(&mut self) -> &mut R {
        &mut self.reporter
    }

    /// Replace the default generators used by every later check.
    pub fn set_default_generators(&mut self, generators: Vec<Generator>) {
        self.default_generators = generators;
    }

    pub fn default_generators(&self) -> &[Generator] {
        &self.default_generators
    }

    /// `defaults ++ for_call`, order preserved.
    pub fn effective_generators(&self, for_call: Vec<Generator>) -> Vec<Generator> {
        if self.default_generators.is_empty() {
            return for_call;
        }
        let mut merged = Vec::with_capacity(self.default_generators.len() + for_call.len());
        merged.extend(self.default_generators.iter().cloned());
        merged.extend(for_call);
        merged
    }

    /// Check `property` using only the default generators.
    pub fn quick_check<Args, P>(&mut self, property: P) -> bool
    where
        P: Property<Args>,
    {
        self.quick_check_with(Vec::new(), property)
    }

    /// Check `property` with `generators` appended after the defaults.
    ///
    /// Returns whether the property held. A falsified property or evaluator
    /// error is reported and recorded, never raised.
    ///
    /// # Panics
    ///
    /// Panics before any evaluation if the seed override is malformed.
    pub fn quick_check_with<Args, P>(&mut self, generators: Vec<Generator>, property: P) -> bool
    where
        P: Property<Args>,
    {
        let name = format!("{}/{}", self.name, self.checks);
        self.checks += 1;
        let generators = self.effective_generators(generators);

        let seed = self.seeds.resolve();
        let source = self.seeds.random_source(seed);
        let seed = source.seed();
        self.reporter.log(&format!("{SEED_LOG_PREFIX}{seed}"));

        let registry = GeneratorRegistry::from_generators(&generators);
        debug!(
            check = %name,
            generators = generators.len(),
            registered_types = registry.len(),
            "running quick check"
        );

        let start = Instant::now();
        let mut runner = TestRunner::new_with_rng(self.config.to_proptest_config(), source.into_rng());
        let outcome = property.evaluate(&registry, &mut runner);
        let duration_ms = start.elapsed().as_millis() as u64;

        if let Err(ref err) = outcome {
            self.reporter.record_failure(&name, err);
        }

        let passed = outcome.is_ok();
        self.results.push(CheckResult {
            name,
            seed,
            cases: self.config.cases,
            generators: generators.iter().map(|g| g.label().to_string()).collect(),
            passed,
            failure: outcome.err(),
            duration_ms,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        });
        passed
    }

    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }

    pub fn failed(&self) -> bool {
        self.results.iter().any(|r| !r.passed)
    }

    pub fn summary(&self) -> String {
        let failed = self.results.iter().filter(|r| !r.passed).count();
        let mut out = format!(
            "{}: {} checks, {} passed, {} failed",
            self.name,
            self.results.len(),
            self.results.len() - failed,
            failed
        );
        for result in &self.results {
            out.push_str("\n  ");
            out.push_str(&result.summary_line());
        }
        out
    }

    /// Panic if any check in this context failed.
    pub fn assert_passed(&self) {
        if self.failed() {
            panic!("{}", self.failure_message());
        }
    }

    /// Hand the results recorded so far to the caller, who takes over judging
    /// them. Only checks run after this are raised when the context drops.
    pub fn take_results(&mut self) -> Vec<CheckResult> {
        std::mem::take(&mut self.results)
    }

    fn failure_message(&self) -> String {
        format!(
            "{}\nreplay with {}=<seed of the failing check>",
            self.summary(),
            SEED_ENV
        )
    }
}

impl<R: Reporter> Drop for TestContext<R> {
    fn drop(&mut self) {
        if !self.failed() || std::thread::panicking() {
            return;
        }
        let message = self.failure_message();
        self.reporter.finish(&message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::RecordingReporter;
    use proptest::prelude::*;
    use proptest::test_runner::TestRng;
    use std::cell::Cell;

    fn labelled(prefix: &str, n: usize) -> Vec<Generator> {
        (0..n)
            .map(|i| Generator::named(format!("{prefix}{i}"), move |_: &mut TestRng| i))
            .collect()
    }

    fn labels(generators: &[Generator]) -> Vec<String> {
        generators.iter().map(|g| g.label().to_string()).collect()
    }

    fn recording(config: CheckConfig) -> TestContext<RecordingReporter> {
        TestContext::with_reporter("ctx", config, RecordingReporter::new())
    }

    proptest! {
        #[test]
        fn test_merge_preserves_order(defaults in 0usize..=5, extra in 0usize..=3) {
            let mut ctx = recording(CheckConfig::new());
            ctx.set_default_generators(labelled("d", defaults));

            let merged = ctx.effective_generators(labelled("x", extra));

            let mut expected = labels(&labelled("d", defaults));
            expected.extend(labels(&labelled("x", extra)));
            prop_assert_eq!(labels(&merged), expected);
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = CheckConfig::default();
        assert_eq!(config.cases, 100);
        assert_eq!(config.max_shrink_iters, 1000);
        assert!(config.seed_override.is_none());
    }

    #[test]
    fn test_proptest_config_conversion() {
        let config = CheckConfig::new().cases(7).max_shrink_iters(3).to_proptest_config();
        assert_eq!(config.cases, 7);
        assert_eq!(config.max_shrink_iters, 3);
        assert!(config.failure_persistence.is_none());
    }

    #[test]
    fn test_set_defaults_replaces() {
        let mut ctx = recording(CheckConfig::new());
        ctx.set_default_generators(labelled("a", 3));
        ctx.set_default_generators(labelled("b", 1));
        assert_eq!(labels(ctx.default_generators()), vec!["b0"]);
    }

    #[test]
    fn test_seed_logged_before_check() {
        let mut ctx = recording(CheckConfig::new().seed_override("1234"));
        assert!(ctx.quick_check(|_: u8| true));

        let reporter = ctx.reporter();
        assert_eq!(reporter.lines, vec!["quick check rng seed: 1234"]);
        assert_eq!(ctx.results()[0].seed, 1234);
    }

    #[test]
    fn test_false_property_reports_once() {
        let mut ctx = recording(CheckConfig::new().cases(50));
        assert!(!ctx.quick_check(|_: i32| false));
        assert!(!ctx.quick_check(|| false));

        assert_eq!(ctx.reporter().failures.len(), 2);
        assert_eq!(ctx.reporter().failures[0].0, "ctx/0");
        assert_eq!(ctx.reporter().failures[1].0, "ctx/1");
        assert!(ctx.failed());
    }

    #[test]
    fn test_call_generator_overrides_default_for_same_type() {
        let mut ctx = recording(CheckConfig::new().cases(20));
        ctx.set_default_generators(vec![Generator::constant(1u32)]);

        assert!(ctx.quick_check_with(vec![Generator::constant(2u32)], |x: u32| x == 2));
        assert_eq!(ctx.results()[0].generators, vec!["constant", "constant"]);
    }

    #[test]
    fn test_malformed_seed_aborts_before_evaluation() {
        let evaluated = Cell::new(false);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut ctx = recording(CheckConfig::new().seed_override("0x10"));
            ctx.quick_check(|_: u8| {
                evaluated.set(true);
                true
            });
        }));
        assert!(outcome.is_err());
        assert!(!evaluated.get());
    }

    #[test]
    fn test_summary_and_assert_passed() {
        let mut ctx = recording(CheckConfig::new().cases(10));
        ctx.quick_check(|b: bool| b || !b);
        assert!(!ctx.failed());
        ctx.assert_passed();
        assert!(ctx.summary().starts_with("ctx: 1 checks, 1 passed, 0 failed"));
    }

    #[test]
    #[should_panic(expected = "1 failed")]
    fn test_assert_passed_panics_on_failure() {
        let mut ctx = recording(CheckConfig::new().cases(10));
        ctx.quick_check(|_: u8| false);
        ctx.assert_passed();
    }

    #[test]
    #[should_panic(expected = "1 failed")]
    fn test_dropping_failed_context_fails_the_test() {
        let mut ctx = TestContext::new("silent", CheckConfig::new().cases(10));
        let held = ctx.quick_check(|_: u8| false);
        assert!(!held);
    }

    #[test]
    #[should_panic(expected = "(seed 4242)")]
    fn test_drop_failure_names_the_seed() {
        let mut ctx = TestContext::new("seeded", CheckConfig::new().cases(10).seed_override("4242"));
        ctx.quick_check(|x: u16| x < 10);
    }

    #[test]
    fn test_passing_context_drops_quietly() {
        let mut ctx = TestContext::new("quiet", CheckConfig::new().cases(10));
        assert!(ctx.quick_check(|x: u8| u16::from(x) <= 255));
    }

    #[test]
    fn test_take_results_hands_over_failures() {
        let mut ctx = TestContext::new("handed", CheckConfig::new().cases(10));
        ctx.quick_check(|_: bool| false);

        let results = ctx.take_results();
        assert_eq!(results.len(), 1);
        assert!(!results[0].passed);
        assert!(!ctx.failed());

        ctx.quick_check(|_: bool| true);
        assert_eq!(ctx.results()[0].name, "handed/1");
    }
}
