//! Seed resolution and seeded random sources
//!
//! A seed comes either from an injected override string (normally `TEST_SEED`)
//! or from the wall clock at nanosecond resolution.

use crate::SeedError;
use proptest::test_runner::{RngAlgorithm, TestRng};
use std::fmt;

/// Environment key consulted by [`SeedResolver::from_env`].
pub const SEED_ENV: &str = "TEST_SEED";

// ============================================================================
// Resolver
// ============================================================================

/// Resolves the seed for one check.
///
/// The override is injected at construction; only [`SeedResolver::from_env`]
/// touches process state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedResolver {
    override_value: Option<String>,
}

impl SeedResolver {
    /// Resolver without override: every resolution is time-derived.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(value: impl Into<String>) -> Self {
        Self {
            override_value: Some(value.into()),
        }
    }

    pub fn from_override(value: Option<String>) -> Self {
        Self {
            override_value: value,
        }
    }

    /// Read the override from `TEST_SEED`. Non-UTF-8 values are kept lossily
    /// so they still fail to parse instead of being dropped.
    pub fn from_env() -> Self {
        Self {
            override_value: std::env::var_os(SEED_ENV).map(|v| v.to_string_lossy().into_owned()),
        }
    }

    pub fn override_value(&self) -> Option<&str> {
        self.override_value.as_deref()
    }

    /// Resolve without aborting on a malformed override.
    ///
    /// A parsed override is returned verbatim, zero and negative values included.
    pub fn try_resolve(&self) -> Result<i64, SeedError> {
        match self.override_value.as_deref() {
            None | Some("") => Ok(time_seed()),
            Some(value) => value.parse::<i64>().map_err(|source| SeedError::InvalidSeed {
                value: value.to_string(),
                source,
            }),
        }
    }

    /// Resolve the seed for a check.
    ///
    /// # Panics
    ///
    /// Panics with the offending string when the override is not a base-10 `i64`.
    /// Misconfiguration aborts the current test instead of falling back to a
    /// time-derived seed.
    pub fn resolve(&self) -> i64 {
        match self.try_resolve() {
            Ok(seed) => seed,
            Err(err) => panic!("{err}"),
        }
    }

    /// Build a random source from a caller-supplied seed.
    ///
    /// A non-positive `seed` is never used literally: it is replaced by a fresh
    /// resolution. Non-positive values that arrive through the override are
    /// still honored by that resolution.
    pub fn random_source(&self, seed: i64) -> RandomSource {
        let seed = if seed <= 0 { self.resolve() } else { seed };
        RandomSource::from_seed(seed)
    }
}

/// Wall-clock seed in nanoseconds since the Unix epoch.
pub fn time_seed() -> i64 {
    let now = chrono::Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros())
}

// ============================================================================
// Random source
// ============================================================================

/// Single-use seeded random stream handed to the evaluator.
pub struct RandomSource {
    seed: i64,
    rng: TestRng,
}

impl RandomSource {
    /// Deterministic source: equal seeds yield equal streams.
    pub fn from_seed(seed: i64) -> Self {
        Self {
            seed,
            rng: TestRng::from_seed(RngAlgorithm::ChaCha, &chacha_key(seed)),
        }
    }

    pub fn seed(&self) -> i64 {
        self.seed
    }

    pub fn rng(&mut self) -> &mut TestRng {
        &mut self.rng
    }

    pub fn into_rng(self) -> TestRng {
        self.rng
    }
}

impl fmt::Debug for RandomSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomSource").field("seed", &self.seed).finish()
    }
}

// Expand the 64-bit seed into a 256-bit ChaCha key (splitmix64).
fn chacha_key(seed: i64) -> [u8; 32] {
    let mut state = seed as u64;
    let mut key = [0u8; 32];
    for chunk in key.chunks_exact_mut(8) {
        state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        chunk.copy_from_slice(&(z ^ (z >> 31)).to_le_bytes());
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    proptest! {
        #[test]
        fn test_override_round_trip(seed in any::<i64>()) {
            let resolver = SeedResolver::with_override(seed.to_string());
            prop_assert_eq!(resolver.resolve(), seed);
        }

        #[test]
        fn test_same_seed_same_stream(seed in any::<i64>()) {
            let mut a = RandomSource::from_seed(seed);
            let mut b = RandomSource::from_seed(seed);
            for _ in 0..16 {
                prop_assert_eq!(a.rng().next_u64(), b.rng().next_u64());
            }
        }
    }

    #[test]
    fn test_zero_and_negative_overrides_honored() {
        assert_eq!(SeedResolver::with_override("0").resolve(), 0);
        assert_eq!(SeedResolver::with_override("-42").resolve(), -42);
        assert_eq!(SeedResolver::with_override("+17").resolve(), 17);
    }

    #[test]
    fn test_absent_or_empty_override_is_time_derived() {
        let first = SeedResolver::new().resolve();
        std::thread::sleep(Duration::from_millis(2));
        let second = SeedResolver::with_override("").resolve();
        assert!(first > 0);
        assert_ne!(first, second);
    }

    #[test]
    fn test_malformed_override_is_an_error() {
        let err = SeedResolver::with_override("not-a-number")
            .try_resolve()
            .unwrap_err();
        let SeedError::InvalidSeed { value, .. } = &err;
        assert_eq!(value, "not-a-number");
        assert!(err.to_string().contains("'not-a-number'"));
    }

    #[test]
    #[should_panic(expected = "not-a-number")]
    fn test_malformed_override_panics_on_resolve() {
        SeedResolver::with_override("not-a-number").resolve();
    }

    #[test]
    #[should_panic(expected = "12 34")]
    fn test_whitespace_is_malformed() {
        SeedResolver::with_override("12 34").resolve();
    }

    #[test]
    fn test_positive_programmatic_seed_used_literally() {
        let source = SeedResolver::with_override("99").random_source(5);
        assert_eq!(source.seed(), 5);
    }

    #[test]
    fn test_non_positive_programmatic_seed_replaced() {
        let source = SeedResolver::new().random_source(0);
        assert!(source.seed() > 0);

        let source = SeedResolver::new().random_source(-3);
        assert_ne!(source.seed(), -3);
    }

    #[test]
    fn test_non_positive_override_survives_re_resolution() {
        let source = SeedResolver::with_override("-7").random_source(0);
        assert_eq!(source.seed(), -7);
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = RandomSource::from_seed(1);
        let mut b = RandomSource::from_seed(2);
        let xs: Vec<u64> = (0..4).map(|_| a.rng().next_u64()).collect();
        let ys: Vec<u64> = (0..4).map(|_| b.rng().next_u64()).collect();
        assert_ne!(xs, ys);
    }
}
