//! Property functions and their evaluation
//!
//! Any `Fn(A, B, ..) -> bool` with up to six arguments is a [`Property`]. Each
//! argument is drawn from the registry: a registered generator when one exists
//! for that type, otherwise a built-in default. An argument type with neither
//! aborts the check.

use crate::generators::GeneratorRegistry;
use crate::CheckError;
use proptest::test_runner::{TestCaseError, TestError, TestRunner};
use std::fmt::Debug;

const FALSIFIED: &str = "property returned false";

/// A predicate over generated arguments. `Args` is the argument tuple.
pub trait Property<Args> {
    /// Run the property under `runner` until it is falsified or the
    /// configured number of cases pass.
    fn evaluate(&self, registry: &GeneratorRegistry, runner: &mut TestRunner) -> crate::Result<()>;
}

impl<F> Property<()> for F
where
    F: Fn() -> bool,
{
    fn evaluate(&self, _registry: &GeneratorRegistry, runner: &mut TestRunner) -> crate::Result<()> {
        runner
            .run(&proptest::strategy::Just(()), |()| verdict(self()))
            .map_err(CheckError::from)
    }
}

macro_rules! impl_property {
    ($($arg:ident $val:ident),+) => {
        impl<F, $($arg),+> Property<($($arg,)+)> for F
        where
            F: Fn($($arg),+) -> bool,
            $($arg: Clone + Debug + 'static,)+
        {
            fn evaluate(&self, registry: &GeneratorRegistry, runner: &mut TestRunner) -> crate::Result<()> {
                let strategy = ($(registry.strategy_for::<$arg>(),)+);
                runner
                    .run(&strategy, |($($val,)+)| verdict(self($($val),+)))
                    .map_err(CheckError::from)
            }
        }
    };
}

impl_property!(A a);
impl_property!(A a, B b);
impl_property!(A a, B b, C c);
impl_property!(A a, B b, C c, D d);
impl_property!(A a, B b, C c, D d, E e);
impl_property!(A a, B b, C c, D d, E e, G g);

fn verdict(holds: bool) -> Result<(), TestCaseError> {
    if holds {
        Ok(())
    } else {
        Err(TestCaseError::fail(FALSIFIED))
    }
}

impl<T: Debug> From<TestError<T>> for CheckError {
    fn from(err: TestError<T>) -> Self {
        match err {
            TestError::Fail(reason, value) => CheckError::Falsified {
                reason: reason.to_string(),
                counterexample: format!("{:?}", value),
            },
            TestError::Abort(reason) => CheckError::Aborted {
                reason: reason.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::Generator;
    use proptest::prelude::{RngCore, Strategy};
    use proptest::test_runner::{Config, TestRng};
    use std::cell::Cell;

    #[derive(Debug, Clone)]
    struct Span {
        start: u32,
        end: u32,
    }

    fn runner(cases: u32) -> TestRunner {
        TestRunner::new(Config {
            cases,
            failure_persistence: None,
            ..Config::default()
        })
    }

    #[test]
    fn test_true_property_passes_every_case() {
        let calls = Cell::new(0u32);
        let prop = |_: u8, _: bool| {
            calls.set(calls.get() + 1);
            true
        };
        assert!(prop.evaluate(&GeneratorRegistry::new(), &mut runner(100)).is_ok());
        assert!(calls.get() >= 100);
    }

    #[test]
    fn test_nullary_property() {
        assert!((|| true).evaluate(&GeneratorRegistry::new(), &mut runner(10)).is_ok());
        let err = (|| false)
            .evaluate(&GeneratorRegistry::new(), &mut runner(10))
            .unwrap_err();
        assert!(matches!(err, CheckError::Falsified { .. }));
    }

    #[test]
    fn test_counterexample_is_shrunk() {
        let err = (|x: u32| x < 1000)
            .evaluate(&GeneratorRegistry::new(), &mut runner(256))
            .unwrap_err();
        match err {
            CheckError::Falsified { reason, counterexample } => {
                assert!(reason.contains(FALSIFIED));
                assert_eq!(counterexample, "(1000,)");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_registered_generator_feeds_arguments() {
        let registry = GeneratorRegistry::from_generators(&[Generator::constant(String::from("fixed"))]);
        let prop = |s: String, _n: i32| s == "fixed";
        assert!(prop.evaluate(&registry, &mut runner(50)).is_ok());
    }

    #[test]
    fn test_panicking_generator_aborts() {
        let registry = GeneratorRegistry::from_generators(&[Generator::named(
            "exploding",
            |_: &mut TestRng| -> u64 { panic!("generator exploded") },
        )]);
        let err = (|_: u64| true).evaluate(&registry, &mut runner(5)).unwrap_err();
        match err {
            CheckError::Aborted { reason } => {
                assert!(reason.contains("exploding"));
                assert!(reason.contains("generator exploded"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_panicking_property_is_falsified() {
        let prop = |x: u8| -> bool {
            if x > 3 {
                panic!("boom at {x}");
            }
            true
        };
        let err = prop
            .evaluate(&GeneratorRegistry::new(), &mut runner(256))
            .unwrap_err();
        assert!(matches!(err, CheckError::Falsified { .. }));
    }

    #[test]
    fn test_six_argument_property() {
        let prop = |a: u8, b: u16, c: u32, d: i8, e: i16, g: bool| {
            let _ = (a, b, c, d, e, g);
            true
        };
        assert!(prop.evaluate(&GeneratorRegistry::new(), &mut runner(20)).is_ok());
    }

    #[test]
    fn test_user_type_from_registered_generator() {
        let registry = GeneratorRegistry::from_generators(&[Generator::new(|rng: &mut TestRng| {
            let start = rng.next_u32() % 1000;
            Span { start, end: start + 1 + rng.next_u32() % 10 }
        })]);
        let prop = |s: Span, _flag: bool| s.start < s.end;
        assert!(prop.evaluate(&registry, &mut runner(50)).is_ok());
    }

    #[test]
    fn test_user_type_without_generator_aborts() {
        let err = (|s: Span| s.start <= s.end)
            .evaluate(&GeneratorRegistry::new(), &mut runner(5))
            .unwrap_err();
        match err {
            CheckError::Aborted { reason } => assert!(reason.contains("Span")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_strategy_generator_shrinks() {
        let registry = GeneratorRegistry::from_generators(&[Generator::from_strategy("wide", || {
            (0u64..1_000_000).boxed()
        })]);
        let err = (|x: u64| x < 500).evaluate(&registry, &mut runner(256)).unwrap_err();
        assert_eq!(err.counterexample(), Some("(500,)"));
    }
}
