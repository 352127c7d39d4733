//! Typed generator functions and the per-type registry
//!
//! A [`Generator`] wraps `Fn(&mut TestRng) -> T` (or a proptest strategy) and
//! remembers which `T` it produces. The registry picks one generator per
//! argument type. Types without a generator fall back to a built-in default
//! for primitives, strings and common collections; anything else aborts the
//! check with a reason naming the type.

use proptest::arbitrary::{any, Arbitrary};
use proptest::prelude::RngCore;
use proptest::strategy::{BoxedStrategy, Just, NewTree, Strategy, ValueTree};
use proptest::test_runner::{Config, Reason, TestRng, TestRunner};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

type GenFn<T> = Arc<dyn Fn(&mut TestRng) -> T + Send + Sync>;
type StrategyFn<T> = Arc<dyn Fn() -> BoxedStrategy<T> + Send + Sync>;

/// What a [`Generator`] holds for its `T`.
enum Producer<T> {
    Function(GenFn<T>),
    Strategy(StrategyFn<T>),
}

impl<T> Clone for Producer<T> {
    fn clone(&self) -> Self {
        match self {
            Producer::Function(f) => Producer::Function(Arc::clone(f)),
            Producer::Strategy(f) => Producer::Strategy(Arc::clone(f)),
        }
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Type-tagged producer of random values.
#[derive(Clone)]
pub struct Generator {
    label: String,
    type_id: TypeId,
    type_name: &'static str,
    produce: Arc<dyn Any + Send + Sync>,
}

impl Generator {
    /// Generator labelled with the produced type's name.
    pub fn new<T, F>(produce: F) -> Self
    where
        T: 'static,
        F: Fn(&mut TestRng) -> T + Send + Sync + 'static,
    {
        Self::named(std::any::type_name::<T>(), produce)
    }

    pub fn named<T, F>(label: impl Into<String>, produce: F) -> Self
    where
        T: 'static,
        F: Fn(&mut TestRng) -> T + Send + Sync + 'static,
    {
        Self::from_producer(label.into(), Producer::Function(Arc::new(produce)))
    }

    /// Generator backed by a proptest strategy. Unlike plain functions, values
    /// drawn this way shrink when a check fails.
    pub fn from_strategy<T, F>(label: impl Into<String>, strategy: F) -> Self
    where
        T: 'static,
        F: Fn() -> BoxedStrategy<T> + Send + Sync + 'static,
    {
        Self::from_producer(label.into(), Producer::Strategy(Arc::new(strategy)))
    }

    /// `any::<T>()` as a generator, for types with an `Arbitrary` impl that
    /// has no built-in default.
    pub fn arbitrary<T>() -> Self
    where
        T: Arbitrary + 'static,
        T::Strategy: 'static,
    {
        Self::from_strategy(std::any::type_name::<T>(), || any::<T>().boxed())
    }

    fn from_producer<T: 'static>(label: String, producer: Producer<T>) -> Self {
        Self {
            label,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            produce: Arc::new(producer),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn produces<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Draw one value, or `None` if this generator does not produce `T`.
    pub fn generate<T: fmt::Debug + 'static>(&self, rng: &mut TestRng) -> Option<T> {
        match self.producer::<T>()? {
            Producer::Function(f) => Some(f(rng)),
            Producer::Strategy(f) => {
                let mut runner = TestRunner::new_with_rng(Config::default(), rng.gen_rng());
                f().new_tree(&mut runner).ok().map(|tree| tree.current())
            }
        }
    }

    fn producer<T: 'static>(&self) -> Option<Producer<T>> {
        self.produce.downcast_ref::<Producer<T>>().cloned()
    }

    fn strategy<T: Clone + fmt::Debug + 'static>(&self) -> Option<BoxedStrategy<T>> {
        Some(match self.producer::<T>()? {
            Producer::Function(produce) => GeneratorStrategy {
                label: self.label.clone(),
                produce,
            }
            .boxed(),
            Producer::Strategy(f) => f(),
        })
    }

    // ------------------------------------------------------------------------
    // Built-in constructors
    // ------------------------------------------------------------------------

    /// Always the same value.
    pub fn constant<T>(value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        Self::named("constant", move |_: &mut TestRng| value.clone())
    }

    /// Uniform `i64` in `[min, max]`.
    pub fn i64_range(min: i64, max: i64) -> Self {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let span = hi.wrapping_sub(lo) as u64;
        Self::named(format!("i64[{lo}, {hi}]"), move |rng: &mut TestRng| {
            let offset = if span == u64::MAX {
                rng.next_u64()
            } else {
                rng.next_u64() % (span + 1)
            };
            lo.wrapping_add(offset as i64)
        })
    }

    /// Uniform `u64` in `[0, bound)`. A zero bound always yields zero.
    pub fn u64_below(bound: u64) -> Self {
        Self::named(format!("u64[0, {bound})"), move |rng: &mut TestRng| {
            if bound == 0 {
                0
            } else {
                rng.next_u64() % bound
            }
        })
    }

    /// `true` with probability `numerator / denominator`.
    pub fn bool_weighted(numerator: u32, denominator: u32) -> Self {
        let denominator = denominator.max(1);
        let numerator = numerator.min(denominator);
        Self::named(
            format!("bool({numerator}/{denominator})"),
            move |rng: &mut TestRng| rng.next_u32() % denominator < numerator,
        )
    }

    /// Printable ASCII string of length `0..=max_len`.
    pub fn ascii_string(max_len: usize) -> Self {
        Self::named(format!("ascii[..={max_len}]"), move |rng: &mut TestRng| {
            let len = draw_len(rng, max_len);
            (0..len)
                .map(|_| (b' ' + (rng.next_u32() % 95) as u8) as char)
                .collect::<String>()
        })
    }

    /// Random bytes of length `0..=max_len`.
    pub fn bytes(max_len: usize) -> Self {
        Self::named(format!("bytes[..={max_len}]"), move |rng: &mut TestRng| {
            let mut buf = vec![0u8; draw_len(rng, max_len)];
            rng.fill_bytes(&mut buf);
            buf
        })
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("label", &self.label)
            .field("type", &self.type_name)
            .finish()
    }
}

fn draw_len(rng: &mut TestRng, max_len: usize) -> usize {
    match (max_len as u64).checked_add(1) {
        Some(bound) => (rng.next_u64() % bound) as usize,
        None => rng.next_u64() as usize,
    }
}

// ============================================================================
// Built-in defaults
// ============================================================================

type DefaultFn<T> = fn() -> BoxedStrategy<T>;

fn default_strategy<T>() -> BoxedStrategy<T>
where
    T: Arbitrary + 'static,
    T::Strategy: 'static,
{
    any::<T>().boxed()
}

fn insert_default<T>(table: &mut HashMap<TypeId, Box<dyn Any + Send + Sync>>)
where
    T: Arbitrary + 'static,
    T::Strategy: 'static,
{
    let f: DefaultFn<T> = default_strategy::<T>;
    table.insert(TypeId::of::<T>(), Box::new(f));
}

macro_rules! default_table {
    ($($ty:ty),+ $(,)?) => {{
        let mut table = HashMap::new();
        $(insert_default::<$ty>(&mut table);)+
        table
    }};
}

fn defaults() -> &'static HashMap<TypeId, Box<dyn Any + Send + Sync>> {
    static DEFAULTS: OnceLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>> = OnceLock::new();
    DEFAULTS.get_or_init(|| {
        default_table!(
            (), bool, char,
            u8, u16, u32, u64, u128, usize,
            i8, i16, i32, i64, i128, isize,
            f32, f64,
            String,
            Vec<u8>, Vec<u16>, Vec<u32>, Vec<u64>,
            Vec<i8>, Vec<i16>, Vec<i32>, Vec<i64>,
            Vec<bool>, Vec<char>, Vec<String>,
            Option<u8>, Option<u32>, Option<u64>,
            Option<i32>, Option<i64>, Option<bool>, Option<String>,
        )
    })
}

/// Built-in default strategy for `T`, if there is one.
pub fn default_for<T: 'static>() -> Option<BoxedStrategy<T>> {
    defaults()
        .get(&TypeId::of::<T>())
        .and_then(|f| f.downcast_ref::<DefaultFn<T>>())
        .map(|f| f())
}

// ============================================================================
// Registry
// ============================================================================

/// One generator per produced type.
///
/// Entries are inserted in list order, so for duplicate types the generator
/// registered last wins. Call-specific generators come after context defaults
/// and therefore override them.
#[derive(Debug, Clone, Default)]
pub struct GeneratorRegistry {
    by_type: HashMap<TypeId, Generator>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_generators<'a, I>(generators: I) -> Self
    where
        I: IntoIterator<Item = &'a Generator>,
    {
        let mut registry = Self::new();
        for generator in generators {
            registry.register(generator.clone());
        }
        registry
    }

    /// Insert `generator`, returning the one it displaced for the same type.
    pub fn register(&mut self, generator: Generator) -> Option<Generator> {
        let displaced = self.by_type.insert(generator.type_id, generator);
        if let Some(ref old) = displaced {
            tracing::debug!(
                label = %old.label,
                ty = old.type_name,
                "generator overridden by later registration"
            );
        }
        displaced
    }

    pub fn get<T: 'static>(&self) -> Option<&Generator> {
        self.by_type.get(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// Strategy for one argument of type `T`: the registered generator, else
    /// the built-in default, else a strategy that aborts the check.
    pub fn strategy_for<T>(&self) -> BoxedStrategy<T>
    where
        T: Clone + fmt::Debug + 'static,
    {
        self.get::<T>()
            .and_then(|g| g.strategy::<T>())
            .or_else(default_for::<T>)
            .unwrap_or_else(|| MissingGenerator::<T>::new().boxed())
    }
}

/// Stands in for an argument type nobody can produce.
struct MissingGenerator<T> {
    type_name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> MissingGenerator<T> {
    fn new() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for MissingGenerator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MissingGenerator")
            .field("type", &self.type_name)
            .finish()
    }
}

impl<T: Clone + fmt::Debug + 'static> Strategy for MissingGenerator<T> {
    type Tree = Just<T>;
    type Value = T;

    fn new_tree(&self, _runner: &mut TestRunner) -> NewTree<Self> {
        Err(Reason::from(format!(
            "no generator registered for type {} and no built-in default",
            self.type_name
        )))
    }
}

/// Adapts a generator function to the evaluator. Values are not shrunk, and a
/// panicking generator aborts the run instead of unwinding through it.
struct GeneratorStrategy<T> {
    label: String,
    produce: GenFn<T>,
}

impl<T> fmt::Debug for GeneratorStrategy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorStrategy")
            .field("label", &self.label)
            .finish()
    }
}

impl<T: Clone + fmt::Debug + 'static> Strategy for GeneratorStrategy<T> {
    type Tree = Just<T>;
    type Value = T;

    fn new_tree(&self, runner: &mut TestRunner) -> NewTree<Self> {
        let rng = runner.rng();
        panic::catch_unwind(AssertUnwindSafe(|| (self.produce)(rng)))
            .map(Just)
            .map_err(|payload| {
                Reason::from(format!(
                    "generator '{}' panicked: {}",
                    self.label,
                    panic_message(payload.as_ref())
                ))
            })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}
