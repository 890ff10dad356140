//! Random generators
//!
//! A [`Gen<T>`] is a size-aware random producer: given a [`GenContext`]
//! (size parameter plus a seeded [`RandomSource`]) it yields a `T` or an
//! error. Generators are cheap to clone and can be shared between threads.
//!
//! The layers built on top of it:
//!
//! * [`pattern`]: strings matching a regular expression
//! * [`facets`]: lexical values of simple types
//! * [`structural`]: element trees following a schema
//! * [`sampling`]: batches of values at one or more sizes

pub mod facets;
pub mod pattern;
pub mod registry;
pub mod sampling;
pub mod structural;

pub use facets::ScalarGenerator;
pub use pattern::{PatternGenerator, PatternSyntax};
pub use registry::CustomGenerators;
pub use sampling::{sample, sample_parallel, sample_tiers, Batch, Sample, SampleFailure, Tier};
pub use structural::ElementGenerator;

use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::fmt;
use std::sync::Arc;

/// Seeded source of randomness
///
/// The seed it was created from is remembered so that a failing sample can
/// be reproduced.
#[derive(Clone)]
pub struct RandomSource {
    seed: u64,
    rng: StdRng,
}

impl RandomSource {
    /// Deterministic source for a seed
    pub fn from_seed(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Source seeded from the thread-local generator
    pub fn fresh() -> Self {
        Self::from_seed(rand::random::<u64>())
    }

    /// Seed this source was created from
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Draw a seed for a child source
    pub fn next_seed(&mut self) -> u64 {
        self.rng.next_u64()
    }

    /// Split off `n` independent child sources
    pub fn split(&mut self, n: usize) -> Vec<RandomSource> {
        (0..n).map(|_| RandomSource::from_seed(self.next_seed())).collect()
    }
}

impl fmt::Debug for RandomSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomSource").field("seed", &self.seed).finish()
    }
}

impl RngCore for RandomSource {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        self.rng.fill_bytes(dst)
    }
}

/// State threaded through one generation run
pub struct GenContext<'a> {
    /// Size parameter
    pub size: u32,
    /// Randomness
    pub rng: &'a mut RandomSource,
    pub(crate) depth: u32,
    pub(crate) nodes: usize,
}

impl<'a> GenContext<'a> {
    /// Fresh context at depth zero
    pub fn new(size: u32, rng: &'a mut RandomSource) -> Self {
        Self {
            size,
            rng,
            depth: 0,
            nodes: 0,
        }
    }

    /// Current element depth
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Elements produced so far in this run
    pub fn nodes(&self) -> usize {
        self.nodes
    }
}

type GenFn<T> = dyn Fn(&mut GenContext<'_>) -> Result<T> + Send + Sync;

/// Size-aware random generator
pub struct Gen<T> {
    f: Arc<GenFn<T>>,
}

impl<T> Clone for Gen<T> {
    fn clone(&self) -> Self {
        Self { f: Arc::clone(&self.f) }
    }
}

impl<T> fmt::Debug for Gen<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Gen")
    }
}

impl<T: 'static> Gen<T> {
    /// Generator from a function
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&mut GenContext<'_>) -> Result<T> + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    /// Run inside an existing context
    pub fn run(&self, ctx: &mut GenContext<'_>) -> Result<T> {
        (self.f)(ctx)
    }

    /// Run once at `size`, returning the advanced source
    pub fn generate(&self, size: u32, mut source: RandomSource) -> (Result<T>, RandomSource) {
        let result = {
            let mut ctx = GenContext::new(size, &mut source);
            self.run(&mut ctx)
        };
        (result, source)
    }

    /// Transform generated values
    pub fn map<U: 'static, F>(self, f: F) -> Gen<U>
    where
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        Gen::from_fn(move |ctx| self.run(ctx).map(&f))
    }

    /// Pick one of several generators uniformly
    pub fn one_of(gens: Vec<Gen<T>>) -> Result<Self> {
        if gens.is_empty() {
            return Err(Error::Schema("one_of needs at least one generator".to_string()));
        }
        Ok(Gen::from_fn(move |ctx| {
            let i = ctx.rng.random_range(0..gens.len());
            gens[i].run(ctx)
        }))
    }
}

impl<T: Clone + Send + Sync + 'static> Gen<T> {
    /// Always the same value
    pub fn constant(value: T) -> Self {
        Gen::from_fn(move |_| Ok(value.clone()))
    }

    /// Pick one of several values uniformly
    pub fn elements(values: Vec<T>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::EmptyEnumeration {
                type_name: "elements".to_string(),
            });
        }
        Ok(Gen::from_fn(move |ctx| {
            let i = ctx.rng.random_range(0..values.len());
            Ok(values[i].clone())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_source_is_deterministic() {
        let mut a = RandomSource::from_seed(42);
        let mut b = RandomSource::from_seed(42);
        assert_eq!(a.next_seed(), b.next_seed());
        assert_eq!(a.seed(), 42);

        let children: Vec<u64> = a.split(3).iter().map(|s| s.seed()).collect();
        let again: Vec<u64> = b.split(3).iter().map(|s| s.seed()).collect();
        assert_eq!(children, again);
    }

    #[test]
    fn test_constant_and_map() {
        let gen = Gen::constant(21).map(|x| x * 2);
        let (value, _) = gen.generate(10, RandomSource::from_seed(1));
        assert_eq!(value.unwrap(), 42);
    }

    #[test]
    fn test_elements_and_one_of() {
        let gen = Gen::elements(vec!["a", "b"]).unwrap();
        let mut source = RandomSource::from_seed(3);
        let mut ctx = GenContext::new(5, &mut source);
        for _ in 0..20 {
            let v = gen.run(&mut ctx).unwrap();
            assert!(v == "a" || v == "b");
        }
        assert!(Gen::<u8>::elements(vec![]).is_err());

        let gen = Gen::one_of(vec![Gen::constant(1), Gen::constant(2)]).unwrap();
        let (value, _) = gen.generate(0, RandomSource::from_seed(9));
        assert!(matches!(value.unwrap(), 1 | 2));
    }

    #[test]
    fn test_size_is_visible() {
        let gen = Gen::from_fn(|ctx| Ok(ctx.size));
        let (value, _) = gen.generate(17, RandomSource::fresh());
        assert_eq!(value.unwrap(), 17);
    }
}
