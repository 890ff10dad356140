//! Batches of samples
//!
//! Every sample is generated from its own child [`RandomSource`], seeded from
//! the parent before generation starts. A failed sample therefore carries the
//! seed that reproduces it, and a batch can be generated in parallel with
//! exactly the same result as sequentially.

use crate::error::Error;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{Gen, RandomSource};

/// A generated value and how to reproduce it
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<T> {
    /// The value
    pub value: T,
    /// Size it was drawn at
    pub size: u32,
    /// Seed of the source it was drawn from
    pub seed: u64,
}

/// A sample whose generation failed
#[derive(Debug)]
pub struct SampleFailure {
    /// Size the sample was drawn at
    pub size: u32,
    /// Seed of the source it was drawn from
    pub seed: u64,
    /// What went wrong
    pub error: Error,
}

/// One step of a growth schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    /// Size parameter
    pub size: u32,
    /// Number of samples
    pub count: usize,
}

impl Tier {
    /// Create a tier
    pub fn new(size: u32, count: usize) -> Self {
        Self { size, count }
    }

    /// One minimal instance, a few small and medium ones, one large one
    pub fn default_growth() -> Vec<Tier> {
        vec![Tier::new(0, 1), Tier::new(5, 4), Tier::new(20, 4), Tier::new(1000, 1)]
    }
}

/// Ordered outcome of a sampling run
#[derive(Debug)]
pub struct Batch<T> {
    /// One entry per requested sample, in order
    pub entries: Vec<Result<Sample<T>, SampleFailure>>,
}

impl<T> Default for Batch<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T> Batch<T> {
    /// Number of entries, failed ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the batch has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Successful samples, in order
    pub fn samples(&self) -> impl Iterator<Item = &Sample<T>> {
        self.entries.iter().filter_map(|e| e.as_ref().ok())
    }

    /// Failed samples, in order
    pub fn failures(&self) -> impl Iterator<Item = &SampleFailure> {
        self.entries.iter().filter_map(|e| e.as_ref().err())
    }

    /// Values of the successful samples
    pub fn values(&self) -> Vec<&T> {
        self.samples().map(|s| &s.value).collect()
    }

    /// Consume the batch, keeping only successful values
    pub fn into_values(self) -> Vec<T> {
        self.entries.into_iter().filter_map(|e| e.ok().map(|s| s.value)).collect()
    }

    /// Whether every sample was generated
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(Result::is_ok)
    }

    /// Append another batch
    pub fn extend(&mut self, other: Batch<T>) {
        self.entries.extend(other.entries);
    }
}

fn draw<T: 'static>(gen: &Gen<T>, size: u32, seed: u64) -> Result<Sample<T>, SampleFailure> {
    tracing::trace!(size, seed, "drawing sample");
    let (result, _) = gen.generate(size, RandomSource::from_seed(seed));
    match result {
        Ok(value) => Ok(Sample { value, size, seed }),
        Err(error) => {
            tracing::warn!(size, seed, %error, "sample generation failed");
            Err(SampleFailure { size, seed, error })
        }
    }
}

/// Draw `count` samples at `size`
///
/// Returns the batch and the advanced source, so calls can be chained.
pub fn sample<T: 'static>(
    gen: &Gen<T>,
    size: u32,
    count: usize,
    mut source: RandomSource,
) -> (Batch<T>, RandomSource) {
    let entries = (0..count).map(|_| draw(gen, size, source.next_seed())).collect();
    (Batch { entries }, source)
}

/// Draw samples for each tier in turn
pub fn sample_tiers<T: 'static>(
    gen: &Gen<T>,
    tiers: &[Tier],
    mut source: RandomSource,
) -> (Batch<T>, RandomSource) {
    let mut batch = Batch::default();
    for tier in tiers {
        let (part, next) = sample(gen, tier.size, tier.count, source);
        batch.extend(part);
        source = next;
    }
    (batch, source)
}

/// Same result as [`sample`], generated on the rayon thread pool
pub fn sample_parallel<T: Send + 'static>(
    gen: &Gen<T>,
    size: u32,
    count: usize,
    mut source: RandomSource,
) -> (Batch<T>, RandomSource) {
    let seeds: Vec<u64> = (0..count).map(|_| source.next_seed()).collect();
    let entries = seeds.into_par_iter().map(|seed| draw(gen, size, seed)).collect();
    (Batch { entries }, source)
}
