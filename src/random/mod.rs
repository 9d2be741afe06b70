//! Named, independently seeded random number streams.
//!
//! Every random decision in a run draws from a stream declared with
//! [`define_rng!`]. Each stream is created lazily from the registry's base seed
//! offset by a hash of the stream's name, so adding draws to one stream never
//! perturbs another, and the same base seed always replays the same run.
mod macros;
mod sampling_algorithms;

use std::any::{Any, TypeId};
use std::cell::{RefCell, RefMut};
use std::collections::HashMap;

use log::trace;
use rand::distr::uniform::{SampleRange, SampleUniform};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use xxhash_rust::xxh3::xxh3_64;

pub use macros::define_rng;
pub use sampling_algorithms::{sample_multiple_from_known_length, sample_single_from_known_length};

pub trait RngId: Copy + Clone + 'static {
    type RngType: SeedableRng + Rng;
    fn get_name() -> &'static str;
}

/// A convenience method to compute the seed offset of a stream name.
pub fn hash_str(data: &str) -> u64 {
    xxh3_64(data.as_bytes())
}

// This is a wrapper that allows for future support for different types of
// random number generators (anything that implements SeedableRng is valid).
struct RngHolder {
    rng: Box<dyn Any>,
}

/// Stores a base seed and the streams created from it. The streams live in a
/// `RefCell` so sampling only needs a shared borrow of the owner.
pub struct RngRegistry {
    base_seed: u64,
    rng_holders: RefCell<HashMap<TypeId, RngHolder>>,
}

impl RngRegistry {
    pub fn new(base_seed: u64) -> Self {
        trace!("initializing random streams with base seed {base_seed}");
        RngRegistry {
            base_seed,
            rng_holders: RefCell::new(HashMap::new()),
        }
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Resets the base seed. Existing streams are dropped and get re-seeded
    /// the next time they are used.
    pub fn reseed(&mut self, base_seed: u64) {
        self.base_seed = base_seed;
        self.rng_holders.get_mut().clear();
    }

    /// Gets a mutable reference to the stream associated with the given
    /// [`RngId`], creating it on first use.
    fn get_rng<R: RngId>(&self) -> RefMut<R::RngType> {
        let rng_holders = self
            .rng_holders
            .try_borrow_mut()
            .expect("random stream already borrowed");
        RefMut::map(rng_holders, |holders| {
            holders
                .entry(TypeId::of::<R>())
                .or_insert_with(|| {
                    trace!(
                        "creating new RNG {} (seed={})",
                        R::get_name(),
                        self.base_seed
                    );
                    let seed_offset = hash_str(R::get_name());
                    RngHolder {
                        rng: Box::new(R::RngType::seed_from_u64(
                            self.base_seed.wrapping_add(seed_offset),
                        )),
                    }
                })
                .rng
                .downcast_mut::<R::RngType>()
                .expect("stream type mismatch")
        })
    }

    /// Applies `sampler` to the stream associated with the given [`RngId`].
    pub fn sample<R: RngId, T>(&self, _rng_id: R, sampler: impl FnOnce(&mut R::RngType) -> T) -> T {
        let mut rng = self.get_rng::<R>();
        sampler(&mut rng)
    }

    /// Gets a random sample within `range`.
    pub fn sample_range<R: RngId, S, T>(&self, rng_id: R, range: S) -> T
    where
        S: SampleRange<T>,
        T: SampleUniform,
    {
        self.sample(rng_id, |rng| rng.random_range(range))
    }

    /// Gets a random boolean value which is true with probability `p`.
    /// `p` must lie in `[0, 1]`.
    pub fn sample_bool<R: RngId>(&self, rng_id: R, p: f64) -> bool {
        self.sample(rng_id, |rng| rng.random_bool(p))
    }

    /// Draws from `U[0, 1)`.
    pub fn sample_unit<R: RngId>(&self, rng_id: R) -> f64 {
        self.sample(rng_id, |rng| rng.random::<f64>())
    }

    /// Shuffles `items` in place.
    pub fn shuffle<R: RngId, T>(&self, rng_id: R, items: &mut [T]) {
        self.sample(rng_id, |rng| items.shuffle(rng));
    }
}
