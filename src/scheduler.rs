//! Defines the scheduler that chooses which prompt from the active pool is shown next.
//!
//! Pools come in two modes:
//! 1. Weighted pools draw an integer uniformly in `[1, total_weight]` and walk the entries in their
//!    declared order, accumulating weights, until the running total reaches the draw. Each prompt
//!    is therefore chosen with probability `weight / total_weight`, and the same prompt can be
//!    chosen twice in a row.
//! 2. Sequential pools ignore weights and cycle through the entries in declared order. The position
//!    in the cycle is kept by the caller, so that a session can own it as part of its state.
//!
//! Entries are always walked in declared order rather than through a map, so that a seeded random
//! number generator always yields the same sequence of prompts.

use rand::{Rng, rngs::ThreadRng};
use ustr::Ustr;

use crate::{
    data::{Pool, SelectionMode},
    error::ConfigurationError,
};

/// Chooses the next prompt to present from a pool.
pub struct SuiteScheduler<R: Rng = ThreadRng> {
    /// The source of randomness used by weighted pools.
    rng: R,
}

impl SuiteScheduler<ThreadRng> {
    /// Creates a scheduler backed by the thread-local random number generator.
    #[must_use]
    pub fn new() -> Self {
        Self { rng: rand::rng() }
    }
}

impl Default for SuiteScheduler<ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> SuiteScheduler<R> {
    /// Creates a scheduler backed by the given random number generator.
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Returns the ID of the next prompt to present. The cursor holds the index of the entry last
    /// returned from a sequential pool and is advanced by this call. Weighted pools leave it
    /// untouched.
    pub fn choose_next(
        &mut self,
        pool: &Pool,
        cursor: &mut Option<usize>,
    ) -> Result<Ustr, ConfigurationError> {
        if pool.entries.is_empty() {
            return Err(ConfigurationError::EmptyPool(pool.id));
        }

        match pool.mode {
            SelectionMode::Weighted => self.choose_weighted(pool),
            SelectionMode::Sequential => {
                let next = cursor.map_or(0, |c| (c + 1) % pool.entries.len());
                *cursor = Some(next);
                Ok(pool.entries[next].prompt_id)
            }
        }
    }

    /// Draws an entry from a weighted pool.
    fn choose_weighted(&mut self, pool: &Pool) -> Result<Ustr, ConfigurationError> {
        let total_weight = pool.total_weight()?;
        if total_weight <= 0 {
            return Err(ConfigurationError::NonPositiveTotalWeight(
                pool.id,
                total_weight,
            ));
        }

        let draw = self.rng.random_range(1..=total_weight);
        let mut running_total = 0;
        for entry in &pool.entries {
            running_total += entry.weight;
            if running_total >= draw {
                return Ok(entry.prompt_id);
            }
        }

        // Only reachable if some weights are negative, which validated pools never contain. Return
        // the last entry rather than an ID outside the pool.
        Ok(pool.entries[pool.entries.len() - 1].prompt_id)
    }
}
