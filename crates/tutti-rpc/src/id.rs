//! Unique correlation ids.

use crate::error::{Result, RpcError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Largest integer a peer using double-precision numbers can represent exactly.
pub const MAX_SAFE_ID: u64 = (1 << 53) - 1;

/// Thresholds for [`IdAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAllocatorConfig {
    /// Sequential ids wrap to 0 after this value, and random ids are drawn
    /// below it while the outstanding set is small.
    pub linear_limit: u64,
    /// Outstanding-id count at which random ids are drawn from the full
    /// safe-integer range instead.
    pub random_threshold: usize,
}

impl Default for IdAllocatorConfig {
    fn default() -> Self {
        Self {
            linear_limit: 1 << 30,
            random_threshold: 1 << 29,
        }
    }
}

/// Hands out ids that are unique among those currently outstanding.
///
/// Ids grow linearly from the last one handed out. When the next sequential
/// id is taken, a collision-checked random id is drawn instead, so the
/// counter never has to grow without bound.
#[derive(Debug)]
pub struct IdAllocator {
    config: IdAllocatorConfig,
    outstanding: HashSet<u64>,
    last: Option<u64>,
    rng: StdRng,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new(IdAllocatorConfig::default())
    }
}

impl IdAllocator {
    pub fn new(config: IdAllocatorConfig) -> Self {
        Self {
            config,
            outstanding: HashSet::new(),
            last: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic random fallback, for tests.
    pub fn with_seed(config: IdAllocatorConfig, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &IdAllocatorConfig {
        &self.config
    }

    pub fn allocate(&mut self) -> Result<u64> {
        let mut id = match self.last {
            None => self.outstanding.len() as u64,
            Some(last) if last < self.config.linear_limit => last + 1,
            Some(_) => 0,
        };

        if self.outstanding.contains(&id) {
            let upper = if self.outstanding.len() < self.config.random_threshold {
                self.config.linear_limit
            } else {
                MAX_SAFE_ID
            };

            if self.taken_below(upper) >= upper {
                return Err(RpcError::IdsExhausted);
            }
            while self.outstanding.contains(&id) {
                id = self.rng.gen_range(0..upper);
            }
        }

        self.outstanding.insert(id);
        self.last = Some(id);
        Ok(id)
    }

    /// Outstanding ids in `0..upper`.
    fn taken_below(&self, upper: u64) -> u64 {
        let len = self.outstanding.len() as u64;
        if len < upper {
            return len;
        }
        self.outstanding.iter().filter(|&&id| id < upper).count() as u64
    }

    /// Returns `false` if `id` was not outstanding.
    pub fn release(&mut self, id: u64) -> bool {
        self.outstanding.remove(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.outstanding.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.outstanding.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outstanding.is_empty()
    }

    pub fn clear(&mut self) {
        self.outstanding.clear();
    }
}
