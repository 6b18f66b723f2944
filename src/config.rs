//! Construction-time tuning: initial capacity and load factor.

use crate::error::ConfigError;
use crate::hashing::{DEFAULT_INITIAL_CAPACITY, DEFAULT_LOAD_FACTOR, MAXIMUM_CAPACITY};

/// Sizing parameters for a map.
///
/// The initial capacity is a hint: the table is allocated lazily on the
/// first insertion, rounded up to a power of two and clamped to
/// [`MAXIMUM_CAPACITY`]. The table doubles whenever the number of entries
/// exceeds `capacity * load_factor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapConfig {
    initial_capacity: usize,
    load_factor: f32,
}

impl MapConfig {
    /// Validated configuration. Capacities above the maximum are clamped
    /// rather than rejected.
    pub fn new(initial_capacity: usize, load_factor: f32) -> Result<Self, ConfigError> {
        let cfg = Self::default()
            .with_initial_capacity(initial_capacity)
            .with_load_factor(load_factor);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity.min(MAXIMUM_CAPACITY);
        self
    }

    /// Builder form; call [`validate`](Self::validate) (or pass the config to a
    /// map constructor, which does) before relying on it.
    pub fn with_load_factor(mut self, load_factor: f32) -> Self {
        self.load_factor = load_factor;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.load_factor > 0.0 && self.load_factor.is_finite() {
            Ok(())
        } else {
            Err(ConfigError::InvalidLoadFactor(self.load_factor))
        }
    }

    pub fn initial_capacity(&self) -> usize {
        self.initial_capacity
    }

    pub fn load_factor(&self) -> f32 {
        self.load_factor
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            load_factor: DEFAULT_LOAD_FACTOR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_sixteen_at_three_quarters() {
        let cfg = MapConfig::default();
        assert_eq!(cfg.initial_capacity(), 16);
        assert_eq!(cfg.load_factor(), 0.75);
        assert!(cfg.validate().is_ok());
    }

    /// Invariant: non-positive and non-finite load factors are rejected.
    #[test]
    fn bad_load_factors_rejected() {
        for lf in [0.0, -0.5, f32::NAN, f32::INFINITY] {
            match MapConfig::new(16, lf) {
                Err(ConfigError::InvalidLoadFactor(_)) => {}
                other => panic!("unexpected result for {lf}: {:?}", other),
            }
        }
        assert!(MapConfig::new(16, 2.5).is_ok());
    }

    /// Invariant: oversized capacities are clamped, not rejected.
    #[test]
    fn capacity_is_clamped() {
        let cfg = MapConfig::new(usize::MAX, 0.75).unwrap();
        assert_eq!(cfg.initial_capacity(), MAXIMUM_CAPACITY);
    }
}
