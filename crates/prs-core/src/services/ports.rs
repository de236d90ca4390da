use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{RestartError, Result};
use crate::models::PortRange;

/// Draws restart ports uniformly from a configured range.
pub struct PortPicker {
    rng: Mutex<StdRng>,
}

impl PortPicker {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic picker; the same seed always yields the same sequence.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn pick(&self, range: &PortRange) -> Result<u16> {
        if range.min == 0 || range.min > range.max {
            return Err(RestartError::ConfigValidation(format!(
                "cannot pick a port from {}..={}",
                range.min, range.max
            )));
        }
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(rng.random_range(range.min..=range.max))
    }
}

impl Default for PortPicker {
    fn default() -> Self {
        Self::new()
    }
}
