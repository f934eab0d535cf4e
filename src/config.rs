use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::rng::LcgParams;

/// Everything a simulation run needs besides the historical data.
///
/// Loaded from JSON; missing fields take the defaults below. `scale` and
/// `period_length` default to "same as the modulus" and "one period for the
/// whole run" respectively.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub seed: u64,
    pub multiplier: u64,
    pub increment: u64,
    pub modulus: u64,
    pub scale: Option<u64>,
    pub n_draws: u64,
    pub period_length: Option<u64>,
    pub replications: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        // m = 100 matches the two-digit random numbers of the visit sheets;
        // a = 21, c = 37 give the full period for it.
        SimulationConfig {
            seed: 42,
            multiplier: 21,
            increment: 37,
            modulus: 100,
            scale: None,
            n_draws: 1200,
            period_length: None,
            replications: 1,
        }
    }
}

impl SimulationConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        info!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|e| Error::configuration(format!("invalid configuration: {}", e)))
    }

    pub fn lcg_params(&self) -> Result<LcgParams> {
        LcgParams::new(self.multiplier, self.increment, self.modulus)
    }

    pub fn scale(&self) -> u64 {
        self.scale.unwrap_or(self.modulus)
    }

    /// Fills in an unset `scale` from the data (the width of its "Angka
    /// Acak" column). An explicit scale always wins; without either,
    /// `scale()` falls back to the modulus.
    pub fn resolve_scale(&mut self, suggested: Option<u64>) {
        if self.scale.is_none() {
            self.scale = suggested;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let params = self.lcg_params()?;
        if self.seed >= self.modulus {
            return Err(Error::configuration(format!(
                "seed {} must be in [0, {})",
                self.seed, self.modulus
            )));
        }
        if self.scale() == 0 {
            return Err(Error::configuration("scale must be greater than 0"));
        }
        if self.modulus > self.scale() {
            return Err(Error::configuration(format!(
                "modulus {} exceeds scale {}",
                self.modulus,
                self.scale()
            )));
        }
        if self.period_length == Some(0) {
            return Err(Error::configuration("period length must be greater than 0"));
        }
        if self.replications == 0 {
            return Err(Error::configuration("replications must be at least 1"));
        }
        if !params.has_full_period() {
            warn!(
                "a={}, c={}, m={} does not reach the full period {}; some raw values never occur",
                self.multiplier, self.increment, self.modulus, self.modulus
            );
        }
        Ok(())
    }
}
