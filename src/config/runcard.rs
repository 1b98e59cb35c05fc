use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::fit_parameters::FitParameters;
use crate::data::dataset::{Dataset, PositivitySet};
use crate::error::{FitError, Result};

/// Base seeds from which every replica derives its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedConfig {
    pub nnseed: u64,
    pub trvlseed: u64,
    pub mcseed: u64,
    /// Fit pseudodata replicas instead of the central values.
    #[serde(default = "default_genrep")]
    pub genrep: bool,
}

fn default_genrep() -> bool {
    true
}

impl Default for SeedConfig {
    fn default() -> Self {
        SeedConfig { nnseed: 1, trvlseed: 1, mcseed: 1, genrep: true }
    }
}

/// Everything needed to fit one replica.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitRuncard {
    #[serde(default)]
    pub parameters: FitParameters,
    #[serde(default)]
    pub seeds: SeedConfig,
    /// Store a checkpoint of the best weights every this many epochs.
    #[serde(default)]
    pub save_weights_each: Option<usize>,
    /// Keep the backend session between fits.
    #[serde(default)]
    pub debug: bool,
    /// Start from the weights in this file instead of a fresh initialisation.
    #[serde(default)]
    pub load: Option<String>,
    pub x_grid: Vec<f64>,
    pub datasets: Vec<Dataset>,
    #[serde(default)]
    pub positivity: Vec<PositivitySet>,
}

impl FitRuncard {
    pub fn validate(&self) -> Result<()> {
        self.parameters.validate()?;
        if self.x_grid.is_empty() {
            return Err(FitError::InvalidConfig("x_grid is empty".into()));
        }
        if self.datasets.is_empty() {
            return Err(FitError::NoChi2Data);
        }
        if self.save_weights_each == Some(0) {
            return Err(FitError::InvalidConfig("save_weights_each must be at least 1".into()));
        }
        let mut names = HashSet::new();
        for ds in &self.datasets {
            ds.validate(self.x_grid.len())?;
            if !names.insert(ds.name.as_str()) {
                return Err(FitError::InvalidConfig(format!("duplicated dataset {}", ds.name)));
            }
        }
        for pos in &self.positivity {
            pos.validate(self.x_grid.len())?;
            if !names.insert(pos.name.as_str()) {
                return Err(FitError::InvalidConfig(format!("duplicated dataset {}", pos.name)));
            }
        }
        Ok(())
    }

    /// Serializes the runcard to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Reads and validates a runcard written as JSON.
    pub fn load_json(path: &str) -> Result<FitRuncard> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let runcard: FitRuncard = serde_json::from_reader(reader)?;
        runcard.validate()?;
        Ok(runcard)
    }
}
