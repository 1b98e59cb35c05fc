use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};

fn full_training_fraction() -> f64 {
    1.0
}

/// One experimental dataset: FK-table rows convolved with the PDF on the
/// shared x-grid give the theory prediction for each data point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    /// `ndata` rows, one weight per x-grid node.
    pub fktable: Vec<Vec<f64>>,
    pub central_values: Vec<f64>,
    /// Uncorrelated uncertainty of each point.
    pub sigma: Vec<f64>,
    /// Fraction of points assigned to training.
    #[serde(default = "full_training_fraction")]
    pub frac: f64,
    /// Pseudodata for this dataset must be non-negative.
    #[serde(default)]
    pub check_positive: bool,
}

impl Dataset {
    pub fn ndata(&self) -> usize {
        self.central_values.len()
    }

    pub fn validate(&self, grid_size: usize) -> Result<()> {
        let n = self.ndata();
        if n == 0 {
            return Err(FitError::InvalidConfig(format!("dataset {} has no points", self.name)));
        }
        if self.fktable.len() != n || self.sigma.len() != n {
            return Err(FitError::Shape(format!(
                "dataset {}: {} points, {} fktable rows, {} uncertainties",
                self.name,
                n,
                self.fktable.len(),
                self.sigma.len()
            )));
        }
        if let Some(row) = self.fktable.iter().find(|row| row.len() != grid_size) {
            return Err(FitError::Shape(format!(
                "dataset {}: fktable row of length {} on a grid of {} nodes",
                self.name,
                row.len(),
                grid_size
            )));
        }
        if self.sigma.iter().any(|s| !(*s > 0.0)) {
            return Err(FitError::InvalidConfig(format!(
                "dataset {} has non-positive uncertainties",
                self.name
            )));
        }
        if !(0.0..=1.0).contains(&self.frac) {
            return Err(FitError::InvalidConfig(format!(
                "dataset {}: training fraction {} outside [0, 1]",
                self.name, self.frac
            )));
        }
        Ok(())
    }
}

/// Observable whose predictions are penalised when negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositivitySet {
    pub name: String,
    pub fktable: Vec<Vec<f64>>,
}

impl PositivitySet {
    pub fn validate(&self, grid_size: usize) -> Result<()> {
        if self.fktable.is_empty() || self.fktable.iter().any(|row| row.len() != grid_size) {
            return Err(FitError::Shape(format!(
                "positivity set {}: fktable does not match a grid of {} nodes",
                self.name, grid_size
            )));
        }
        Ok(())
    }
}

/// A dataset prepared for one replica: its training mask and the
/// pseudodata the replica is fitted to.
#[derive(Debug, Clone)]
pub struct ReplicaDataset {
    pub dataset: Dataset,
    pub tr_mask: Vec<bool>,
    pub pseudodata: Vec<f64>,
}

impl ReplicaDataset {
    pub fn ndata_tr(&self) -> usize {
        self.tr_mask.iter().filter(|&&m| m).count()
    }

    pub fn ndata_vl(&self) -> usize {
        self.tr_mask.len() - self.ndata_tr()
    }

    pub fn info(&self) -> DatasetInfo {
        DatasetInfo {
            name: self.dataset.name.clone(),
            ndata: self.ndata_tr(),
            ndata_vl: self.ndata_vl(),
            count_chi2: true,
            positivity: false,
        }
    }
}

/// What the stopping logic needs to know about a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetInfo {
    pub name: String,
    pub ndata: usize,
    pub ndata_vl: usize,
    /// Whether the dataset contributes to the chi².
    pub count_chi2: bool,
    pub positivity: bool,
}

impl DatasetInfo {
    pub fn positivity(name: &str) -> Self {
        DatasetInfo {
            name: name.to_string(),
            ndata: 0,
            ndata_vl: 0,
            count_chi2: false,
            positivity: true,
        }
    }
}

/// Point counts per dataset, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataCounts {
    pub training: Vec<(String, usize)>,
    pub validation: Vec<(String, usize)>,
    pub positivity: Vec<String>,
}

impl DataCounts {
    pub fn total_training(&self) -> usize {
        self.training.iter().map(|(_, n)| n).sum()
    }
}

/// Splits the dataset records into training counts, validation counts and
/// positivity-set names. Datasets with no points in a split are left out of
/// it. When no dataset has validation points the validation counts are the
/// training counts.
pub fn parse_ndata(all_data: &[DatasetInfo]) -> DataCounts {
    let mut counts = DataCounts::default();
    for info in all_data {
        if info.count_chi2 {
            if info.ndata > 0 {
                counts.training.push((info.name.clone(), info.ndata));
            }
            if info.ndata_vl > 0 {
                counts.validation.push((info.name.clone(), info.ndata_vl));
            }
        }
        if info.positivity {
            counts.positivity.push(info.name.clone());
        }
    }
    if counts.validation.is_empty() {
        counts.validation = counts.training.clone();
    }
    counts
}
