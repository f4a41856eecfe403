//! Per-target dataset preparation: feature/label extraction and the random
//! train/test partition of samples.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;

use crate::data::ExpressionTable;

/// Default fraction of samples assigned to the training fold.
pub const DEFAULT_TRAIN_FRACTION: f64 = 0.8;

/// Controls the random sample partition.
///
/// With `seed: None` every call draws a fresh partition from OS entropy, so
/// inference results vary across runs. Supplying a seed makes the partition
/// (and downstream model fitting that derives from it) reproducible.
#[derive(Debug, Clone, Copy)]
pub struct SplitConfig {
    pub train_fraction: f64,
    pub seed: Option<u64>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: DEFAULT_TRAIN_FRACTION,
            seed: None,
        }
    }
}

impl SplitConfig {
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// The per-target regression dataset: candidate-regulator features split
/// into disjoint train/test folds, with the aligned regulator names.
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// Candidate regulator genes, one per feature column, in the table's
    /// original row order with the target removed.
    pub regulators: Vec<String>,
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
}

impl PreparedData {
    pub fn n_train(&self) -> usize {
        self.y_train.len()
    }

    pub fn n_test(&self) -> usize {
        self.y_test.len()
    }
}

#[derive(Error, Debug)]
pub enum PrepareError {
    #[error("The target gene '{0}' is not a row in the expression table.")]
    TargetGeneNotFound(String),
    #[error("The train fraction must lie strictly between 0 and 1, got {0}.")]
    InvalidTrainFraction(f64),
}

/// Prepares the regression dataset for one target gene.
///
/// The target's row becomes the label vector; every other row becomes one
/// feature column (transposed so rows are samples). Samples are then
/// randomly partitioned into train/test folds. The folds are disjoint,
/// jointly cover every sample, and are both non-empty.
pub fn prepare(
    target: &str,
    table: &ExpressionTable,
    config: &SplitConfig,
) -> Result<PreparedData, PrepareError> {
    if !(config.train_fraction > 0.0 && config.train_fraction < 1.0) {
        return Err(PrepareError::InvalidTrainFraction(config.train_fraction));
    }
    let target_row = table
        .row_index(target)
        .ok_or_else(|| PrepareError::TargetGeneNotFound(target.to_string()))?;

    let n_samples = table.n_samples();
    let n_features = table.n_genes() - 1;
    let values = table.values();

    let y_full: Array1<f64> = values.row(target_row).to_owned();

    let mut regulators = Vec::with_capacity(n_features);
    let mut x_full = Array2::zeros((n_samples, n_features));
    for (row, gene) in table.genes().iter().enumerate() {
        if row == target_row {
            continue;
        }
        let feature = regulators.len();
        regulators.push(gene.clone());
        x_full.column_mut(feature).assign(&values.row(row));
    }

    let mut order: Vec<usize> = (0..n_samples).collect();
    order.shuffle(&mut config.rng());
    // Both folds stay non-empty for any fraction in (0, 1).
    let n_train = ((n_samples as f64) * config.train_fraction).round() as usize;
    let n_train = n_train.clamp(1, n_samples - 1);
    let (train_idx, test_idx) = order.split_at(n_train);

    Ok(PreparedData {
        regulators,
        x_train: x_full.select(Axis(0), train_idx),
        x_test: x_full.select(Axis(0), test_idx),
        y_train: y_full.select(Axis(0), train_idx),
        y_test: y_full.select(Axis(0), test_idx),
    })
}
