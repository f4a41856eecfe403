//! # Data Loading and Validation Module
//!
//! This module is the exclusive entry point for user-provided data. It reads
//! the two tab-separated inputs (the gene×sample expression matrix and the
//! gold-standard edge list), validates them, and transforms them into the
//! `ndarray`-backed structures the inference core consumes.
//!
//! - The expression file must carry a header row with a `Gene` column; every
//!   other column is treated as a sample of finite numeric values.
//! - The gold-standard file has no header: two columns, regulator then target.
//! - Failures are assumed to be user-input errors. The `DataError` enum is
//!   designed to give clear, actionable feedback.

use ndarray::{Array2, ArrayView1, ArrayView2};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;
use thiserror::Error;

use crate::network::Edge;

/// A validated, immutable gene×sample expression matrix.
///
/// Rows are genes (unique identifiers, input order preserved), columns are
/// samples. Row labels double as lookup keys for target selection.
#[derive(Debug, Clone)]
pub struct ExpressionTable {
    genes: Vec<String>,
    samples: Vec<String>,
    index: HashMap<String, usize>,
    values: Array2<f64>,
}

impl ExpressionTable {
    /// Builds a table from its parts, enforcing the invariants the loaders
    /// rely on: matching shapes, unique gene identifiers, and at least two
    /// genes and two samples (one candidate regulator and a splittable
    /// sample set).
    pub fn new(
        genes: Vec<String>,
        samples: Vec<String>,
        values: Array2<f64>,
    ) -> Result<Self, DataError> {
        if genes.len() != values.nrows() || samples.len() != values.ncols() {
            return Err(DataError::ShapeMismatch {
                genes: genes.len(),
                samples: samples.len(),
                rows: values.nrows(),
                cols: values.ncols(),
            });
        }
        if genes.len() < 2 {
            return Err(DataError::InsufficientGenes { found: genes.len() });
        }
        if samples.len() < 2 {
            return Err(DataError::InsufficientSamples {
                found: samples.len(),
            });
        }

        let mut index = HashMap::with_capacity(genes.len());
        for (i, gene) in genes.iter().enumerate() {
            if index.insert(gene.clone(), i).is_some() {
                return Err(DataError::DuplicateGene(gene.clone()));
            }
        }

        Ok(Self {
            genes,
            samples,
            index,
            values,
        })
    }

    /// Gene identifiers in input row order.
    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    /// Sample identifiers in input column order.
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// Row position of a gene, if present.
    pub fn row_index(&self, gene: &str) -> Option<usize> {
        self.index.get(gene).copied()
    }

    /// Expression row for a gene, one value per sample.
    pub fn row(&self, gene: &str) -> Option<ArrayView1<'_, f64>> {
        self.row_index(gene).map(|i| self.values.row(i))
    }

    /// The full genes×samples matrix.
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }
}

/// A comprehensive error type for all data loading and validation failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The expression file has no 'Gene' column. The header row must name the gene-identifier column 'Gene'."
    )]
    GeneColumnMissing,
    #[error("The gene identifier '{0}' appears more than once in the expression file.")]
    DuplicateGene(String),
    #[error(
        "The column '{column_name}' could not be converted to the expected type '{expected_type}'. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error("Missing or null values were found in the column '{0}'. Complete data is required.")]
    MissingValuesFound(String),
    #[error(
        "Non-finite values (NaN or Infinity) were found in the column '{0}'. All expression levels must be finite."
    )]
    NonFiniteValuesFound(String),
    #[error(
        "The expression file contains only {found} gene row(s); at least 2 are required so every target has a candidate regulator."
    )]
    InsufficientGenes { found: usize },
    #[error(
        "The expression file contains only {found} sample column(s); at least 2 are required for a train/test split."
    )]
    InsufficientSamples { found: usize },
    #[error(
        "Expression table shape mismatch: {genes} gene label(s) and {samples} sample label(s) against a {rows}x{cols} matrix."
    )]
    ShapeMismatch {
        genes: usize,
        samples: usize,
        rows: usize,
        cols: usize,
    },
    #[error(
        "The gold-standard file must have at least 2 columns (regulator, target), found {found}."
    )]
    GoldColumnCount { found: usize },
}

/// Loads and validates a tab-separated expression matrix.
///
/// The header row must contain a `Gene` column holding the row keys; all
/// remaining columns are samples and must be fully numeric and finite.
pub fn load_expression_table(path: &Path) -> Result<ExpressionTable, DataError> {
    log::info!("loading expression table from '{}'", path.display());
    let df = read_tsv(path, true)?;

    let header: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    if !header.iter().any(|c| c == "Gene") {
        return Err(DataError::GeneColumnMissing);
    }
    let samples: Vec<String> = header.into_iter().filter(|c| c != "Gene").collect();

    let genes = extract_string_column(&df, "Gene")?;
    if genes.len() < 2 {
        return Err(DataError::InsufficientGenes { found: genes.len() });
    }
    if samples.len() < 2 {
        return Err(DataError::InsufficientSamples {
            found: samples.len(),
        });
    }

    let mut values = Array2::zeros((genes.len(), samples.len()));
    for (j, sample) in samples.iter().enumerate() {
        let column = extract_numeric_column(&df, sample)?;
        for (i, v) in column.into_iter().enumerate() {
            values[[i, j]] = v;
        }
    }

    let table = ExpressionTable::new(genes, samples, values)?;
    log::info!(
        "loaded {} genes across {} samples",
        table.n_genes(),
        table.n_samples()
    );
    Ok(table)
}

/// Loads the gold-standard edge list: a headerless two-column TSV where the
/// first column is the regulator and the second the target.
pub fn load_gold_edges(path: &Path) -> Result<HashSet<Edge>, DataError> {
    log::info!("loading gold-standard edges from '{}'", path.display());
    let df = read_tsv(path, false)?;

    if df.width() < 2 {
        return Err(DataError::GoldColumnCount { found: df.width() });
    }
    let header: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    let regulators = extract_string_column(&df, &header[0])?;
    let targets = extract_string_column(&df, &header[1])?;

    let edges: HashSet<Edge> = regulators
        .into_iter()
        .zip(targets)
        .map(|(regulator, target)| Edge::new(regulator, target))
        .collect();
    log::info!("loaded {} unique gold edges", edges.len());
    Ok(edges)
}

fn read_tsv(path: &Path, has_header: bool) -> Result<DataFrame, DataError> {
    let df = CsvReader::new(File::open(path)?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(has_header)
                .with_parse_options(CsvParseOptions::default().with_separator(b'\t')),
        )
        .finish()?;
    Ok(df)
}

fn extract_numeric_column(df: &DataFrame, column_name: &str) -> Result<Vec<f64>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }

    let casted = match series.cast(&DataType::Float64) {
        Ok(casted) => casted,
        Err(_) => {
            return Err(DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "f64 (numeric)",
                found_type: format!("{:?}", series.dtype()),
            });
        }
    };
    if casted.null_count() > 0 {
        return Err(DataError::ColumnWrongType {
            column_name: column_name.to_string(),
            expected_type: "f64 (numeric)",
            found_type: format!("{:?}", series.dtype()),
        });
    }

    let chunked = casted.f64()?.rechunk();
    let values: Vec<f64> = chunked.into_no_null_iter().collect();
    if values.iter().any(|v| !v.is_finite()) {
        return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
    }
    Ok(values)
}

fn extract_string_column(df: &DataFrame, column_name: &str) -> Result<Vec<String>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }

    // Numeric-looking identifiers are legal; render whatever polars
    // inferred back to text.
    let mut values = Vec::with_capacity(series.len());
    for i in 0..series.len() {
        let value = series.get(i).unwrap_or(AnyValue::Null);
        match value {
            AnyValue::Null => {
                return Err(DataError::MissingValuesFound(column_name.to_string()));
            }
            _ => values.push(value.to_string()),
        }
    }
    Ok(values)
}
