//! Network assembly: one inference pass per target gene, accumulated into a
//! set of directed edges.

use std::collections::HashSet;
use std::fmt;

use crate::data::ExpressionTable;
use crate::methods::{InferenceError, InferenceMethod};

/// A directed regulatory edge.
///
/// The canonical text encoding is `"{regulator}->{target}"`; the gold-standard
/// loader and the predictor both produce this exact form, so edge sets from
/// the two sides compare consistently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub regulator: String,
    pub target: String,
}

impl Edge {
    pub fn new(regulator: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            regulator: regulator.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.regulator, self.target)
    }
}

/// Runs the inference method once per gene (in table row order, each gene as
/// target) and collects every reported regulator as a directed edge.
///
/// Duplicate regulator/target pairs collapse via set membership. Self-loops
/// cannot occur: the dataset preparer removes the target's row before
/// fitting. The first inference failure aborts the pass.
pub fn predict_network(
    table: &ExpressionTable,
    method: &dyn InferenceMethod,
) -> Result<HashSet<Edge>, InferenceError> {
    let mut edges = HashSet::new();
    for target in table.genes() {
        let regulators = method.infer(target, table)?;
        log::debug!(
            "target '{}': {} predicted regulator(s)",
            target,
            regulators.len()
        );
        for regulator in regulators {
            edges.insert(Edge::new(regulator, target.clone()));
        }
    }
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Stub strategy that names every other gene a regulator.
    struct EveryOtherGene;

    impl InferenceMethod for EveryOtherGene {
        fn name(&self) -> &'static str {
            "every-other-gene"
        }

        fn infer(
            &self,
            target: &str,
            table: &ExpressionTable,
        ) -> Result<HashSet<String>, InferenceError> {
            Ok(table
                .genes()
                .iter()
                .filter(|gene| gene.as_str() != target)
                .cloned()
                .collect())
        }
    }

    fn tiny_table() -> ExpressionTable {
        let genes = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let samples = vec!["S1".to_string(), "S2".to_string()];
        ExpressionTable::new(genes, samples, Array2::zeros((3, 2))).unwrap()
    }

    #[test]
    fn test_edge_encoding() {
        let edge = Edge::new("A", "B");
        assert_eq!(edge.to_string(), "A->B");
    }

    #[test]
    fn test_predict_network_visits_every_target() {
        let table = tiny_table();
        let edges = predict_network(&table, &EveryOtherGene).unwrap();

        // 3 targets x 2 regulators each.
        assert_eq!(edges.len(), 6);
        assert!(edges.contains(&Edge::new("B", "A")));
        assert!(edges.contains(&Edge::new("C", "A")));
        assert!(edges.contains(&Edge::new("A", "C")));
    }

    #[test]
    fn test_predict_network_has_no_self_loops() {
        let table = tiny_table();
        let edges = predict_network(&table, &EveryOtherGene).unwrap();
        assert!(edges.iter().all(|edge| edge.regulator != edge.target));
    }
}
