// ========================================================================================
//
//                                  REGULON
//
// ========================================================================================
//
// The command-line orchestrator. It owns the run lifecycle: argument parsing,
// data loading, one network-inference pass per requested method, and scoring
// against the gold standard. All heavy lifting lives in the library crate.

use clap::{Parser, ValueEnum};
use regulon::data::{load_expression_table, load_gold_edges};
use regulon::methods::{
    ForestInference, InferenceMethod, LassoInference, DEFAULT_MAX_DEPTH,
    DEFAULT_MIN_SAMPLES_LEAF, DEFAULT_PENALTY, DEFAULT_TREES,
};
use regulon::network::{predict_network, Edge};
use regulon::score::score_edges;
use regulon::split::{SplitConfig, DEFAULT_TRAIN_FRACTION};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

// ========================================================================================
//                         COMMAND-LINE INTERFACE DEFINITION
// ========================================================================================

#[derive(Clone, Copy, PartialEq, ValueEnum)]
enum MethodChoice {
    /// Sparse linear regression (L1-regularized).
    Lasso,
    /// Ensemble of regression trees.
    Forest,
    /// Run both methods and score each.
    Both,
}

#[derive(Parser)]
#[clap(
    name = "regulon",
    version,
    about = "Regression-based gene regulatory network inference and scoring."
)]
struct Args {
    /// Path to the expression matrix: tab-separated, header row with a
    /// 'Gene' column plus one column per sample.
    expression: PathBuf,

    /// Path to the gold-standard edge list (headerless TSV: regulator,
    /// target). Without it, edges are predicted but not scored.
    #[clap(long)]
    gold: Option<PathBuf>,

    /// Inference method to run.
    #[clap(long, value_enum, default_value_t = MethodChoice::Lasso)]
    method: MethodChoice,

    /// Seed for the train/test partition and ensemble bootstrap. Omit for a
    /// fresh partition on every run.
    #[clap(long)]
    seed: Option<u64>,

    /// Fraction of samples assigned to the training fold.
    #[clap(long, default_value_t = DEFAULT_TRAIN_FRACTION)]
    train_fraction: f64,

    /// L1 penalty for the lasso method.
    #[clap(long, default_value_t = DEFAULT_PENALTY)]
    penalty: f64,

    /// Number of trees in the forest method.
    #[clap(long, default_value_t = DEFAULT_TREES)]
    trees: u16,

    /// Maximum tree depth in the forest method.
    #[clap(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: u16,

    /// Minimum training samples per leaf in the forest method.
    #[clap(long, default_value_t = DEFAULT_MIN_SAMPLES_LEAF)]
    min_samples_leaf: usize,

    /// Also write the predicted edges to this file, one per line.
    #[clap(long)]
    output: Option<PathBuf>,
}

// ========================================================================================
//                           THE MAIN ORCHESTRATION LOGIC
// ========================================================================================

fn main() {
    env_logger::init();
    let args = Args::parse();

    // --- Phase 1: Load inputs ---
    let table = match load_expression_table(&args.expression) {
        Ok(table) => table,
        Err(e) => {
            eprintln!("Error loading expression table: {e}");
            process::exit(1);
        }
    };
    eprintln!(
        "> Loaded {} genes across {} samples from {}",
        table.n_genes(),
        table.n_samples(),
        args.expression.display()
    );

    let gold = match &args.gold {
        Some(path) => match load_gold_edges(path) {
            Ok(edges) => {
                eprintln!("> Loaded {} gold edges from {}", edges.len(), path.display());
                Some(edges)
            }
            Err(e) => {
                eprintln!("Error loading gold standard: {e}");
                process::exit(1);
            }
        },
        None => None,
    };

    // --- Phase 2: Infer and score, once per requested method ---
    let split = SplitConfig {
        train_fraction: args.train_fraction,
        seed: args.seed,
    };
    let methods = build_methods(&args, split);
    let multiple_methods = methods.len() > 1;
    for method in methods {
        eprintln!("> Inferring network with method '{}'...", method.name());
        let edges = match predict_network(&table, method.as_ref()) {
            Ok(edges) => edges,
            Err(e) => {
                eprintln!("Fatal error during network inference: {e}");
                process::exit(1);
            }
        };
        eprintln!("> Predicted {} unique edges.", edges.len());

        for edge in &edges {
            println!("{edge}");
        }

        if let Some(path) = &args.output {
            let out_path = per_method_path(path, method.name(), multiple_methods);
            if let Err(e) = write_edges_to_file(&out_path, &edges) {
                eprintln!("Error writing edge list to '{}': {e}", out_path.display());
                process::exit(1);
            }
            eprintln!("> Edge list written to {}", out_path.display());
        }

        if let Some(gold) = &gold {
            let report = score_edges(gold, &edges);
            println!(
                "method={} intersection={} union={} iou={:.6}",
                method.name(),
                report.intersection,
                report.union,
                report.score
            );
        }
    }
}

// ========================================================================================
//                                  HELPER FUNCTIONS
// ========================================================================================

fn build_methods(args: &Args, split: SplitConfig) -> Vec<Box<dyn InferenceMethod>> {
    let lasso = LassoInference {
        penalty: args.penalty,
        split,
    };
    let forest = ForestInference {
        trees: args.trees,
        max_depth: args.max_depth,
        min_samples_leaf: args.min_samples_leaf,
        split,
    };
    match args.method {
        MethodChoice::Lasso => vec![Box::new(lasso)],
        MethodChoice::Forest => vec![Box::new(forest)],
        MethodChoice::Both => vec![Box::new(lasso), Box::new(forest)],
    }
}

/// When several methods run in one invocation, suffix the output path with
/// the method name so the later file does not clobber the earlier one.
fn per_method_path(base: &Path, method_name: &str, multiple_methods: bool) -> PathBuf {
    if !multiple_methods {
        return base.to_path_buf();
    }
    let mut name = base.as_os_str().to_os_string();
    name.push(".");
    name.push(method_name);
    PathBuf::from(name)
}

/// Writes the predicted edges, one `regulator->target` line each.
fn write_edges_to_file(path: &Path, edges: &HashSet<Edge>) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for edge in edges {
        writeln!(writer, "{edge}")?;
    }
    writer.flush()
}
