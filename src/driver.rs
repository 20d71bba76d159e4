//! Tree assembly driver.
//!
//! Turns batch entries into files: loads the product pool, creates a run
//! folder, and for every output builds `k_trees` trees. Each tree gets a
//! fresh [`BuildContext`], a root drawn uniformly from the pool, and a
//! sanity check before export. A tree that fails to build, validate or
//! export is logged and counted; the remaining trees proceed.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tracing::{error, info, warn};

use crate::config::{load_products, BatchConfig, BatchSettings, OutputSpec};
use crate::error::{GenerationError, RunError};
use crate::export::{write_outputs, ExportPaths};
use crate::generation::{create_root, BuildContext, TreeGenerator};
use crate::models::{BomTree, Product, ProductRegistry};
use crate::validation::{validate_products, validate_tree, ValidationErrorKind};

/// A tree together with the registry and report of its build.
#[derive(Debug, Clone)]
pub struct BuiltTree<O> {
    /// The tree.
    pub tree: BomTree,
    /// Products and machines used by the build.
    pub registry: ProductRegistry,
    /// Generator report.
    pub outcome: O,
}

/// What one batch entry produced.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Run folder holding the outputs.
    pub run_dir: PathBuf,
    /// Files written, one set per exported tree.
    pub written: Vec<ExportPaths>,
    /// Trees that failed to build, validate or export.
    pub failed: usize,
    /// Exported trees smaller than requested (fixed-shape only).
    pub undersized: usize,
}

/// Builds one tree: picks the root uniformly from `products`, then lets
/// `generator` grow it.
pub fn build_tree<G, R>(
    generator: &G,
    products: &[Product],
    rng: R,
) -> Result<BuiltTree<G::Outcome>, GenerationError>
where
    G: TreeGenerator,
    R: Rng,
{
    let mut ctx = BuildContext::new(rng);
    let root_product = products
        .choose(ctx.rng())
        .ok_or(GenerationError::EmptyProductPool)?;

    let mut tree = create_root(&mut ctx, root_product, generator.quantity());
    let outcome = generator.grow(&mut ctx, &mut tree, products)?;

    Ok(BuiltTree {
        tree,
        registry: ctx.into_registry(),
        outcome,
    })
}

/// Random source for tree `tree_idx` of output `output_idx`.
///
/// With a seed the stream is reproducible and distinct per tree; without one
/// it is drawn from OS entropy.
pub fn tree_rng(seed: Option<u64>, output_idx: usize, tree_idx: usize) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ ((output_idx as u64) << 32) ^ tree_idx as u64),
        None => StdRng::from_os_rng(),
    }
}

/// Creates `<base>/run_<YYYYmmdd_HHMMSS>`, or `..._01`, `..._02`, ... if the
/// name is taken.
pub fn create_run_folder(base: &Path) -> std::io::Result<PathBuf> {
    fs::create_dir_all(base)?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

    let candidate = base.join(format!("run_{stamp}"));
    if !candidate.exists() {
        fs::create_dir_all(&candidate)?;
        return Ok(candidate);
    }

    let mut suffix = 1u32;
    loop {
        let candidate = base.join(format!("run_{stamp}_{suffix:02}"));
        if !candidate.exists() {
            fs::create_dir_all(&candidate)?;
            return Ok(candidate);
        }
        suffix += 1;
    }
}

/// Runs every fixed-shape entry of `config`. Entry-level failures are
/// logged; the returned summaries cover the entries that ran.
pub fn run_fixed(config: &BatchConfig) -> Vec<RunSummary> {
    config
        .fixed
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let result = run_entry(&entry.batch, "fixed", |output| entry.generator(output));
            log_entry_result(index, "fixed", result)
        })
        .collect()
}

/// Runs every bounded-shape entry of `config`.
pub fn run_bounded(config: &BatchConfig) -> Vec<RunSummary> {
    config
        .bounded
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let result = run_entry(&entry.batch, "bounded", |output| entry.generator(output));
            log_entry_result(index, "bounded", result)
        })
        .collect()
}

fn log_entry_result(
    index: usize,
    kind: &str,
    result: Result<RunSummary, RunError>,
) -> Option<RunSummary> {
    match result {
        Ok(summary) => Some(summary),
        Err(err) => {
            error!(kind, index, %err, "batch entry aborted");
            None
        }
    }
}

/// Loads the pool and creates the run folder for one entry, then builds and
/// exports its trees with [`run_outputs`].
pub fn run_entry<G, F>(
    settings: &BatchSettings,
    kind: &str,
    make_generator: F,
) -> Result<RunSummary, RunError>
where
    G: TreeGenerator,
    F: Fn(&OutputSpec) -> G,
{
    let products = load_products(&settings.products_source)?;
    if let Err(errors) = validate_products(&products) {
        for e in &errors {
            warn!(kind, message = %e.message, "product pool issue");
        }
        if errors.iter().any(|e| e.kind == ValidationErrorKind::EmptyPool) {
            return Err(GenerationError::EmptyProductPool.into());
        }
    }

    let run_dir =
        create_run_folder(&settings.output_root).map_err(|source| RunError::RunFolder {
            path: settings.output_root.clone(),
            source,
        })?;
    info!(kind, run_dir = %run_dir.display(), "run output folder");

    Ok(run_outputs(settings, &products, &run_dir, kind, make_generator))
}

/// Builds and exports `k_trees` trees per output into `run_dir`.
pub fn run_outputs<G, F>(
    settings: &BatchSettings,
    products: &[Product],
    run_dir: &Path,
    kind: &str,
    make_generator: F,
) -> RunSummary
where
    G: TreeGenerator,
    F: Fn(&OutputSpec) -> G,
{
    let mut summary = RunSummary {
        run_dir: run_dir.to_path_buf(),
        ..RunSummary::default()
    };

    for (output_idx, output) in settings.outputs.iter().enumerate() {
        let generator = make_generator(output);
        let stem = Path::new(&output.output_file)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("bom_{}", generator.name()));

        for idx in 1..=settings.k_trees {
            let rng = tree_rng(settings.seed, output_idx, idx);
            let built = match build_tree(&generator, products, rng) {
                Ok(built) => built,
                Err(err) => {
                    warn!(kind, output = %output.output_file, idx, %err, "tree skipped");
                    summary.failed += 1;
                    continue;
                }
            };

            let expectations = generator.expectations(&built.outcome);
            if let Err(violations) = validate_tree(&built.tree, &expectations) {
                for v in &violations {
                    error!(
                        kind,
                        idx,
                        check = ?v.kind,
                        message = %v.message,
                        "tree failed sanity check"
                    );
                }
                summary.failed += 1;
                continue;
            }

            if built.tree.len() < generator.n_total() {
                warn!(
                    kind,
                    idx,
                    nodes = built.tree.len(),
                    n_total = generator.n_total(),
                    "tree stopped short of the target"
                );
                summary.undersized += 1;
            }

            let name = format!("{stem}_{idx}");
            match write_outputs(&built.tree, &built.registry, run_dir, &name) {
                Ok(paths) => {
                    info!(kind, path = %paths.json.display(), nodes = built.tree.len(), "exported");
                    summary.written.push(paths);
                }
                Err(err) => {
                    warn!(kind, name = %name, %err, "tree not exported");
                    summary.failed += 1;
                }
            }
        }
    }

    summary
}
