//! Fixed-shape generator.
//!
//! Grows a tree towards an exact node count with no per-node fan-out limit.
//! Each iteration selects a set of frontier leaves and a child count for
//! each, both driven by a named [`Shape`].
//!
//! # Algorithm
//!
//! 1. Collect the current leaves.
//! 2. Select leaves to expand (shape policy, capped by the remaining budget);
//!    if nothing is selected, expand one random leaf.
//! 3. Allocate children per selected leaf (shape policy), trimming the
//!    allocation down to the remaining budget.
//! 4. Attach children through the eligibility oracle; a leaf with no eligible
//!    product contributes fewer nodes than allocated.
//! 5. Stop at the target, or as soon as an iteration adds nothing.
//!
//! Unlike the bounded generator this is best effort: a stalled build returns
//! an under-sized tree rather than an error.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{attach, pick_product, BuildContext, TreeGenerator};
use crate::error::{ConfigError, GenerationError};
use crate::models::{BomTree, NodeId, Product, QuantityRange};
use crate::validation::TreeExpectations;

/// Tree shape heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    /// Few leaves per iteration, taken from the deepest level.
    Deep,
    /// Most leaves per iteration, one or two children each.
    Wide,
    /// Half of the leaves per iteration, one child each.
    Balanced,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Deep => "deep",
            Self::Wide => "wide",
            Self::Balanced => "balanced",
        };
        f.write_str(name)
    }
}

impl FromStr for Shape {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deep" => Ok(Self::Deep),
            "wide" => Ok(Self::Wide),
            "balanced" => Ok(Self::Balanced),
            other => Err(ConfigError::UnknownShape(other.to_string())),
        }
    }
}

/// Tuning knobs for the shape policies.
///
/// Fixed-shape batch entries may override any subset of these through a
/// `shape_params` object; missing fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeParams {
    /// Upper bound on leaves expanded per iteration for `deep`.
    pub max_leaves_deep: usize,
    /// Probability of picking the lower bound in `deep` draws.
    pub p_single_deep: f64,
    /// Smallest fraction of leaves expanded per iteration for `wide`.
    pub min_frac_wide: f64,
    /// Largest fraction of leaves expanded per iteration for `wide`.
    pub max_frac_wide: f64,
    /// Upper bound on children per leaf for `deep`.
    pub max_children_deep: usize,
    /// Upper bound on children per leaf for `wide`.
    pub max_children_wide: usize,
    /// Probability of a single child in `wide` draws.
    pub p_single_wide: f64,
}

impl Default for ShapeParams {
    fn default() -> Self {
        Self {
            max_leaves_deep: 3,
            p_single_deep: 0.75,
            min_frac_wide: 0.7,
            max_frac_wide: 1.0,
            max_children_deep: 3,
            max_children_wide: 2,
            p_single_wide: 0.7,
        }
    }
}

impl ShapeParams {
    /// Rejects probabilities or fractions outside `[0, 1]`, an inverted wide
    /// fraction range, and zero leaf or child limits.
    pub fn check(&self) -> Result<(), ConfigError> {
        let unit = |p: f64| (0.0..=1.0).contains(&p);
        if !unit(self.p_single_deep) || !unit(self.p_single_wide) {
            return Err(ConfigError::InvalidShapeParams(
                "p_single_deep and p_single_wide must lie in [0, 1]".into(),
            ));
        }
        if !unit(self.min_frac_wide)
            || !unit(self.max_frac_wide)
            || self.min_frac_wide > self.max_frac_wide
        {
            return Err(ConfigError::InvalidShapeParams(format!(
                "wide fraction range [{}, {}] is not within [0, 1]",
                self.min_frac_wide, self.max_frac_wide
            )));
        }
        if self.max_leaves_deep == 0 || self.max_children_deep == 0 || self.max_children_wide == 0 {
            return Err(ConfigError::InvalidShapeParams(
                "leaf and child limits must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

/// What happened in one growth iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationTrace {
    /// Node budget left at the start of the iteration.
    pub remaining: usize,
    /// Leaves present at the start of the iteration.
    pub leaves_available: usize,
    /// Leaves chosen for expansion.
    pub leaves_selected: usize,
    /// Children allocated after trimming.
    pub nodes_allocated: usize,
    /// Children actually attached.
    pub nodes_added: usize,
}

/// Result of a fixed-shape build.
#[derive(Debug, Clone, Default)]
pub struct FixedOutcome {
    /// Per-iteration traces.
    pub iterations: Vec<IterationTrace>,
    /// Nodes added by the generator (root excluded).
    pub nodes_added: usize,
    /// Whether the tree reached `n_total`.
    pub reached_target: bool,
}

/// Builds trees with an exact node count under a shape heuristic.
///
/// # Example
/// ```
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
/// use u_bomgen::generation::{create_root, BuildContext, FixedShapeGenerator, Shape};
/// use u_bomgen::models::{Product, QuantityRange};
///
/// let products: Vec<Product> = (1..=20).map(|i| Product::new(i, format!("P{i}"))).collect();
/// let mut ctx = BuildContext::new(StdRng::seed_from_u64(1));
/// let mut tree = create_root(&mut ctx, &products[0], &QuantityRange::default());
///
/// let outcome = FixedShapeGenerator::new(12, Shape::Balanced)
///     .generate(&mut ctx, &mut tree, &products);
/// assert!(outcome.reached_target);
/// assert_eq!(tree.len(), 12);
/// ```
#[derive(Debug, Clone)]
pub struct FixedShapeGenerator {
    n_total: usize,
    shape: Shape,
    quantity: QuantityRange,
    params: ShapeParams,
}

impl FixedShapeGenerator {
    /// Creates a generator for `n_total` nodes (root included).
    ///
    /// # Panics
    /// Panics if `n_total == 0`.
    pub fn new(n_total: usize, shape: Shape) -> Self {
        assert!(n_total >= 1, "n_total must be >= 1");
        Self {
            n_total,
            shape,
            quantity: QuantityRange::default(),
            params: ShapeParams::default(),
        }
    }

    /// Sets the quantity triplet used for attached nodes.
    pub fn with_quantity(mut self, quantity: QuantityRange) -> Self {
        self.quantity = quantity;
        self
    }

    /// Overrides the shape tuning parameters.
    pub fn with_params(mut self, params: ShapeParams) -> Self {
        self.params = params;
        self
    }

    /// Target node count.
    pub fn n_total(&self) -> usize {
        self.n_total
    }

    /// Shape heuristic.
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Shape tuning parameters.
    pub fn params(&self) -> &ShapeParams {
        &self.params
    }

    /// Grows `tree` towards `n_total` nodes.
    pub fn generate<R: Rng>(
        &self,
        ctx: &mut BuildContext<R>,
        tree: &mut BomTree,
        products: &[Product],
    ) -> FixedOutcome {
        let mut outcome = FixedOutcome::default();
        let mut count = tree.len();

        while count < self.n_total {
            let remaining = self.n_total - count;
            let leaves = tree.leaves();

            let mut selected =
                select_leaves(tree, &leaves, self.shape, remaining, &self.params, ctx.rng());
            if selected.is_empty() {
                match leaves.choose(ctx.rng()) {
                    Some(&leaf) => selected.push(leaf),
                    None => break,
                }
            }

            let allocation =
                allocate_children(tree, &selected, remaining, self.shape, &self.params, ctx.rng());
            let allocated: usize = allocation.iter().sum();
            if allocated == 0 {
                break;
            }

            let mut added = 0;
            'attach: for (&leaf, &n_children) in selected.iter().zip(&allocation) {
                for _ in 0..n_children {
                    let Some(product) = pick_product(tree, leaf, products, ctx.rng()) else {
                        continue;
                    };
                    attach(ctx, tree, leaf, product, &self.quantity);
                    count += 1;
                    added += 1;
                    if count >= self.n_total {
                        break 'attach;
                    }
                }
            }

            trace!(
                remaining,
                leaves = leaves.len(),
                selected = selected.len(),
                allocated,
                added,
                "fixed-shape iteration"
            );
            outcome.iterations.push(IterationTrace {
                remaining,
                leaves_available: leaves.len(),
                leaves_selected: selected.len(),
                nodes_allocated: allocated,
                nodes_added: added,
            });
            outcome.nodes_added += added;

            if added == 0 {
                debug!(
                    shape = %self.shape,
                    count,
                    n_total = self.n_total,
                    "no eligible products left on the frontier, stopping early"
                );
                break;
            }
        }

        outcome.reached_target = count >= self.n_total;
        outcome
    }
}

impl TreeGenerator for FixedShapeGenerator {
    type Outcome = FixedOutcome;

    fn name(&self) -> &'static str {
        "fixed"
    }

    fn n_total(&self) -> usize {
        self.n_total
    }

    fn quantity(&self) -> &QuantityRange {
        &self.quantity
    }

    fn grow<R: Rng>(
        &self,
        ctx: &mut BuildContext<R>,
        tree: &mut BomTree,
        products: &[Product],
    ) -> Result<FixedOutcome, GenerationError> {
        Ok(self.generate(ctx, tree, products))
    }

    fn expectations(&self, _outcome: &FixedOutcome) -> TreeExpectations {
        TreeExpectations::new().with_quantity(self.quantity)
    }
}

/// Returns `lo` with probability `p_single`, otherwise a uniform draw from
/// `lo..=hi`.
pub fn sample_biased_low<R: Rng>(rng: &mut R, lo: usize, hi: usize, p_single: f64) -> usize {
    if lo >= hi {
        return lo;
    }
    if rng.random::<f64>() < p_single {
        lo
    } else {
        rng.random_range(lo..=hi)
    }
}

/// Chooses the leaves to expand in one iteration.
///
/// - `deep`: 1..=`max_leaves_deep` leaves (biased to 1), deepest first,
///   ties shuffled.
/// - `wide`: a random fraction in `[min_frac_wide, max_frac_wide]` of the
///   leaves, at least one.
/// - `balanced`: `ceil(leaves / 2)` random leaves.
///
/// Every policy is capped by `remaining`.
pub fn select_leaves<R: Rng>(
    tree: &BomTree,
    leaves: &[NodeId],
    shape: Shape,
    remaining: usize,
    params: &ShapeParams,
    rng: &mut R,
) -> Vec<NodeId> {
    if leaves.is_empty() || remaining == 0 {
        return Vec::new();
    }

    match shape {
        Shape::Deep => {
            let cap = params
                .max_leaves_deep
                .min(leaves.len())
                .min(remaining)
                .max(1);
            let target = sample_biased_low(rng, 1, cap, params.p_single_deep);

            let mut by_depth: BTreeMap<usize, Vec<NodeId>> = BTreeMap::new();
            for &leaf in leaves {
                by_depth.entry(tree.node(leaf).depth).or_default().push(leaf);
            }

            let mut picked = Vec::with_capacity(target);
            for group in by_depth.values_mut().rev() {
                group.shuffle(rng);
                for &leaf in group.iter() {
                    picked.push(leaf);
                    if picked.len() >= target {
                        return picked;
                    }
                }
            }
            picked
        }
        Shape::Wide => {
            let frac = rng.random_range(params.min_frac_wide..=params.max_frac_wide);
            let target = ((frac * leaves.len() as f64).round() as usize)
                .max(1)
                .min(leaves.len())
                .min(remaining);
            let mut shuffled = leaves.to_vec();
            shuffled.shuffle(rng);
            shuffled.truncate(target);
            shuffled
        }
        Shape::Balanced => {
            let target = leaves.len().div_ceil(2).max(1).min(remaining);
            let mut shuffled = leaves.to_vec();
            shuffled.shuffle(rng);
            shuffled.truncate(target);
            shuffled
        }
    }
}

/// Chooses a child count for each selected leaf, trimmed to `remaining`
/// with [`trim_to_budget`].
pub fn allocate_children<R: Rng>(
    tree: &BomTree,
    selected: &[NodeId],
    remaining: usize,
    shape: Shape,
    params: &ShapeParams,
    rng: &mut R,
) -> Vec<usize> {
    if selected.is_empty() || remaining == 0 {
        return Vec::new();
    }

    let mut allocation: Vec<usize> = match shape {
        Shape::Deep => selected
            .iter()
            .map(|_| sample_biased_low(rng, 1, params.max_children_deep, params.p_single_deep))
            .collect(),
        Shape::Wide => selected
            .iter()
            .map(|_| sample_biased_low(rng, 1, params.max_children_wide, params.p_single_wide))
            .collect(),
        Shape::Balanced => vec![1; selected.len()],
    };

    trim_to_budget(tree, selected, &mut allocation, remaining, shape);
    allocation
}

/// Cuts `allocation` down so it sums to at most `remaining`.
///
/// First pass reduces entries to 1 (deepest leaves first for `wide`, from
/// the back otherwise); second pass decrements front to back, skipping
/// entries already at 0.
pub fn trim_to_budget(
    tree: &BomTree,
    selected: &[NodeId],
    allocation: &mut [usize],
    remaining: usize,
    shape: Shape,
) {
    let total: usize = allocation.iter().sum();
    if total <= remaining {
        return;
    }

    let mut to_cut = total - remaining;
    let order: Vec<usize> = match shape {
        Shape::Wide => {
            let mut idx: Vec<usize> = (0..selected.len()).collect();
            idx.sort_by_key(|&i| Reverse(tree.node(selected[i]).depth));
            idx
        }
        _ => (0..selected.len()).rev().collect(),
    };

    for i in order {
        if to_cut == 0 {
            break;
        }
        let cut = allocation[i].saturating_sub(1).min(to_cut);
        allocation[i] -= cut;
        to_cut -= cut;
    }

    for slot in allocation.iter_mut() {
        if to_cut == 0 {
            break;
        }
        if *slot > 0 {
            *slot -= 1;
            to_cut -= 1;
        }
    }
}
