//! Bounded-shape generator.
//!
//! Builds a tree with exactly `n_total` nodes where every node expanded by
//! n-ary growth receives between `min_children` and `max_children` children.
//!
//! # Algorithm
//!
//! **Phase A (n-ary growth).** While nodes remain:
//! 1. Keep the leaves whose capacity is at least `min_children`.
//! 2. Pick up to `remaining / min_children` of them at random.
//! 3. Give each `min_children`, then hand out the leftover budget one child
//!    at a time, round-robin in random order, up to each leaf's capacity.
//! 4. Attach; stop the phase if nothing eligible is left or nothing was added.
//!
//! **Phase B (vertical chains).** If nodes still remain and fallback is
//! enabled, repeatedly pick a leaf with capacity >= 1 and hang a chain of
//! `min(remaining, U[min_depth, max_depth])` single-child nodes under it.
//! Only the minimum-children rule is relaxed; `max_children` and path
//! uniqueness still hold.
//!
//! The build either reaches `n_total` exactly or fails with
//! [`GenerationError::InfeasibleTarget`].

use std::collections::BTreeSet;

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use tracing::debug;

use super::{attach, capacity, pick_product, BuildContext, TreeGenerator};
use crate::error::{ConfigError, GenerationError, InfeasibleReason};
use crate::models::{BomTree, NodeId, Product, QuantityRange};
use crate::validation::TreeExpectations;

/// Phase-B attempts allowed per node still missing when the phase starts.
pub const FALLBACK_ATTEMPTS_PER_NODE: usize = 5;

/// Inclusive `[min, max]` bound on children per expanded node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildBounds {
    min: usize,
    max: usize,
}

impl ChildBounds {
    /// Creates bounds, rejecting `min > max`.
    pub fn new(min: usize, max: usize) -> Result<Self, ConfigError> {
        if min > max {
            return Err(ConfigError::InvalidBounds {
                min: saturating_i64(min),
                max: saturating_i64(max),
            });
        }
        Ok(Self { min, max })
    }

    /// Minimum children per expanded node.
    pub fn min(&self) -> usize {
        self.min
    }

    /// Maximum children per node.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Whether `count` lies within the bounds.
    pub fn contains(&self, count: usize) -> bool {
        (self.min..=self.max).contains(&count)
    }
}

/// Vertical-chain fallback settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerticalFallback {
    enabled: bool,
    min_depth: usize,
    max_depth: usize,
}

impl VerticalFallback {
    /// Fallback turned off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            min_depth: 1,
            max_depth: 1,
        }
    }

    /// Fallback with chain lengths drawn from `min_depth..=max_depth`.
    pub fn enabled(min_depth: usize, max_depth: usize) -> Result<Self, ConfigError> {
        if min_depth < 1 || max_depth < min_depth {
            return Err(ConfigError::InvalidFallbackDepth {
                min: saturating_i64(min_depth),
                max: saturating_i64(max_depth),
            });
        }
        Ok(Self {
            enabled: true,
            min_depth,
            max_depth,
        })
    }

    /// Whether chains may be grown.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Shortest chain drawn.
    pub fn min_depth(&self) -> usize {
        self.min_depth
    }

    /// Longest chain drawn.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl Default for VerticalFallback {
    fn default() -> Self {
        Self::disabled()
    }
}

fn saturating_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Build phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// n-ary growth under the child bounds.
    NaryGrowth,
    /// Vertical-chain fallback.
    VerticalFallback,
    /// Target reached.
    Done,
    /// Target unreachable.
    Failed,
}

/// Result of a successful bounded build.
#[derive(Debug, Clone)]
pub struct BoundedOutcome {
    /// Phase in which the target was reached.
    pub completed_in: Phase,
    /// Phase-A iterations run.
    pub growth_iterations: usize,
    /// Nodes attached in Phase A.
    pub growth_nodes: usize,
    /// Nodes attached in Phase B.
    pub fallback_nodes: usize,
    /// Non-empty chains grown in Phase B.
    pub chains: usize,
    /// Nodes that received children in Phase B (exempt from the minimum).
    pub extended_by_fallback: BTreeSet<NodeId>,
}

impl Default for BoundedOutcome {
    fn default() -> Self {
        Self {
            completed_in: Phase::NaryGrowth,
            growth_iterations: 0,
            growth_nodes: 0,
            fallback_nodes: 0,
            chains: 0,
            extended_by_fallback: BTreeSet::new(),
        }
    }
}

/// Builds trees with an exact node count and bounded fan-out.
#[derive(Debug, Clone)]
pub struct BoundedShapeGenerator {
    n_total: usize,
    bounds: ChildBounds,
    quantity: QuantityRange,
    fallback: VerticalFallback,
}

impl BoundedShapeGenerator {
    /// Creates a generator for `n_total` nodes (root included).
    ///
    /// # Panics
    /// Panics if `n_total == 0`.
    pub fn new(n_total: usize, bounds: ChildBounds) -> Self {
        assert!(n_total >= 1, "n_total must be >= 1");
        Self {
            n_total,
            bounds,
            quantity: QuantityRange::default(),
            fallback: VerticalFallback::disabled(),
        }
    }

    /// Sets the quantity triplet used for attached nodes.
    pub fn with_quantity(mut self, quantity: QuantityRange) -> Self {
        self.quantity = quantity;
        self
    }

    /// Sets the vertical fallback.
    pub fn with_fallback(mut self, fallback: VerticalFallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Target node count.
    pub fn n_total(&self) -> usize {
        self.n_total
    }

    /// Children bounds.
    pub fn bounds(&self) -> ChildBounds {
        self.bounds
    }

    /// Vertical fallback settings.
    pub fn fallback(&self) -> VerticalFallback {
        self.fallback
    }

    /// Grows `tree` to exactly `n_total` nodes.
    pub fn generate<R: Rng>(
        &self,
        ctx: &mut BuildContext<R>,
        tree: &mut BomTree,
        products: &[Product],
    ) -> Result<BoundedOutcome, GenerationError> {
        let mut outcome = BoundedOutcome::default();
        let mut remaining = self.n_total.saturating_sub(tree.len());

        self.grow_nary(ctx, tree, products, &mut remaining, &mut outcome);
        if remaining == 0 {
            outcome.completed_in = Phase::NaryGrowth;
            debug!(
                n_total = self.n_total,
                phase = ?Phase::Done,
                iterations = outcome.growth_iterations,
                "bounded build complete"
            );
            return Ok(outcome);
        }

        if !self.fallback.is_enabled() {
            debug!(remaining, phase = ?Phase::Failed, "n-ary growth stalled, fallback disabled");
            return Err(self.infeasible(remaining, InfeasibleReason::FallbackDisabled));
        }

        debug!(remaining, phase = ?Phase::VerticalFallback, "switching to vertical chains");
        self.grow_chains(ctx, tree, products, &mut remaining, &mut outcome);
        if remaining > 0 {
            debug!(remaining, phase = ?Phase::Failed, "vertical chains exhausted");
            return Err(self.infeasible(remaining, InfeasibleReason::FallbackExhausted));
        }

        outcome.completed_in = Phase::VerticalFallback;
        debug!(
            n_total = self.n_total,
            phase = ?Phase::Done,
            chains = outcome.chains,
            "bounded build complete"
        );
        Ok(outcome)
    }

    /// Phase A. A `min_children` of 0 is treated as 1 so every selected
    /// leaf grows and the leaf budget stays finite.
    fn grow_nary<R: Rng>(
        &self,
        ctx: &mut BuildContext<R>,
        tree: &mut BomTree,
        products: &[Product],
        remaining: &mut usize,
        outcome: &mut BoundedOutcome,
    ) {
        let pool = products.len();
        let floor = self.bounds.min().max(1);
        let max = self.bounds.max();

        while *remaining > 0 {
            let mut eligible: Vec<NodeId> = tree
                .leaves()
                .into_iter()
                .filter(|&leaf| capacity(tree, leaf, pool, max) >= floor)
                .collect();
            if eligible.is_empty() {
                debug!(remaining = *remaining, "no leaf can take the minimum children");
                break;
            }

            let leaf_budget = *remaining / floor;
            if leaf_budget == 0 {
                debug!(remaining = *remaining, "budget below the minimum children");
                break;
            }

            eligible.shuffle(ctx.rng());
            eligible.truncate(leaf_budget);
            let allocation = self.allocate(tree, &eligible, *remaining, pool, ctx.rng());

            let mut added = 0;
            'attach: for (leaf, n_children) in allocation {
                for _ in 0..n_children {
                    let Some(product) = pick_product(tree, leaf, products, ctx.rng()) else {
                        continue;
                    };
                    attach(ctx, tree, leaf, product, &self.quantity);
                    *remaining -= 1;
                    added += 1;
                    if *remaining == 0 {
                        break 'attach;
                    }
                }
            }

            outcome.growth_iterations += 1;
            outcome.growth_nodes += added;
            if added == 0 {
                break;
            }
        }
    }

    /// Gives each selected leaf the minimum, then spreads the leftover
    /// budget round-robin (random order) up to each leaf's capacity.
    fn allocate<R: Rng>(
        &self,
        tree: &BomTree,
        selected: &[NodeId],
        remaining: usize,
        pool: usize,
        rng: &mut R,
    ) -> Vec<(NodeId, usize)> {
        let floor = self.bounds.min().max(1);
        let mut allocation: Vec<(NodeId, usize)> =
            selected.iter().map(|&leaf| (leaf, floor)).collect();

        let leftover = remaining.saturating_sub(selected.len() * floor);
        let mut extra_room: Vec<usize> = selected
            .iter()
            .map(|&leaf| capacity(tree, leaf, pool, self.bounds.max()).saturating_sub(floor))
            .collect();
        let mut budget = leftover.min(extra_room.iter().sum());

        let mut order: Vec<usize> = (0..selected.len()).collect();
        order.shuffle(rng);
        let mut cursor = 0;
        while budget > 0 {
            let slot = order[cursor % order.len()];
            if extra_room[slot] > 0 {
                allocation[slot].1 += 1;
                extra_room[slot] -= 1;
                budget -= 1;
            }
            cursor += 1;
        }

        allocation
    }

    /// Phase B.
    fn grow_chains<R: Rng>(
        &self,
        ctx: &mut BuildContext<R>,
        tree: &mut BomTree,
        products: &[Product],
        remaining: &mut usize,
        outcome: &mut BoundedOutcome,
    ) {
        let pool = products.len();
        let max = self.bounds.max();
        let max_attempts = FALLBACK_ATTEMPTS_PER_NODE * *remaining;

        for _ in 0..max_attempts {
            if *remaining == 0 {
                break;
            }

            let starts: Vec<NodeId> = tree
                .leaves()
                .into_iter()
                .filter(|&leaf| capacity(tree, leaf, pool, max) >= 1)
                .collect();
            let Some(&start) = starts.choose(ctx.rng()) else {
                debug!(remaining = *remaining, "no leaf can start a chain");
                break;
            };

            let drawn = ctx
                .rng()
                .random_range(self.fallback.min_depth()..=self.fallback.max_depth());
            let chain_len = drawn.min(*remaining);

            let mut current = start;
            let mut steps = 0;
            while steps < chain_len && *remaining > 0 {
                if capacity(tree, current, pool, max) < 1 {
                    break;
                }
                let Some(product) = pick_product(tree, current, products, ctx.rng()) else {
                    break;
                };
                let child = attach(ctx, tree, current, product, &self.quantity);
                outcome.extended_by_fallback.insert(current);
                current = child;
                *remaining -= 1;
                steps += 1;
            }

            if steps > 0 {
                outcome.chains += 1;
                outcome.fallback_nodes += steps;
            }
        }
    }

    fn infeasible(&self, remaining: usize, reason: InfeasibleReason) -> GenerationError {
        GenerationError::InfeasibleTarget {
            n_total: self.n_total,
            remaining,
            reason,
        }
    }
}

impl TreeGenerator for BoundedShapeGenerator {
    type Outcome = BoundedOutcome;

    fn name(&self) -> &'static str {
        "bounded"
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
    ) -> Result<BoundedOutcome, GenerationError> {
        self.generate(ctx, tree, products)
    }

    fn expectations(&self, outcome: &BoundedOutcome) -> TreeExpectations {
        TreeExpectations::new()
            .with_node_count(self.n_total)
            .with_quantity(self.quantity)
            .with_child_bounds(self.bounds, outcome.extended_by_fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::create_root;
    use crate::validation::validate_tree;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn pool(n: u32) -> Vec<Product> {
        (1..=n).map(|i| Product::new(i, format!("P{i}"))).collect()
    }

    fn run(
        generator: &BoundedShapeGenerator,
        products: &[Product],
        seed: u64,
    ) -> (BomTree, Result<BoundedOutcome, GenerationError>) {
        let mut ctx = BuildContext::new(SmallRng::seed_from_u64(seed));
        let mut tree = create_root(&mut ctx, &products[0], &QuantityRange::default());
        let result = generator.generate(&mut ctx, &mut tree, products);
        (tree, result)
    }

    #[test]
    fn test_bounds_validation() {
        assert!(ChildBounds::new(2, 3).is_ok());
        assert!(ChildBounds::new(0, 0).is_ok());
        assert!(matches!(
            ChildBounds::new(4, 3),
            Err(ConfigError::InvalidBounds { min: 4, max: 3 })
        ));
        assert!(ChildBounds::new(2, 3).unwrap().contains(3));
        assert!(!ChildBounds::new(2, 3).unwrap().contains(1));
    }

    #[test]
    fn test_fallback_validation() {
        assert!(!VerticalFallback::default().is_enabled());
        assert!(VerticalFallback::enabled(1, 4).unwrap().is_enabled());
        assert!(VerticalFallback::enabled(0, 4).is_err());
        assert!(VerticalFallback::enabled(3, 2).is_err());
    }

    #[test]
    fn test_huge_bounds_saturate_in_errors() {
        assert!(matches!(
            ChildBounds::new(usize::MAX, 1),
            Err(ConfigError::InvalidBounds { min: i64::MAX, .. })
        ));
        assert!(matches!(
            VerticalFallback::enabled(usize::MAX, 2),
            Err(ConfigError::InvalidFallbackDepth { min: i64::MAX, .. })
        ));
    }

    #[test]
    fn test_growth_without_fallback_hits_exact_count() {
        crate::logging::init_test();
        let products = pool(10);
        let generator = BoundedShapeGenerator::new(7, ChildBounds::new(2, 3).unwrap());

        for seed in 0..25 {
            let (tree, result) = run(&generator, &products, seed);
            let outcome = result.unwrap();
            assert_eq!(tree.len(), 7);
            assert_eq!(outcome.completed_in, Phase::NaryGrowth);
            assert_eq!(outcome.fallback_nodes, 0);
            assert!(validate_tree(&tree, &generator.expectations(&outcome)).is_ok());
        }
    }

    #[test]
    fn test_tiny_pool_without_fallback_is_infeasible() {
        crate::logging::init_test();
        let products = pool(2);
        let generator = BoundedShapeGenerator::new(7, ChildBounds::new(3, 3).unwrap());

        let (tree, result) = run(&generator, &products, 1);
        match result {
            Err(GenerationError::InfeasibleTarget {
                n_total,
                remaining,
                reason,
            }) => {
                assert_eq!(n_total, 7);
                assert_eq!(remaining, 6);
                assert_eq!(reason, InfeasibleReason::FallbackDisabled);
            }
            other => panic!("expected infeasible target, got {other:?}"),
        }
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_fallback_chains_fill_remaining() {
        crate::logging::init_test();
        // Root takes 3 children, after which no leaf has room for 3 more
        // distinct products; chains must supply the last 3 nodes.
        let products = pool(4);
        let generator = BoundedShapeGenerator::new(7, ChildBounds::new(3, 3).unwrap())
            .with_fallback(VerticalFallback::enabled(1, 4).unwrap());

        for seed in 0..25 {
            let (tree, result) = run(&generator, &products, seed);
            let outcome = result.unwrap();
            assert_eq!(tree.len(), 7);
            assert_eq!(outcome.completed_in, Phase::VerticalFallback);
            assert_eq!(outcome.growth_nodes, 3);
            assert_eq!(outcome.fallback_nodes, 3);
            assert!(outcome.chains >= 1);
            assert!(validate_tree(&tree, &generator.expectations(&outcome)).is_ok());
        }
    }

    #[test]
    fn test_fallback_cannot_beat_path_uniqueness() {
        let products = pool(2);
        let generator = BoundedShapeGenerator::new(7, ChildBounds::new(3, 3).unwrap())
            .with_fallback(VerticalFallback::enabled(1, 4).unwrap());

        let (tree, result) = run(&generator, &products, 3);
        assert!(matches!(
            result,
            Err(GenerationError::InfeasibleTarget {
                reason: InfeasibleReason::FallbackExhausted,
                ..
            })
        ));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_fallback_respects_max_children() {
        let products = pool(8);
        let generator = BoundedShapeGenerator::new(6, ChildBounds::new(2, 2).unwrap())
            .with_fallback(VerticalFallback::enabled(2, 3).unwrap());
        let (tree, result) = run(&generator, &products, 9);
        let outcome = result.unwrap();

        assert_eq!(tree.len(), 6);
        for (id, _) in tree.iter() {
            assert!(tree.child_count(id) <= 2);
        }
        assert!(validate_tree(&tree, &generator.expectations(&outcome)).is_ok());

        // max_children = 1 forces a single chain from the root.
        let single = BoundedShapeGenerator::new(5, ChildBounds::new(1, 1).unwrap());
        let (chain, result) = run(&single, &products, 2);
        assert!(result.is_ok());
        assert_eq!(chain.max_depth(), 4);
    }

    #[test]
    fn test_zero_minimum_children() {
        let products = pool(12);
        let generator = BoundedShapeGenerator::new(9, ChildBounds::new(0, 2).unwrap());
        for seed in 0..10 {
            let (tree, result) = run(&generator, &products, seed);
            let outcome = result.unwrap();
            assert_eq!(tree.len(), 9);
            assert!(validate_tree(&tree, &generator.expectations(&outcome)).is_ok());
        }
    }

    #[test]
    fn test_larger_trees_respect_bounds() {
        let products = pool(30);
        let generator = BoundedShapeGenerator::new(60, ChildBounds::new(2, 4).unwrap())
            .with_quantity(QuantityRange::new(1, 1, 1))
            .with_fallback(VerticalFallback::enabled(1, 3).unwrap());

        for seed in 0..10 {
            let (tree, result) = run(&generator, &products, seed);
            let outcome = result.unwrap();
            assert_eq!(tree.len(), 60);
            let report = validate_tree(&tree, &generator.expectations(&outcome));
            assert!(report.is_ok(), "seed {seed}: {report:?}");
        }
    }

    #[test]
    fn test_single_node_target_is_immediate() {
        let products = pool(3);
        let generator = BoundedShapeGenerator::new(1, ChildBounds::new(2, 3).unwrap());
        let (tree, result) = run(&generator, &products, 0);
        assert_eq!(result.unwrap().growth_iterations, 0);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_allocation_floor_and_extras() {
        let products = pool(10);
        let mut ctx = BuildContext::new(SmallRng::seed_from_u64(0));
        let tree = create_root(&mut ctx, &products[0], &QuantityRange::default());
        let generator = BoundedShapeGenerator::new(7, ChildBounds::new(2, 3).unwrap());

        let alloc = generator.allocate(&tree, &[tree.root()], 6, products.len(), ctx.rng());
        assert_eq!(alloc, vec![(tree.root(), 3)]);

        let alloc = generator.allocate(&tree, &[tree.root()], 2, products.len(), ctx.rng());
        assert_eq!(alloc, vec![(tree.root(), 2)]);
    }
}
