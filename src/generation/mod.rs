//! Tree generators.
//!
//! Two strategies grow a BOM tree from a root under the same rule: a product
//! never appears twice on any root-to-leaf path.
//!
//! - [`FixedShapeGenerator`]: targets a node count with a shape bias
//!   (deep, wide, balanced). Best effort; may stop short of the target.
//! - [`BoundedShapeGenerator`]: reaches the node count exactly with
//!   `[min_children, max_children]` fan-out, falling back to vertical
//!   chains when enabled, or fails.
//!
//! # Usage
//!
//! ```
//! use rand::rngs::SmallRng;
//! use rand::SeedableRng;
//! use u_bomgen::generation::{
//!     create_root, BoundedShapeGenerator, BuildContext, ChildBounds, TreeGenerator,
//! };
//! use u_bomgen::models::{Product, QuantityRange};
//!
//! let products: Vec<Product> = (1..=10).map(|i| Product::new(i, format!("P{i}"))).collect();
//! let generator = BoundedShapeGenerator::new(7, ChildBounds::new(2, 3).unwrap());
//!
//! let mut ctx = BuildContext::new(SmallRng::seed_from_u64(7));
//! let mut tree = create_root(&mut ctx, &products[0], &QuantityRange::default());
//! generator.grow(&mut ctx, &mut tree, &products).unwrap();
//! assert_eq!(tree.len(), 7);
//! ```

mod attach;
mod bounded;
mod context;
mod eligibility;
mod fixed;

pub use attach::{attach, create_root};
pub use bounded::{
    BoundedOutcome, BoundedShapeGenerator, ChildBounds, Phase, VerticalFallback,
    FALLBACK_ATTEMPTS_PER_NODE,
};
pub use context::{BuildContext, IdSequencer};
pub use eligibility::{
    capacity, pick_attempts, pick_product, MAX_PICK_ATTEMPTS, PICK_ATTEMPTS_PER_PRODUCT,
};
pub use fixed::{
    allocate_children, sample_biased_low, select_leaves, trim_to_budget, FixedOutcome,
    FixedShapeGenerator, IterationTrace, Shape, ShapeParams,
};

use std::fmt::Debug;

use rand::Rng;

use crate::error::GenerationError;
use crate::models::{BomTree, Product, QuantityRange};
use crate::validation::TreeExpectations;

/// A strategy that grows an existing tree in place.
///
/// The tree passed to [`grow`](TreeGenerator::grow) already holds its root;
/// `n_total` counts the root.
pub trait TreeGenerator: Debug {
    /// Report produced by a successful build.
    type Outcome: Debug;

    /// Strategy name (e.g., "fixed", "bounded").
    fn name(&self) -> &'static str;

    /// Target node count, root included.
    fn n_total(&self) -> usize;

    /// Quantity triplet used for every node this generator creates.
    fn quantity(&self) -> &QuantityRange;

    /// Grows `tree` using products from `products`.
    fn grow<R: Rng>(
        &self,
        ctx: &mut BuildContext<R>,
        tree: &mut BomTree,
        products: &[Product],
    ) -> Result<Self::Outcome, GenerationError>;

    /// Checks a tree built by this generator must pass.
    fn expectations(&self, outcome: &Self::Outcome) -> TreeExpectations;
}
