//! Eligibility oracle.
//!
//! Decides how many more children a leaf may take and which product may be
//! attached under it. A product is eligible for a node when its ID does not
//! already appear on the root-to-node path. Both queries are read-only.

use rand::seq::IndexedRandom;
use rand::Rng;

use crate::models::{BomTree, NodeId, Product};

/// Random draws per pool product before giving up on a pick.
pub const PICK_ATTEMPTS_PER_PRODUCT: usize = 5;

/// Hard cap on random draws for one pick.
pub const MAX_PICK_ATTEMPTS: usize = 2000;

/// Number of additional children `node` may legally receive.
///
/// The minimum of the fan-out room (`max_children` minus current children)
/// and the number of pool products not yet used on the node's path.
/// Pass `usize::MAX` for an unbounded fan-out.
pub fn capacity(tree: &BomTree, node: NodeId, pool_size: usize, max_children: usize) -> usize {
    let by_fan_out = max_children.saturating_sub(tree.child_count(node));
    let by_products = pool_size.saturating_sub(tree.path_product_ids(node).len());
    by_fan_out.min(by_products)
}

/// Random draws allowed for a pool of `pool_size` products.
pub fn pick_attempts(pool_size: usize) -> usize {
    (PICK_ATTEMPTS_PER_PRODUCT * pool_size).min(MAX_PICK_ATTEMPTS)
}

/// Samples a product that is not yet on the root-to-`node` path.
///
/// Draws uniformly with replacement for up to [`pick_attempts`] tries.
/// `None` means no eligible product was found; callers skip the attachment.
pub fn pick_product<'p, R: Rng>(
    tree: &BomTree,
    node: NodeId,
    products: &'p [Product],
    rng: &mut R,
) -> Option<&'p Product> {
    let used = tree.path_product_ids(node);
    (0..pick_attempts(products.len()))
        .find_map(|_| products.choose(rng).filter(|p| !used.contains(&p.id)))
}
