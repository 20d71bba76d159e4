//! Attachment operation and root creation.
//!
//! Attachment assumes eligibility was already established by the oracle and
//! does not re-check path uniqueness.

use rand::Rng;

use super::BuildContext;
use crate::models::{BomNode, BomTree, NodeId, Product, QuantityRange};

/// Creates a one-node tree rooted at `product`.
///
/// The root takes the next operation ID (0 on a fresh context), a quantity
/// from `quantity`, and a random order priority in `1..=10`.
pub fn create_root<R: Rng>(
    ctx: &mut BuildContext<R>,
    product: &Product,
    quantity: &QuantityRange,
) -> BomTree {
    let operation_id = ctx.sequencer.next_id();
    ctx.registry.record(product, operation_id);
    let qty = quantity.sample(&mut ctx.rng);
    let priority = ctx.rng.random_range(1..=10);

    BomTree::new(BomNode::from_product(operation_id, product, qty).with_priority(priority))
}

/// Attaches a new node for `product` under `parent`.
///
/// Allocates the next operation ID, copies the product's machines onto the
/// node, samples its quantity, and records the product in the registry.
pub fn attach<R: Rng>(
    ctx: &mut BuildContext<R>,
    tree: &mut BomTree,
    parent: NodeId,
    product: &Product,
    quantity: &QuantityRange,
) -> NodeId {
    let operation_id = ctx.sequencer.next_id();
    ctx.registry.record(product, operation_id);
    let qty = quantity.sample(&mut ctx.rng);

    tree.add_child(parent, BomNode::from_product(operation_id, product, qty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MachineOption;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_create_root() {
        let mut ctx = BuildContext::new(SmallRng::seed_from_u64(5));
        let product = Product::new(3, "R").with_machine(MachineOption::new(8));
        let tree = create_root(&mut ctx, &product, &QuantityRange::new(2, 2, 10));

        let root = tree.node(tree.root());
        assert_eq!(tree.len(), 1);
        assert_eq!(root.operation_id, 0);
        assert_eq!(root.product_id, 3);
        assert!(QuantityRange::new(2, 2, 10).contains(root.quantity));
        assert!(matches!(root.priority, Some(1..=10)));
        assert!(ctx.registry().contains_product(3));
    }

    #[test]
    fn test_attach_allocates_sequential_ids() {
        let mut ctx = BuildContext::new(SmallRng::seed_from_u64(5));
        let root_product = Product::new(1, "A");
        let child_product = Product::new(2, "B")
            .with_machine(MachineOption::new(4).with_times(3.0, 1.0));
        let qty = QuantityRange::fixed(6);

        let mut tree = create_root(&mut ctx, &root_product, &qty);
        let root = tree.root();
        let c1 = attach(&mut ctx, &mut tree, root, &child_product, &qty);
        let c2 = attach(&mut ctx, &mut tree, c1, &root_product, &qty);

        assert_eq!(tree.node(c1).operation_id, 1);
        assert_eq!(tree.node(c2).operation_id, 2);
        assert_eq!(tree.node(c1).parent_operation_id, Some(0));
        assert_eq!(tree.node(c1).machines, child_product.machines);
        assert_eq!(tree.node(c1).quantity, 6);
        assert_eq!(tree.node(c2).depth, 2);
        assert_eq!(ctx.registry().operations(), &[0, 1, 2]);
        assert_eq!(ctx.registry().product_machines().len(), 2);
    }
}
