//! BOM node model.
//!
//! A node is one operation in the BOM hierarchy: an instance of a product,
//! with the quantity to produce and the machines able to run it.

use serde::{Deserialize, Serialize};

use super::{MachineOption, Product, ProductId};

/// Operation identifier, allocated sequentially per tree build.
pub type OperationId = u64;

/// Index of a node inside its [`BomTree`](super::BomTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// One BOM entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomNode {
    /// Unique operation identifier.
    pub operation_id: OperationId,
    /// Parent node. `None` only for the root.
    pub parent: Option<NodeId>,
    /// Operation identifier of the parent (denormalized for export).
    pub parent_operation_id: Option<OperationId>,
    /// Product this operation produces.
    pub product_id: ProductId,
    /// Display code (the product code).
    pub code: String,
    /// Quantity to produce.
    pub quantity: u32,
    /// Machines able to run this operation, copied from the product.
    pub machines: Vec<MachineOption>,
    /// Distance from the root (root = 0).
    pub depth: usize,
    /// Order priority (root only).
    pub priority: Option<u8>,
}

impl BomNode {
    /// Creates a detached node for `product`.
    ///
    /// Parent links and depth are filled in when the node is added to a tree.
    pub fn from_product(operation_id: OperationId, product: &Product, quantity: u32) -> Self {
        Self {
            operation_id,
            parent: None,
            parent_operation_id: None,
            product_id: product.id,
            code: product.code.clone(),
            quantity,
            machines: product.machines.clone(),
            depth: 0,
            priority: None,
        }
    }

    /// Sets the order priority.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Whether this node has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MachineOption;

    #[test]
    fn test_from_product_copies_machines() {
        let product = Product::new(9, "P9")
            .with_machine(MachineOption::new(1))
            .with_machine(MachineOption::new(2));
        let node = BomNode::from_product(4, &product, 3).with_priority(5);

        assert_eq!(node.operation_id, 4);
        assert_eq!(node.product_id, 9);
        assert_eq!(node.code, "P9");
        assert_eq!(node.quantity, 3);
        assert_eq!(node.machines, product.machines);
        assert_eq!(node.priority, Some(5));
        assert!(node.is_root());
    }
}
