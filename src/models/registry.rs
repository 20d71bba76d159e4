//! Per-build product/machine registry.
//!
//! Records every operation allocated during one tree build, the machines
//! involved, and the distinct `(product, machines)` pairs. Exported next to
//! the tree so downstream tools can cross-check machine assignments.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{MachineOption, OperationId, Product, ProductId};

/// A product together with the machines recorded for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMachines {
    /// Product identifier.
    pub product_id: ProductId,
    /// Machines assigned to the product.
    pub machines: Vec<MachineOption>,
}

/// Registry of products and machines used by one tree build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductRegistry {
    operations: Vec<OperationId>,
    machine_ids: BTreeSet<u32>,
    product_machines: Vec<ProductMachines>,
}

impl ProductRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `operation_id` produces `product`.
    ///
    /// `(product, machines)` pairs are deduplicated by value.
    pub fn record(&mut self, product: &Product, operation_id: OperationId) {
        self.operations.push(operation_id);
        self.machine_ids.extend(product.machine_ids());

        let entry = ProductMachines {
            product_id: product.id,
            machines: product.machines.clone(),
        };
        if !self.product_machines.contains(&entry) {
            self.product_machines.push(entry);
        }
    }

    /// Operation IDs in allocation order.
    pub fn operations(&self) -> &[OperationId] {
        &self.operations
    }

    /// Distinct machine IDs, ascending.
    pub fn machine_ids(&self) -> &BTreeSet<u32> {
        &self.machine_ids
    }

    /// Distinct `(product, machines)` pairs, sorted by product ID.
    pub fn product_machines(&self) -> Vec<&ProductMachines> {
        let mut entries: Vec<&ProductMachines> = self.product_machines.iter().collect();
        entries.sort_by_key(|e| e.product_id);
        entries
    }

    /// Whether `product_id` was recorded.
    pub fn contains_product(&self, product_id: ProductId) -> bool {
        self.product_machines
            .iter()
            .any(|e| e.product_id == product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_deduplicates_pairs() {
        let p1 = Product::new(2, "B").with_machine(MachineOption::new(5));
        let p2 = Product::new(1, "A")
            .with_machine(MachineOption::new(5))
            .with_machine(MachineOption::new(3));

        let mut reg = ProductRegistry::new();
        reg.record(&p1, 0);
        reg.record(&p2, 1);
        reg.record(&p1, 2);

        assert_eq!(reg.operations(), &[0, 1, 2]);
        assert_eq!(reg.machine_ids().iter().copied().collect::<Vec<_>>(), vec![3, 5]);

        let pairs = reg.product_machines();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].product_id, 1);
        assert_eq!(pairs[1].product_id, 2);
        assert!(reg.contains_product(2));
        assert!(!reg.contains_product(9));
    }

    #[test]
    fn test_same_product_different_machines_kept() {
        let mut reg = ProductRegistry::new();
        reg.record(&Product::new(1, "A").with_machine(MachineOption::new(1)), 0);
        reg.record(&Product::new(1, "A").with_machine(MachineOption::new(2)), 1);
        assert_eq!(reg.product_machines().len(), 2);
    }
}
