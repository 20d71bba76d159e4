//! Structural validation for BOM trees and product pools.
//!
//! Checks a generated (or reloaded) tree before it is exported. Detects:
//! - Missing or multiple roots, dangling parent links, parent cycles
//! - Inconsistent parent operation IDs and depths
//! - Duplicate operation IDs
//! - A product repeated on a root-to-leaf path
//! - Quantities off the configured grid
//! - Node counts and children counts outside the expected bounds
//!
//! Product pools are checked separately with [`validate_products`].

use std::collections::{BTreeSet, HashSet};

use crate::generation::ChildBounds;
use crate::models::{BomTree, NodeId, Product, QuantityRange};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Offending node, if the error is tied to one.
    pub node: Option<NodeId>,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// No node without a parent.
    MissingRoot,
    /// More than one node without a parent.
    MultipleRoots,
    /// A parent link points outside the tree.
    DanglingParent,
    /// Following parent links never reaches the root.
    CyclicParent,
    /// Stored parent operation ID or depth disagrees with the parent node.
    InconsistentLink,
    /// Two nodes share an operation ID.
    DuplicateOperationId,
    /// A product appears twice on one root-to-leaf path.
    DuplicateProductOnPath,
    /// A quantity is not reachable from the quantity triplet.
    QuantityOffGrid,
    /// The tree has the wrong number of nodes.
    NodeCountMismatch,
    /// An expanded node has too few or too many children.
    ChildBoundsViolated,
    /// The product pool is empty.
    EmptyPool,
    /// Two products share an ID.
    DuplicateProductId,
    /// A machine option carries out-of-range data.
    InvalidMachine,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, node: Option<NodeId>, message: impl Into<String>) -> Self {
        Self {
            kind,
            node,
            message: message.into(),
        }
    }
}

/// Optional checks on top of the structural ones.
#[derive(Debug, Clone, Default)]
pub struct TreeExpectations {
    node_count: Option<usize>,
    quantity: Option<QuantityRange>,
    child_bounds: Option<(ChildBounds, BTreeSet<NodeId>)>,
}

impl TreeExpectations {
    /// Structural checks only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires exactly `n` nodes.
    pub fn with_node_count(mut self, n: usize) -> Self {
        self.node_count = Some(n);
        self
    }

    /// Requires every quantity to lie on the grid of `quantity`.
    pub fn with_quantity(mut self, quantity: QuantityRange) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// Requires every node with children to have at most `bounds.max()`
    /// children, and at least `bounds.min()` unless it is in `exempt`.
    pub fn with_child_bounds(mut self, bounds: ChildBounds, exempt: BTreeSet<NodeId>) -> Self {
        self.child_bounds = Some((bounds, exempt));
        self
    }
}

/// Validates a BOM tree.
///
/// Checks:
/// 1. Exactly one root, and every parent link resolves
/// 2. Every node reaches the root through parent links (no cycles)
/// 3. Parent operation IDs and depths match the parent node
/// 4. Operation IDs are unique
/// 5. No product repeats on any root-to-node path
/// 6. Whatever `expectations` adds (node count, quantity grid, children bounds)
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_tree(tree: &BomTree, expectations: &TreeExpectations) -> ValidationResult {
    let mut errors = Vec::new();

    if let Some(expected) = expectations.node_count {
        if tree.len() != expected {
            errors.push(ValidationError::new(
                ValidationErrorKind::NodeCountMismatch,
                None,
                format!("Tree has {} nodes, expected {expected}", tree.len()),
            ));
        }
    }

    let roots: Vec<NodeId> = tree
        .iter()
        .filter(|(_, n)| n.is_root())
        .map(|(id, _)| id)
        .collect();
    match roots.len() {
        0 => errors.push(ValidationError::new(
            ValidationErrorKind::MissingRoot,
            None,
            "Tree has no root node",
        )),
        1 => {}
        n => errors.push(ValidationError::new(
            ValidationErrorKind::MultipleRoots,
            Some(roots[1]),
            format!("Tree has {n} root nodes"),
        )),
    }

    let mut operation_ids = HashSet::new();
    for (id, node) in tree.iter() {
        if !operation_ids.insert(node.operation_id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateOperationId,
                Some(id),
                format!("Duplicate operation ID: {}", node.operation_id),
            ));
        }

        let Some(parent) = node.parent else {
            continue;
        };
        let Some(parent_node) = tree.get(parent) else {
            errors.push(ValidationError::new(
                ValidationErrorKind::DanglingParent,
                Some(id),
                format!(
                    "Operation {} references missing parent {}",
                    node.operation_id, parent.0
                ),
            ));
            continue;
        };
        if node.parent_operation_id != Some(parent_node.operation_id)
            || node.depth != parent_node.depth + 1
        {
            errors.push(ValidationError::new(
                ValidationErrorKind::InconsistentLink,
                Some(id),
                format!(
                    "Operation {} disagrees with parent operation {}",
                    node.operation_id, parent_node.operation_id
                ),
            ));
        }
    }

    let acyclic = match detect_cycle(tree) {
        Some(err) => {
            errors.push(err);
            false
        }
        None => true,
    };

    // Path walks are only meaningful once every chain ends at a root.
    if acyclic {
        for (id, node) in tree.iter() {
            let repeated = tree
                .ancestors(id)
                .skip(1)
                .any(|a| tree.node(a).product_id == node.product_id);
            if repeated {
                errors.push(ValidationError::new(
                    ValidationErrorKind::DuplicateProductOnPath,
                    Some(id),
                    format!(
                        "Product {} repeats on the path to operation {}",
                        node.product_id, node.operation_id
                    ),
                ));
            }
        }
    }

    if let Some(quantity) = &expectations.quantity {
        for (id, node) in tree.iter() {
            if !quantity.contains(node.quantity) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::QuantityOffGrid,
                    Some(id),
                    format!(
                        "Operation {} has quantity {} outside {}..={} step {}",
                        node.operation_id, node.quantity, quantity.min, quantity.max, quantity.step
                    ),
                ));
            }
        }
    }

    if let Some((bounds, exempt)) = &expectations.child_bounds {
        for (id, node) in tree.iter() {
            let count = tree.child_count(id);
            if count == 0 {
                continue;
            }
            let too_many = count > bounds.max();
            let too_few = count < bounds.min() && !exempt.contains(&id);
            if too_many || too_few {
                errors.push(ValidationError::new(
                    ValidationErrorKind::ChildBoundsViolated,
                    Some(id),
                    format!(
                        "Operation {} has {count} children, expected {}..={}",
                        node.operation_id,
                        bounds.min(),
                        bounds.max()
                    ),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validates a product pool before generation.
///
/// Checks:
/// 1. The pool is not empty
/// 2. No duplicate product IDs
/// 3. Machine OEE lies in `0.0..=1.0` and times are non-negative
pub fn validate_products(products: &[Product]) -> ValidationResult {
    let mut errors = Vec::new();

    if products.is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::EmptyPool,
            None,
            "Product pool is empty",
        ));
    }

    let mut ids = HashSet::new();
    for product in products {
        if !ids.insert(product.id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateProductId,
                None,
                format!("Duplicate product ID: {}", product.id),
            ));
        }

        for machine in &product.machines {
            let oee_ok = (0.0..=1.0).contains(&machine.oee);
            let times_ok = machine.execution_time >= 0.0 && machine.setup_time >= 0.0;
            if !oee_ok || !times_ok {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidMachine,
                    None,
                    format!(
                        "Product {} has invalid data for machine {}",
                        product.id, machine.id
                    ),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Follows parent links from every node; a walk longer than the tree that
/// never meets a root means a cycle.
fn detect_cycle(tree: &BomTree) -> Option<ValidationError> {
    for (id, node) in tree.iter() {
        let mut current = node;
        let mut steps = 0;
        while let Some(parent) = current.parent {
            let Some(next) = tree.get(parent) else {
                break; // Dangling, reported separately
            };
            steps += 1;
            if steps > tree.len() {
                return Some(ValidationError::new(
                    ValidationErrorKind::CyclicParent,
                    Some(id),
                    format!(
                        "Parent links from operation {} never reach a root",
                        node.operation_id
                    ),
                ));
            }
            current = next;
        }
    }
    None
}
