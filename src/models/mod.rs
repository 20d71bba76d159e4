//! BOM domain models.
//!
//! Provides the data types the generators read and produce: the product
//! pool, the arena-backed tree of operations, quantity grids, and the
//! per-build product/machine registry.
//!
//! # Domain Mappings
//!
//! | u-bomgen | Manufacturing | Scheduling input |
//! |----------|---------------|------------------|
//! | Product | Part / Sub-assembly | Job type |
//! | BomNode | Operation instance | Activity |
//! | MachineOption | Eligible machine | Resource candidate |
//! | BomTree | Bill of Materials | Precedence DAG |

mod node;
mod product;
mod quantity;
mod registry;
mod tree;

pub use node::{BomNode, NodeId, OperationId};
pub use product::{MachineOption, Product, ProductId};
pub use quantity::QuantityRange;
pub use registry::{ProductMachines, ProductRegistry};
pub use tree::{Ancestors, BomTree};
