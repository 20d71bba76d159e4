//! Synthetic Bill-of-Materials tree generator.
//!
//! Builds rooted BOM trees from a product pool for use as benchmark
//! instances in scheduling research. Every tree keeps one invariant: a
//! product never appears twice on any root-to-leaf path.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Product`, `MachineOption`, `BomNode`,
//!   `BomTree`, `QuantityRange`, `ProductRegistry`
//! - **`generation`**: Eligibility oracle, attachment, and the two generators
//!   (`FixedShapeGenerator`, `BoundedShapeGenerator`)
//! - **`validation`**: Tree and product-pool integrity checks
//! - **`config`**: Batch configuration decoding
//! - **`driver`**: Root creation, `k_trees` loop, run folders
//! - **`export`**: Nested JSON and indented text output
//! - **`logging`**: `tracing` subscriber setup
//!
//! # Example
//!
//! ```
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use u_bomgen::driver::build_tree;
//! use u_bomgen::generation::{FixedShapeGenerator, Shape};
//! use u_bomgen::models::Product;
//!
//! let products: Vec<Product> = (1..=30).map(|i| Product::new(i, format!("P{i}"))).collect();
//! let generator = FixedShapeGenerator::new(20, Shape::Deep);
//! let built = build_tree(&generator, &products, StdRng::seed_from_u64(3)).unwrap();
//! assert_eq!(built.tree.len(), 20);
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod export;
pub mod generation;
pub mod logging;
pub mod models;
pub mod validation;
