//! Product model.
//!
//! A product is a candidate BOM component drawn from the caller-supplied
//! pool. Each product lists the machines able to process it, annotated with
//! OEE and timing data that downstream schedulers consume.
//!
//! The serialized form matches the `rand_products.json` files produced by
//! the product generator: `pid`, `code`, `pname`, `machines`.

use serde::{Deserialize, Serialize};

/// Product identifier, unique within one product pool.
pub type ProductId = u32;

/// A machine that can process a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineOption {
    /// Machine identifier.
    pub id: u32,
    /// Human-readable machine name.
    #[serde(default)]
    pub name: String,
    /// Overall Equipment Effectiveness (0.0..=1.0).
    #[serde(default = "default_oee")]
    pub oee: f64,
    /// Unit execution time on this machine.
    #[serde(default)]
    pub execution_time: f64,
    /// Setup time before processing on this machine.
    #[serde(default)]
    pub setup_time: f64,
}

fn default_oee() -> f64 {
    1.0
}

/// A candidate BOM component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier.
    #[serde(rename = "pid", alias = "product_id", alias = "id")]
    pub id: ProductId,
    /// Product code, used as the display code of tree nodes.
    #[serde(default)]
    pub code: String,
    /// Product name.
    #[serde(default, rename = "pname", alias = "name")]
    pub name: String,
    /// Machines able to process this product.
    #[serde(default)]
    pub machines: Vec<MachineOption>,
}

impl MachineOption {
    /// Creates a machine option with OEE 1.0 and zero times.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            name: String::new(),
            oee: default_oee(),
            execution_time: 0.0,
            setup_time: 0.0,
        }
    }

    /// Sets the machine name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the OEE, clamped to `0.0..=1.0`.
    pub fn with_oee(mut self, oee: f64) -> Self {
        self.oee = oee.clamp(0.0, 1.0);
        self
    }

    /// Sets execution and setup times.
    pub fn with_times(mut self, execution_time: f64, setup_time: f64) -> Self {
        self.execution_time = execution_time;
        self.setup_time = setup_time;
        self
    }
}

impl Product {
    /// Creates a product with no machines.
    pub fn new(id: ProductId, code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            id,
            name: code.clone(),
            code,
            machines: Vec::new(),
        }
    }

    /// Sets the product name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a machine option.
    pub fn with_machine(mut self, machine: MachineOption) -> Self {
        self.machines.push(machine);
        self
    }

    /// IDs of all machines able to process this product.
    pub fn machine_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.machines.iter().map(|m| m.id)
    }
}
