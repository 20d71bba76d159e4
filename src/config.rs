//! Batch configuration.
//!
//! A batch file lists fixed-shape entries under `boms_fixed_nodes` and
//! bounded-shape entries under `boms_bounded_children`. Each entry is decoded
//! and validated on its own: a bad entry is logged, recorded in
//! [`BatchConfig::rejected`] and skipped, and the rest of the batch proceeds.
//!
//! # Example
//! ```json
//! {
//!   "boms_bounded_children": [
//!     { "n_nodes": 7, "k_trees": 2, "min_children": 2, "max_children": 3,
//!       "vertical_tree": {"enabled": true, "min_depth": 1, "max_depth": 4},
//!       "products_source": "products.json",
//!       "outputs": [{"output_file": "bom.json", "quantity": {"min": 1, "step": 1, "max": 5}}] }
//!   ]
//! }
//! ```
//!
//! Fixed-shape entries may also carry a `shape_params` object overriding
//! any of the [`ShapeParams`] fields.

use std::fmt;
use std::fs;
use std::num::TryFromIntError;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::generation::{
    BoundedShapeGenerator, ChildBounds, FixedShapeGenerator, Shape, ShapeParams, VerticalFallback,
};
use crate::models::{Product, QuantityRange};

const FIXED_SECTION: &str = "boms_fixed_nodes";
const BOUNDED_SECTION: &str = "boms_bounded_children";

/// Batch section an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// `boms_fixed_nodes`
    Fixed,
    /// `boms_bounded_children`
    Bounded,
}

impl Section {
    fn default_output_root(self) -> &'static str {
        match self {
            Self::Fixed => "fixed_output",
            Self::Bounded => "bounded_output",
        }
    }

    fn default_output_file(self) -> &'static str {
        match self {
            Self::Fixed => "bom_fixed.json",
            Self::Bounded => "bom_bounded.json",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => f.write_str(FIXED_SECTION),
            Self::Bounded => f.write_str(BOUNDED_SECTION),
        }
    }
}

/// One output of an entry: a file stem and the quantity triplet used for
/// every tree written under it.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSpec {
    /// Output file name; trees are written as `<stem>_<idx>.json`.
    pub output_file: String,
    /// Quantity triplet for all nodes of these trees.
    pub quantity: QuantityRange,
}

/// Settings shared by fixed and bounded entries.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSettings {
    /// Trees built per output.
    pub k_trees: usize,
    /// Product pool file.
    pub products_source: PathBuf,
    /// Directory under which a run folder is created.
    pub output_root: PathBuf,
    /// Base seed; `None` seeds from OS entropy.
    pub seed: Option<u64>,
    /// Outputs, never empty.
    pub outputs: Vec<OutputSpec>,
}

/// A validated fixed-shape entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedBomConfig {
    /// Target node count.
    pub n_nodes: usize,
    /// Shape heuristic.
    pub shape: Shape,
    /// Shape tuning parameters.
    pub params: ShapeParams,
    /// Shared settings.
    pub batch: BatchSettings,
}

impl FixedBomConfig {
    /// Generator for the trees of `output`.
    pub fn generator(&self, output: &OutputSpec) -> FixedShapeGenerator {
        FixedShapeGenerator::new(self.n_nodes, self.shape)
            .with_quantity(output.quantity)
            .with_params(self.params.clone())
    }
}

/// A validated bounded-shape entry.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedBomConfig {
    /// Exact node count.
    pub n_nodes: usize,
    /// Children bounds.
    pub bounds: ChildBounds,
    /// Vertical fallback.
    pub fallback: VerticalFallback,
    /// Shared settings.
    pub batch: BatchSettings,
}

impl BoundedBomConfig {
    /// Generator for the trees of `output`.
    pub fn generator(&self, output: &OutputSpec) -> BoundedShapeGenerator {
        BoundedShapeGenerator::new(self.n_nodes, self.bounds)
            .with_quantity(output.quantity)
            .with_fallback(self.fallback)
    }
}

/// An entry that failed to decode.
#[derive(Debug)]
pub struct RejectedEntry {
    /// Section holding the entry.
    pub section: Section,
    /// Position in the section.
    pub index: usize,
    /// Why it was rejected.
    pub error: ConfigError,
}

/// A decoded batch file.
#[derive(Debug, Default)]
pub struct BatchConfig {
    /// Valid fixed-shape entries, in file order.
    pub fixed: Vec<FixedBomConfig>,
    /// Valid bounded-shape entries, in file order.
    pub bounded: Vec<BoundedBomConfig>,
    /// Skipped entries.
    pub rejected: Vec<RejectedEntry>,
}

#[derive(Debug, Deserialize)]
struct RawBatch {
    #[serde(default)]
    boms_fixed_nodes: Vec<Value>,
    #[serde(default)]
    boms_bounded_children: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    n_nodes: Option<i64>,
    k_trees: Option<usize>,
    shape: Option<String>,
    shape_params: Option<ShapeParams>,
    min_children: Option<i64>,
    max_children: Option<i64>,
    vertical_tree: Option<RawVertical>,
    products_source: Option<PathBuf>,
    output_root: Option<PathBuf>,
    seed: Option<u64>,
    #[serde(default)]
    outputs: Vec<RawOutput>,
}

#[derive(Debug, Deserialize)]
struct RawVertical {
    #[serde(default)]
    enabled: bool,
    #[serde(default = "default_depth")]
    min_depth: i64,
    #[serde(default = "default_depth")]
    max_depth: i64,
}

fn default_depth() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    output_file: Option<String>,
    quantity: Option<RawQuantity>,
}

#[derive(Debug, Deserialize)]
struct RawQuantity {
    min: u32,
    step: u32,
    max: u32,
}

impl BatchConfig {
    /// Decodes a batch document. Fails only if the document itself is not
    /// a JSON object with the expected sections.
    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        let raw: RawBatch = serde_json::from_str(json)?;
        let mut batch = Self::default();

        for (index, value) in raw.boms_fixed_nodes.into_iter().enumerate() {
            match decode_fixed(value) {
                Ok(entry) => batch.fixed.push(entry),
                Err(error) => batch.reject(Section::Fixed, index, error),
            }
        }
        for (index, value) in raw.boms_bounded_children.into_iter().enumerate() {
            match decode_bounded(value) {
                Ok(entry) => batch.bounded.push(entry),
                Err(error) => batch.reject(Section::Bounded, index, error),
            }
        }

        info!(
            fixed = batch.fixed.len(),
            bounded = batch.bounded.len(),
            rejected = batch.rejected.len(),
            "batch configuration decoded"
        );
        Ok(batch)
    }

    /// Reads and decodes a batch file. Relative `products_source` and
    /// `output_root` paths are resolved against the file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut batch = Self::parse(&text)?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let settings = batch
            .fixed
            .iter_mut()
            .map(|e| &mut e.batch)
            .chain(batch.bounded.iter_mut().map(|e| &mut e.batch));
        for settings in settings {
            settings.products_source = resolve(base, &settings.products_source);
            settings.output_root = resolve(base, &settings.output_root);
        }
        Ok(batch)
    }

    /// Whether no entry survived decoding.
    pub fn is_empty(&self) -> bool {
        self.fixed.is_empty() && self.bounded.is_empty()
    }

    fn reject(&mut self, section: Section, index: usize, error: ConfigError) {
        warn!(%section, index, %error, "skipping configuration entry");
        self.rejected.push(RejectedEntry {
            section,
            index,
            error,
        });
    }
}

/// Reads a product pool file (a JSON array of products).
pub fn load_products(path: impl AsRef<Path>) -> Result<Vec<Product>, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let products: Vec<Product> = serde_json::from_str(&text)?;
    info!(path = %path.display(), count = products.len(), "product pool loaded");
    Ok(products)
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn decode_fixed(value: Value) -> Result<FixedBomConfig, ConfigError> {
    let mut raw: RawEntry = serde_json::from_value(value)?;
    let n_nodes = node_count(raw.n_nodes)?;
    let shape = match raw.shape.as_deref() {
        Some(name) => name.parse()?,
        None => Shape::Balanced,
    };
    let params = raw.shape_params.take().unwrap_or_default();
    params.check()?;
    let batch = batch_settings(raw, Section::Fixed)?;
    Ok(FixedBomConfig {
        n_nodes,
        shape,
        params,
        batch,
    })
}

fn decode_bounded(value: Value) -> Result<BoundedBomConfig, ConfigError> {
    let raw: RawEntry = serde_json::from_value(value)?;
    let n_nodes = node_count(raw.n_nodes)?;

    let min = raw.min_children.unwrap_or(1);
    let max = raw.max_children.unwrap_or(1);
    if min < 0 || max < 0 {
        return Err(ConfigError::InvalidBounds { min, max });
    }
    let bounds = ChildBounds::new(min as usize, max as usize)?;

    let fallback = match &raw.vertical_tree {
        Some(v) if v.enabled => {
            let invalid = |_: TryFromIntError| ConfigError::InvalidFallbackDepth {
                min: v.min_depth,
                max: v.max_depth,
            };
            let min_depth = usize::try_from(v.min_depth).map_err(invalid)?;
            let max_depth = usize::try_from(v.max_depth).map_err(invalid)?;
            VerticalFallback::enabled(min_depth, max_depth)?
        }
        _ => VerticalFallback::disabled(),
    };

    let batch = batch_settings(raw, Section::Bounded)?;
    Ok(BoundedBomConfig {
        n_nodes,
        bounds,
        fallback,
        batch,
    })
}

fn node_count(n_nodes: Option<i64>) -> Result<usize, ConfigError> {
    let n = n_nodes.ok_or(ConfigError::MissingField("n_nodes"))?;
    if n < 1 {
        return Err(ConfigError::InvalidNodeCount(n));
    }
    Ok(n as usize)
}

fn batch_settings(raw: RawEntry, section: Section) -> Result<BatchSettings, ConfigError> {
    let k_trees = raw.k_trees.ok_or(ConfigError::MissingField("k_trees"))?;
    let products_source = raw
        .products_source
        .ok_or(ConfigError::MissingField("products_source"))?;
    let output_root = raw
        .output_root
        .unwrap_or_else(|| PathBuf::from(section.default_output_root()));

    let mut outputs = raw
        .outputs
        .into_iter()
        .map(|o| output_spec(o, section))
        .collect::<Result<Vec<_>, _>>()?;
    if outputs.is_empty() {
        outputs.push(OutputSpec {
            output_file: section.default_output_file().to_string(),
            quantity: QuantityRange::default(),
        });
    }

    Ok(BatchSettings {
        k_trees,
        products_source,
        output_root,
        seed: raw.seed,
        outputs,
    })
}

fn output_spec(raw: RawOutput, section: Section) -> Result<OutputSpec, ConfigError> {
    let quantity = match raw.quantity {
        Some(RawQuantity { min, step, max }) => {
            if step == 0 || max < min {
                return Err(ConfigError::InvalidQuantity { min, step, max });
            }
            QuantityRange::new(min, step, max)
        }
        None => QuantityRange::default(),
    };
    Ok(OutputSpec {
        output_file: raw
            .output_file
            .unwrap_or_else(|| section.default_output_file().to_string()),
        quantity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch(value: Value) -> BatchConfig {
        BatchConfig::parse(&value.to_string()).unwrap()
    }

    #[test]
    fn test_parse_full_batch() {
        let config = batch(json!({
            "boms_fixed_nodes": [{
                "n_nodes": 10, "k_trees": 3, "shape": "wide",
                "products_source": "products.json", "output_root": "out",
                "seed": 7,
                "outputs": [{"output_file": "bom_a.json", "quantity": {"min": 1, "step": 2, "max": 9}}]
            }],
            "boms_bounded_children": [{
                "n_nodes": 7, "k_trees": 2, "min_children": 2, "max_children": 3,
                "vertical_tree": {"enabled": true, "min_depth": 1, "max_depth": 4},
                "products_source": "products.json"
            }]
        }));

        assert!(config.rejected.is_empty());
        let fixed = &config.fixed[0];
        assert_eq!(fixed.n_nodes, 10);
        assert_eq!(fixed.shape, Shape::Wide);
        assert_eq!(fixed.batch.k_trees, 3);
        assert_eq!(fixed.batch.seed, Some(7));
        assert_eq!(fixed.batch.output_root, PathBuf::from("out"));
        assert_eq!(fixed.batch.outputs[0].quantity, QuantityRange::new(1, 2, 9));

        let bounded = &config.bounded[0];
        assert_eq!(bounded.bounds, ChildBounds::new(2, 3).unwrap());
        assert_eq!(bounded.fallback, VerticalFallback::enabled(1, 4).unwrap());
        assert_eq!(bounded.batch.seed, None);
    }

    #[test]
    fn test_defaults() {
        let config = batch(json!({
            "boms_fixed_nodes": [{"n_nodes": 5, "k_trees": 1, "products_source": "p.json"}],
            "boms_bounded_children": [{"n_nodes": 5, "k_trees": 1, "products_source": "p.json"}]
        }));

        let fixed = &config.fixed[0];
        assert_eq!(fixed.shape, Shape::Balanced);
        assert_eq!(fixed.params, ShapeParams::default());
        assert_eq!(fixed.batch.output_root, PathBuf::from("fixed_output"));
        assert_eq!(
            fixed.batch.outputs,
            vec![OutputSpec {
                output_file: "bom_fixed.json".into(),
                quantity: QuantityRange::fixed(1),
            }]
        );

        let bounded = &config.bounded[0];
        assert_eq!(bounded.bounds, ChildBounds::new(1, 1).unwrap());
        assert!(!bounded.fallback.is_enabled());
        assert_eq!(bounded.batch.output_root, PathBuf::from("bounded_output"));
        assert_eq!(bounded.batch.outputs[0].output_file, "bom_bounded.json");
    }

    #[test]
    fn test_bad_entries_are_skipped() {
        let config = batch(json!({
            "boms_fixed_nodes": [
                {"k_trees": 1, "products_source": "p.json"},
                {"n_nodes": 0, "k_trees": 1, "products_source": "p.json"},
                {"n_nodes": 4, "k_trees": 1, "shape": "tall", "products_source": "p.json"},
                {"n_nodes": 4, "k_trees": 1, "products_source": "p.json",
                 "outputs": [{"quantity": {"min": 5, "step": 0, "max": 9}}]},
                {"n_nodes": 4, "k_trees": 1, "products_source": "p.json"}
            ],
            "boms_bounded_children": [
                {"n_nodes": 7, "k_trees": 1, "min_children": 4, "max_children": 3, "products_source": "p.json"},
                {"n_nodes": 7, "k_trees": 1, "products_source": "p.json",
                 "vertical_tree": {"enabled": true, "min_depth": 3, "max_depth": 2}},
                {"n_nodes": 7, "min_children": 2, "max_children": 3, "products_source": "p.json"},
                {"n_nodes": 7, "k_trees": 1, "min_children": 2, "max_children": 3}
            ]
        }));

        assert_eq!(config.fixed.len(), 1);
        assert!(config.bounded.is_empty());
        assert_eq!(config.rejected.len(), 8);

        let errors: Vec<String> = config.rejected.iter().map(|r| r.error.to_string()).collect();
        assert!(errors[0].contains("n_nodes"));
        assert!(matches!(config.rejected[1].error, ConfigError::InvalidNodeCount(0)));
        assert!(matches!(config.rejected[2].error, ConfigError::UnknownShape(_)));
        assert!(matches!(config.rejected[3].error, ConfigError::InvalidQuantity { .. }));
        assert!(matches!(
            config.rejected[4].error,
            ConfigError::InvalidBounds { min: 4, max: 3 }
        ));
        assert!(matches!(
            config.rejected[5].error,
            ConfigError::InvalidFallbackDepth { min: 3, max: 2 }
        ));
        assert!(matches!(config.rejected[6].error, ConfigError::MissingField("k_trees")));
        assert!(matches!(
            config.rejected[7].error,
            ConfigError::MissingField("products_source")
        ));
        assert_eq!(config.rejected[7].section, Section::Bounded);
        assert_eq!(config.rejected[7].index, 3);
    }

    #[test]
    fn test_negative_fallback_depth_rejected() {
        let config = batch(json!({
            "boms_bounded_children": [{
                "n_nodes": 3, "k_trees": 1, "products_source": "p.json",
                "vertical_tree": {"enabled": true, "min_depth": -2, "max_depth": 4}
            }]
        }));
        assert!(config.bounded.is_empty());
        assert!(matches!(
            config.rejected[0].error,
            ConfigError::InvalidFallbackDepth { min: -2, max: 4 }
        ));
    }

    #[test]
    fn test_shape_params_override() {
        let config = batch(json!({
            "boms_fixed_nodes": [
                {"n_nodes": 8, "k_trees": 1, "shape": "wide", "products_source": "p.json",
                 "shape_params": {"max_children_wide": 1, "p_single_wide": 0.5}},
                {"n_nodes": 8, "k_trees": 1, "products_source": "p.json",
                 "shape_params": {"min_frac_wide": 0.9, "max_frac_wide": 0.2}}
            ]
        }));

        assert_eq!(config.fixed.len(), 1);
        let entry = &config.fixed[0];
        assert_eq!(entry.params.max_children_wide, 1);
        assert_eq!(entry.params.p_single_wide, 0.5);
        assert_eq!(entry.params.max_leaves_deep, ShapeParams::default().max_leaves_deep);
        let generator = entry.generator(&entry.batch.outputs[0]);
        assert_eq!(generator.params(), &entry.params);

        assert!(matches!(
            config.rejected[0].error,
            ConfigError::InvalidShapeParams(_)
        ));
    }

    #[test]
    fn test_disabled_fallback_ignores_depths() {
        let config = batch(json!({
            "boms_bounded_children": [{
                "n_nodes": 3, "k_trees": 1, "products_source": "p.json",
                "vertical_tree": {"enabled": false, "min_depth": 0, "max_depth": 0}
            }]
        }));
        assert!(!config.bounded[0].fallback.is_enabled());
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(BatchConfig::parse("[1, 2]"), Err(ConfigError::Json(_))));
        assert!(BatchConfig::parse("{}").unwrap().is_empty());
    }

    #[test]
    fn test_generator_from_entry() {
        let config = batch(json!({
            "boms_bounded_children": [{
                "n_nodes": 9, "k_trees": 1, "min_children": 2, "max_children": 4,
                "products_source": "p.json"
            }]
        }));
        let entry = &config.bounded[0];
        let generator = entry.generator(&entry.batch.outputs[0]);
        assert_eq!(generator.n_total(), 9);
        assert_eq!(generator.bounds(), entry.bounds);
    }

    #[test]
    fn test_from_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        fs::write(
            &path,
            json!({
                "boms_fixed_nodes": [{
                    "n_nodes": 4, "k_trees": 1,
                    "products_source": "pool/products.json",
                    "output_root": "/abs/out"
                }]
            })
            .to_string(),
        )
        .unwrap();

        let config = BatchConfig::from_file(&path).unwrap();
        let settings = &config.fixed[0].batch;
        assert_eq!(settings.products_source, dir.path().join("pool/products.json"));
        assert_eq!(settings.output_root, PathBuf::from("/abs/out"));

        assert!(matches!(
            BatchConfig::from_file(dir.path().join("missing.json")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_load_products() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.json");
        fs::write(
            &path,
            json!([
                {"pid": 1, "code": "A", "pname": "Alpha",
                 "machines": [{"id": 3, "name": "M3", "oee": 0.9, "execution_time": 2.0, "setup_time": 0.5}]},
                {"pid": 2, "code": "B", "pname": "Beta", "machines": []}
            ])
            .to_string(),
        )
        .unwrap();

        let products = load_products(&path).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].machines[0].id, 3);
        assert_eq!(products[1].name, "Beta");
    }
}
