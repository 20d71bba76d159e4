//! Tree export.
//!
//! Writes a built tree in three forms:
//! - `<stem>.json`: nested document, one object per node with a `children`
//!   array; the root also carries `operations_list`.
//! - `<stem>.tree`: indented text rendering, one `[operation] [parent] [code]`
//!   line per node.
//! - `<stem>.meta.json`: the build's registry (operations, machine IDs,
//!   `(product, machines)` pairs).

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ExportError;
use crate::models::{
    BomTree, MachineOption, NodeId, OperationId, ProductId, ProductMachines, ProductRegistry,
};

/// Paths written by [`write_outputs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    /// Nested JSON document.
    pub json: PathBuf,
    /// Text rendering.
    pub tree: PathBuf,
    /// Registry document.
    pub meta: PathBuf,
}

#[derive(Debug, Serialize)]
struct JsonNode<'a> {
    operationid: OperationId,
    parentid: Option<OperationId>,
    productid: ProductId,
    code: &'a str,
    pname: &'a str,
    quantity: u32,
    depth: usize,
    machines: &'a [MachineOption],
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    operations_list: Option<&'a [OperationId]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<JsonNode<'a>>,
}

#[derive(Debug, Serialize)]
struct MetaDocument<'a> {
    operations_list: &'a [OperationId],
    machines: Vec<u32>,
    products: Vec<&'a ProductMachines>,
}

/// Builds the nested JSON document for `tree`.
pub fn to_json_value(
    tree: &BomTree,
    registry: &ProductRegistry,
) -> Result<serde_json::Value, ExportError> {
    Ok(serde_json::to_value(json_node(tree, registry, tree.root()))?)
}

/// Serializes the nested JSON document with two-space indentation.
pub fn to_json_string(tree: &BomTree, registry: &ProductRegistry) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(&json_node(
        tree,
        registry,
        tree.root(),
    ))?)
}

fn json_node<'a>(tree: &'a BomTree, registry: &'a ProductRegistry, id: NodeId) -> JsonNode<'a> {
    let node = tree.node(id);
    JsonNode {
        operationid: node.operation_id,
        parentid: node.parent_operation_id,
        productid: node.product_id,
        code: &node.code,
        pname: &node.code,
        quantity: node.quantity,
        depth: node.depth,
        machines: &node.machines,
        priority: node.priority,
        operations_list: (id == tree.root()).then(|| registry.operations()),
        children: tree
            .children(id)
            .iter()
            .map(|&child| json_node(tree, registry, child))
            .collect(),
    }
}

/// Renders `tree` as indented text.
///
/// ```text
/// [0] [-] [P1]
/// ├── [1] [0] [P2]
/// │   └── [3] [1] [P4]
/// └── [2] [0] [P3]
/// ```
pub fn render_text(tree: &BomTree) -> String {
    let mut out = String::new();
    if tree.is_empty() {
        return out;
    }

    // (node, prefix for its own line, prefix inherited by its children)
    let mut stack = vec![(tree.root(), String::new(), String::new())];
    while let Some((id, line_prefix, child_prefix)) = stack.pop() {
        let node = tree.node(id);
        let parent = node
            .parent_operation_id
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        let _ = writeln!(
            out,
            "{line_prefix}[{}] [{parent}] [{}]",
            node.operation_id, node.code
        );

        let children = tree.children(id);
        for (i, &child) in children.iter().enumerate().rev() {
            let last = i + 1 == children.len();
            let (branch, indent) = if last {
                ("└── ", "    ")
            } else {
                ("├── ", "│   ")
            };
            stack.push((
                child,
                format!("{child_prefix}{branch}"),
                format!("{child_prefix}{indent}"),
            ));
        }
    }
    out
}

/// Serializes the registry document.
pub fn registry_to_json_string(registry: &ProductRegistry) -> Result<String, ExportError> {
    let meta = MetaDocument {
        operations_list: registry.operations(),
        machines: registry.machine_ids().iter().copied().collect(),
        products: registry.product_machines(),
    };
    Ok(serde_json::to_string_pretty(&meta)?)
}

/// Writes `<stem>.json`, `<stem>.tree` and `<stem>.meta.json` into `dir`,
/// creating `dir` if needed.
pub fn write_outputs(
    tree: &BomTree,
    registry: &ProductRegistry,
    dir: &Path,
    stem: &str,
) -> Result<ExportPaths, ExportError> {
    fs::create_dir_all(dir)?;
    let paths = ExportPaths {
        json: dir.join(format!("{stem}.json")),
        tree: dir.join(format!("{stem}.tree")),
        meta: dir.join(format!("{stem}.meta.json")),
    };

    fs::write(&paths.json, to_json_string(tree, registry)?)?;
    fs::write(&paths.tree, render_text(tree))?;
    fs::write(&paths.meta, registry_to_json_string(registry)?)?;
    Ok(paths)
}
