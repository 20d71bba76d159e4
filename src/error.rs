//! Error types.
//!
//! Product exhaustion during a single attachment is not an error: the
//! eligibility oracle returns `None` and the generator moves on.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Why a bounded build could not reach its exact node count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfeasibleReason {
    /// n-ary growth stalled and vertical fallback is disabled.
    FallbackDisabled,
    /// Vertical fallback ran out of attempts or extendable leaves.
    FallbackExhausted,
}

impl fmt::Display for InfeasibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FallbackDisabled => write!(f, "vertical fallback disabled"),
            Self::FallbackExhausted => write!(f, "no capacity left for vertical chains"),
        }
    }
}

/// Tree generation errors.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("cannot reach n_total={n_total}: {remaining} node(s) remaining, {reason}")]
    InfeasibleTarget {
        n_total: usize,
        remaining: usize,
        reason: InfeasibleReason,
    },

    #[error("product pool is empty")]
    EmptyProductPool,
}

/// Configuration errors. An entry that fails to decode is skipped.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid children bounds: min={min}, max={max}")]
    InvalidBounds { min: i64, max: i64 },

    #[error("invalid vertical fallback depth: min={min}, max={max}")]
    InvalidFallbackDepth { min: i64, max: i64 },

    #[error("invalid quantity range: min={min}, step={step}, max={max}")]
    InvalidQuantity { min: u32, step: u32, max: u32 },

    #[error("unknown shape '{0}' (expected deep, wide or balanced)")]
    UnknownShape(String),

    #[error("invalid node count {0} (must be >= 1)")]
    InvalidNodeCount(i64),

    #[error("invalid shape parameters: {0}")]
    InvalidShapeParams(String),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("export serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that abort one batch entry. Per-tree failures are logged and
/// counted instead.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("cannot create run folder under {path}: {source}")]
    RunFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
