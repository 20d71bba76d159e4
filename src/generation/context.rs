//! Per-build mutable state.

use rand::Rng;

use crate::models::{OperationId, ProductRegistry};

/// Sequential operation ID allocator, starting at 0.
#[derive(Debug, Clone, Default)]
pub struct IdSequencer {
    next: OperationId,
}

impl IdSequencer {
    /// Creates a sequencer starting at 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next ID and advances.
    pub fn next_id(&mut self) -> OperationId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Number of IDs allocated so far.
    pub fn allocated(&self) -> u64 {
        self.next
    }
}

/// State owned by a single tree build: random source, ID allocator and
/// product/machine registry.
///
/// A fresh context per build keeps builds independent, so separate trees
/// can be generated concurrently as long as each owns its own context.
#[derive(Debug)]
pub struct BuildContext<R> {
    pub(crate) rng: R,
    pub(crate) sequencer: IdSequencer,
    pub(crate) registry: ProductRegistry,
}

impl<R: Rng> BuildContext<R> {
    /// Creates a context around `rng`.
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            sequencer: IdSequencer::new(),
            registry: ProductRegistry::new(),
        }
    }

    /// The random source.
    pub fn rng(&mut self) -> &mut R {
        &mut self.rng
    }

    /// The registry filled so far.
    pub fn registry(&self) -> &ProductRegistry {
        &self.registry
    }

    /// Number of operation IDs allocated so far.
    pub fn allocated_ids(&self) -> u64 {
        self.sequencer.allocated()
    }

    /// Consumes the context, returning its registry.
    pub fn into_registry(self) -> ProductRegistry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_sequencer_is_monotonic() {
        let mut seq = IdSequencer::new();
        assert_eq!(seq.next_id(), 0);
        assert_eq!(seq.next_id(), 1);
        assert_eq!(seq.next_id(), 2);
        assert_eq!(seq.allocated(), 3);
    }

    #[test]
    fn test_contexts_are_independent() {
        let mut a = BuildContext::new(SmallRng::seed_from_u64(1));
        let b = BuildContext::new(SmallRng::seed_from_u64(1));

        a.sequencer.next_id();
        a.sequencer.next_id();

        assert_eq!(a.allocated_ids(), 2);
        assert_eq!(b.allocated_ids(), 0);
        assert!(b.registry().operations().is_empty());
    }
}
