//! Node and animation identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global node ID counter
static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a node, stable for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Create a node ID from a raw value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocate a fresh process-wide node ID.
    pub fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value, `0` never names a node.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Decode a raw parent slot where `0` means "no parent".
    pub fn from_raw(raw: u64) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// Identifier of an animation, scoped to its owning node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnimationId(pub u32);

impl AnimationId {
    /// The first ID a node hands out.
    pub const FIRST: AnimationId = AnimationId(1);

    /// The ID that follows this one.
    pub fn succ(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for AnimationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Anim({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_ids_are_unique_and_nonzero() {
        let a = NodeId::next();
        let b = NodeId::next();
        assert_ne!(a, b);
        assert!(a.raw() > 0);
        assert!(b > a);
    }

    #[test]
    fn test_raw_zero_is_no_parent() {
        assert_eq!(NodeId::from_raw(0), None);
        assert_eq!(NodeId::from_raw(7), Some(NodeId::new(7)));
    }

    #[test]
    fn test_animation_ids_increase() {
        let first = AnimationId::FIRST;
        assert_eq!(first.0, 1);
        assert_eq!(first.succ(), AnimationId(2));
    }
}
