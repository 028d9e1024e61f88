use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_FRAME_TREE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_FRAME_TREE_NODE_ID: AtomicU32 = AtomicU32::new(1);

/// Identifies one `FrameTree`. Used to reject nodes that resolve through the
/// external lookup tables but belong to a different tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameTreeId(u64);

impl FrameTreeId {
    pub(crate) fn next() -> Self {
        Self(NEXT_FRAME_TREE_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Process-wide unique id of a frame tree node, stable for the node's
/// lifetime and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameTreeNodeId(u32);

impl FrameTreeNodeId {
    pub(crate) fn next() -> Self {
        Self(NEXT_FRAME_TREE_NODE_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FrameTreeNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(pub i32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-process id of a frame or proxy, assigned by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoutingId(pub i32);

impl RoutingId {
    pub const NONE: RoutingId = RoutingId(-2);
}

impl fmt::Display for RoutingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteInstanceId(pub i32);

impl fmt::Display for SiteInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The isolated execution context that renders a frame: a site instance and
/// the process currently backing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiteInstance {
    pub id: SiteInstanceId,
    pub process_id: ProcessId,
}

impl SiteInstance {
    pub fn new(id: i32, process_id: i32) -> Self {
        Self {
            id: SiteInstanceId(id),
            process_id: ProcessId(process_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique() {
        let a = FrameTreeNodeId::next();
        let b = FrameTreeNodeId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn routing_none_is_distinct() {
        assert_ne!(RoutingId::NONE, RoutingId(0));
    }
}
