//! Node storage. A node owns its key, the used-FIFO link and a small payload
//! region handed to the caller's init hook on allocation.

use crate::fcache::key::FlowKey;
use crate::queue::tailq::{TailqEntry, TailqLink};

/// Handle to a live node inside a cache (0-origin position in the node
/// array). Only valid for the cache that produced it, and only until the
/// node is freed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Payload initializer invoked once per allocated node.
pub type NodeInit = fn(&mut FlowNode);

pub(crate) fn null_node_init(_node: &mut FlowNode) {}

#[repr(C, align(64))]
pub struct FlowNode {
    pub(crate) key: FlowKey,
    pub(crate) link: TailqLink,
    /// Caller-owned flow data.
    pub data: [u32; 8],
}

impl FlowNode {
    pub(crate) fn blank() -> Self {
        FlowNode {
            key: FlowKey::default(),
            link: TailqLink::new(),
            data: [0; 8],
        }
    }

    #[inline]
    pub fn key(&self) -> &FlowKey {
        &self.key
    }
}

/// Used-FIFO accessor: the allocation-order queue threaded through the
/// node array.
pub(crate) enum UsedFifo {}

impl TailqEntry<FlowNode> for UsedFifo {
    fn link(elm: &FlowNode) -> &TailqLink {
        &elm.link
    }
    fn link_mut(elm: &mut FlowNode) -> &mut TailqLink {
        &mut elm.link
    }
}
