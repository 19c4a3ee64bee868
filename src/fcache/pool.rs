//! Index pool: a dense free-index vector with a watermark, paired with an
//! intrusive used-FIFO so the oldest live node is always one hop away.

use crate::fcache::node::{FlowNode, UsedFifo};
use crate::fcache::prefetch;
use crate::idx::RelIdx;
use crate::queue::tailq::TailqHead;

pub(crate) struct IdxPool {
    used_fifo: TailqHead<FlowNode, UsedFifo>,
    free_idx: Box<[u32]>,
    nb_used: usize,
}

impl IdxPool {
    pub fn new(nb: usize) -> Self {
        IdxPool {
            used_fifo: TailqHead::new(),
            free_idx: (0..nb as u32).collect::<Vec<u32>>().into_boxed_slice(),
            nb_used: 0,
        }
    }

    pub fn reset(&mut self) {
        for (i, slot) in self.free_idx.iter_mut().enumerate() {
            *slot = i as u32;
        }
        self.nb_used = 0;
        self.used_fifo.init();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nb_used
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.free_idx.len()
    }

    /// Pops the next free node index and enqueues it at the FIFO tail.
    /// `None` once every node is live.
    pub fn alloc(&mut self, nodes: &mut [FlowNode]) -> Option<u32> {
        if self.nb_used >= self.free_idx.len() {
            return None;
        }
        let idx = self.free_idx[self.nb_used];
        self.nb_used += 1;
        self.used_fifo
            .insert_tail(nodes, RelIdx::from_offset(idx as usize));
        self.prefetch_next(nodes, 2);
        Some(idx)
    }

    /// Dequeues the node from the FIFO and returns its index to the free
    /// region. The caller guarantees `idx` is currently allocated.
    pub fn free(&mut self, nodes: &mut [FlowNode], idx: u32) {
        debug_assert!(self.nb_used > 0);
        self.used_fifo
            .remove(nodes, RelIdx::from_offset(idx as usize));
        self.nb_used -= 1;
        self.free_idx[self.nb_used] = idx;
    }

    /// Head of the used-FIFO: the longest-lived allocation.
    pub fn oldest(&self) -> Option<u32> {
        self.used_fifo.first().offset().map(|off| off as u32)
    }

    /// Warms the next allocations' node lines.
    pub fn prefetch_next(&self, nodes: &[FlowNode], nb: usize) {
        let top = self.nb_used;
        let tail = (top + nb).min(self.free_idx.len());
        for i in top..tail {
            prefetch::read_low(&nodes[self.free_idx[i] as usize]);
        }
    }
}
