//! Pipelined lookup contexts.
//!
//! Latency hiding without coroutines: a small pool of explicit state
//! records is advanced round-robin, one state per pass, so the prefetches
//! issued for one in-flight request overlap the compute of the others. The
//! two WAIT states only exist to stagger the pool at startup; contexts
//! `0, 1, 2` reach `PrefetchKey` on passes `1, 2, 3` and from then on the
//! pool stays spread across the pipeline stages.

use crate::fcache::bucket::INVALID_IDX;
use crate::fcache::key::HashPair;

/// Upper bound on the `k` of the `3·k` context pool.
pub const PIPELINE_NB: usize = 9;

pub(crate) const CTX_POOL_MAX: usize = PIPELINE_NB * 3;

pub(crate) const INVALID_REQ: u32 = u32::MAX;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum CtxState {
    Wait2,
    Wait1,
    PrefetchKey,
    FetchBucket,
    FetchNode,
    /// Re-run the fingerprint search because a kick-out touched one of the
    /// snapshotted buckets.
    RefetchNode,
    CmpKey,
}

#[derive(Clone, Copy)]
pub(crate) struct BucketHits {
    /// Candidate bucket index.
    pub bk: u32,
    /// Fingerprint hit mask snapshotted by the search step.
    pub hits: u16,
}

impl BucketHits {
    const fn idle() -> Self {
        BucketHits {
            bk: INVALID_IDX,
            hits: 0,
        }
    }
}

#[derive(Clone, Copy)]
pub(crate) struct PipelineCtx {
    pub bk: [BucketHits; 2],
    pub hash: HashPair,
    /// Request slot this context is working, `INVALID_REQ` when idle.
    pub req: u32,
    pub state: CtxState,
}

impl PipelineCtx {
    const fn idle() -> Self {
        PipelineCtx {
            bk: [BucketHits::idle(), BucketHits::idle()],
            hash: HashPair::INVALID,
            req: INVALID_REQ,
            state: CtxState::PrefetchKey,
        }
    }
}

pub(crate) struct PipelineEngine {
    pub ctx: [PipelineCtx; CTX_POOL_MAX],
    pub pool_size: usize,
    /// Next request slot to hand out.
    pub next: usize,
    /// Requests resolved to a node so far in this batch.
    pub node_nb: usize,
}

impl PipelineEngine {
    pub fn new(pool_size: usize) -> Self {
        debug_assert!(pool_size >= 1 && pool_size <= CTX_POOL_MAX);
        PipelineEngine {
            ctx: [PipelineCtx::idle(); CTX_POOL_MAX],
            pool_size,
            next: 0,
            node_nb: 0,
        }
    }

    /// Arms the pool for a fresh batch, staggering the initial states.
    pub fn begin(&mut self) {
        self.next = 0;
        self.node_nb = 0;
        for (i, ctx) in self.ctx[..self.pool_size].iter_mut().enumerate() {
            *ctx = PipelineCtx::idle();
            ctx.state = match i % 3 {
                0 => CtxState::PrefetchKey,
                1 => CtxState::Wait1,
                _ => CtxState::Wait2,
            };
        }
    }

    /// Demotes every context that snapshotted `bk_idx` and is about to
    /// compare keys, forcing it back through the fingerprint search. This is
    /// the single cross-context hazard of the whole engine.
    pub fn demote_watchers(&mut self, bk_idx: u32) {
        for ctx in self.ctx[..self.pool_size].iter_mut() {
            if ctx.state != CtxState::CmpKey {
                continue;
            }
            if ctx.bk[0].bk == bk_idx || ctx.bk[1].bk == bk_idx {
                ctx.state = CtxState::RefetchNode;
            }
        }
    }
}
