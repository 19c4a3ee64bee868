//! Flow cache: a 2-choice hash table with 16-lane buckets, SIMD fingerprint
//! search and a software-pipelined bulk lookup engine.
//!
//! Every key owns two candidate buckets (`h0 & mask`, `h1 & mask`) and one
//! fingerprint (`h0 ^ h1`). Lookup sweeps both buckets with the search
//! kernel and resolves fingerprint hits by full key comparison; a miss
//! inserts on the spot, relocating resident lanes to their alternate bucket
//! (bounded kick-out) when both candidates are full. All storage is
//! allocated once at construction.

pub mod bucket;
pub mod hash;
pub mod key;
pub mod node;
mod pipeline;
mod pool;
mod prefetch;
pub mod search;

use core::fmt;
use core::mem;

use crate::error::RelqError;
use crate::hint::{likely, unlikely};

use self::bucket::{Bucket, BUCKET_ENTRY_SZ, INVALID_HVAL, INVALID_IDX};
use self::hash::HashFn;
use self::key::{FlowKey, HashPair};
use self::node::{null_node_init, FlowNode, NodeId, NodeInit};
use self::pipeline::{CtxState, PipelineCtx, PipelineEngine, CTX_POOL_MAX, INVALID_REQ};
use self::pool::IdxPool;
use self::search::SearchKernel;

pub use self::pipeline::PIPELINE_NB;

/// Smallest internal node count (`BUCKET_ENTRY_SZ`³).
pub const NB_ENTRIES_MIN: usize = BUCKET_ENTRY_SZ * BUCKET_ENTRY_SZ * BUCKET_ENTRY_SZ;

/// Kick-out recursion bound.
pub const MAX_DEPTH: u32 = 2;

/// Internal node count for a requested capacity: headroom of 16/13, floored
/// at [`NB_ENTRIES_MIN`], rounded to the next power of two.
fn nb_nodes(requested: usize) -> usize {
    let mut nb = requested * 16 / 13;
    if nb < NB_ENTRIES_MIN {
        nb = NB_ENTRIES_MIN;
    }
    nb.next_power_of_two()
}

fn nb_buckets(nodes: usize) -> usize {
    nodes / BUCKET_ENTRY_SZ
}

/// Exact byte footprint of a cache after capacity rounding. Lets callers
/// budget ahead of [`FlowCache::new`].
pub fn footprint(requested: usize) -> usize {
    let nodes = nb_nodes(requested);
    mem::size_of::<FlowCache>()
        + nb_buckets(nodes) * mem::size_of::<Bucket>()
        + nodes * mem::size_of::<FlowNode>()
        + nodes * mem::size_of::<u32>()
}

/// Construction parameters.
pub struct Config {
    /// Requested live-node capacity; also fixes the load ceiling.
    pub capacity: usize,
    /// Pipeline depth factor: the context pool holds `3·ctx_k` records,
    /// clamped to `3·PIPELINE_NB`. Zero is treated as one.
    pub ctx_k: usize,
    /// Hash kernel override. Defaults to CRC32 where the host supports it,
    /// murmur otherwise.
    pub hash: Option<HashFn>,
    /// Payload initializer run once per allocated node.
    pub node_init: Option<NodeInit>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            capacity: NB_ENTRIES_MIN,
            ctx_k: 3,
            hash: None,
            node_init: None,
        }
    }
}

/// Lookup statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Requests completed across all batches.
    pub completed: u64,
    /// Requests that could not be resolved nor inserted.
    pub fails: u64,
    /// Full key comparisons performed.
    pub key_cmps: u64,
}

pub struct FlowCache {
    bk_mask: u32,
    nb: usize,
    max: usize,
    calc_hash: HashFn,
    node_init: NodeInit,
    kernel: SearchKernel,

    pool: IdxPool,
    buckets: Box<[Bucket]>,
    nodes: Box<[FlowNode]>,

    cnt: u64,
    fails: u64,
    cmp_cnt: u64,

    engine: PipelineEngine,
}

impl FlowCache {
    pub fn new(cfg: Config) -> Result<FlowCache, RelqError> {
        let requested = cfg.capacity;
        // keep the power-of-two rounded node count inside the u32 domain
        if requested
            .checked_mul(16)
            .map(|n| n / 13 >= INVALID_IDX as usize / 2)
            .unwrap_or(true)
        {
            return Err(RelqError::CapacityOverflow(requested));
        }

        let node_nb = nb_nodes(requested);
        let bucket_nb = nb_buckets(node_nb);
        let k = if cfg.ctx_k == 0 { 1 } else { cfg.ctx_k };
        let ctx_pool_size = (k * 3).min(CTX_POOL_MAX);

        Ok(FlowCache {
            bk_mask: bucket_nb as u32 - 1,
            nb: node_nb,
            max: requested.max(BUCKET_ENTRY_SZ) / BUCKET_ENTRY_SZ * 13,
            calc_hash: cfg.hash.unwrap_or_else(hash::detect),
            node_init: cfg.node_init.unwrap_or(null_node_init),
            kernel: SearchKernel::detect(),
            pool: IdxPool::new(node_nb),
            buckets: (0..bucket_nb).map(|_| Bucket::new()).collect(),
            nodes: (0..node_nb).map(|_| FlowNode::blank()).collect(),
            cnt: 0,
            fails: 0,
            cmp_cnt: 0,
            engine: PipelineEngine::new(ctx_pool_size),
        })
    }

    pub fn with_capacity(capacity: usize) -> Result<FlowCache, RelqError> {
        FlowCache::new(Config {
            capacity,
            ..Config::default()
        })
    }

    /// Re-initializes in place: every bucket back to all-ones, the pool back
    /// to identity order, counters zeroed. No reallocation.
    pub fn reset(&mut self) {
        for bk in self.buckets.iter_mut() {
            bk.reset();
        }
        self.pool.reset();
        self.cnt = 0;
        self.fails = 0;
        self.cmp_cnt = 0;
    }

    /// Live node count.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load ceiling: allocation is refused beyond this many live nodes.
    pub fn capacity(&self) -> usize {
        self.max
    }

    /// Internal node-array size after rounding.
    pub fn node_array_len(&self) -> usize {
        self.nb
    }

    pub fn bucket_count(&self) -> usize {
        self.bk_mask as usize + 1
    }

    pub fn mask(&self) -> u32 {
        self.bk_mask
    }

    pub fn kernel(&self) -> &SearchKernel {
        &self.kernel
    }

    pub fn stats(&self) -> Stats {
        Stats {
            completed: self.cnt,
            fails: self.fails,
            key_cmps: self.cmp_cnt,
        }
    }

    /// Runs the configured hash kernel against `key`.
    pub fn hash_of(&self, key: &FlowKey) -> HashPair {
        (self.calc_hash)(key, self.bk_mask)
    }

    pub fn node(&self, id: NodeId) -> &FlowNode {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut FlowNode {
        &mut self.nodes[id.0 as usize]
    }

    pub fn bucket(&self, idx: u32) -> &Bucket {
        &self.buckets[idx as usize]
    }

    /// Longest-lived allocation, the natural eviction victim.
    pub fn oldest(&self) -> Option<NodeId> {
        self.pool.oldest().map(NodeId)
    }

    /// Resolves `nb = keys.len()` requests, writing each outcome to the
    /// matching `out` slot: the found-or-inserted node, or `None` when the
    /// table had no room. Returns the number of non-`None` outcomes.
    ///
    /// With `with_hash` the kernel is bypassed and `key.hash` is trusted.
    pub fn find_bulk(
        &mut self,
        keys: &[FlowKey],
        out: &mut [Option<NodeId>],
        with_hash: bool,
    ) -> usize {
        assert!(out.len() >= keys.len(), "output slice too short");
        let nb = keys.len();
        if nb == 0 {
            return 0;
        }
        let hash_fn: HashFn = if with_hash {
            hash::read_hash
        } else {
            self.calc_hash
        };

        self.pool.prefetch_next(&self.nodes, 2);
        self.engine.begin();

        let mut done = 0;
        while done < nb {
            for i in 0..self.engine.pool_size {
                if done >= nb {
                    break;
                }
                done += self.step_ctx(i, keys, out, nb, hash_fn);
            }
        }
        self.cnt += done as u64;
        self.engine.node_nb
    }

    /// Single-key sugar over [`find_bulk`](FlowCache::find_bulk).
    pub fn find_oneshot(&mut self, key: &FlowKey) -> Option<NodeId> {
        let mut out = [None];
        self.find_bulk(core::slice::from_ref(key), &mut out, false);
        out[0]
    }

    /// Clears the bucket lane pointing at `node` and returns its index to
    /// the pool. The handle is dead afterwards.
    pub fn free_node(&mut self, node: NodeId) {
        if let Some((bk, pos)) = self.locate_node(node.0) {
            self.buckets[bk as usize].clear(pos);
        }
        self.pool.free(&mut self.nodes, node.0);
    }

    /// Visits every live node in bucket order. Stops early when `f` returns
    /// `true`; the return value reports whether that happened.
    pub fn walk<F>(&self, mut f: F) -> bool
    where
        F: FnMut(NodeId, &FlowNode) -> bool,
    {
        for bk in self.buckets.iter() {
            for pos in 0..BUCKET_ENTRY_SZ {
                if bk.hval[pos] != INVALID_HVAL {
                    let id = NodeId(bk.idx[pos]);
                    if f(id, &self.nodes[bk.idx[pos] as usize]) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Bucket currently holding `node`, if any.
    pub fn current_bucket(&self, node: NodeId) -> Option<u32> {
        self.locate_node(node.0).map(|(bk, _)| bk)
    }

    /// The other candidate of `node`'s current bucket.
    pub fn another_bucket(&self, node: NodeId) -> Option<u32> {
        let (bk, pos) = self.locate_node(node.0)?;
        Some(self.alt_bucket(bk, pos))
    }

    /// Empty lanes in the bucket at `idx`.
    pub fn empty_slots(&self, idx: u32) -> u32 {
        self.empty_mask(idx).count_ones()
    }

    /// Test hook: force-relocates `node` to its alternate bucket. Fails
    /// when the alternate is full.
    pub fn flip_node(&mut self, node: NodeId) -> bool {
        match self.locate_node(node.0) {
            Some((bk, pos)) => self.flipflop_bucket(bk, pos),
            None => false,
        }
    }

    /// Full structural check of one node against a probe key: key bytes,
    /// reachability, stored hash and the candidate-pair xor law.
    pub fn verify_node(&self, node: NodeId, key: &FlowKey) -> Result<(), RelqError> {
        let stored = &self.nodes[node.0 as usize];
        if !self.kernel.key_eq(&stored.key, key) {
            return Err(RelqError::KeyMismatch);
        }
        let (bk, pos) = self.locate_node(node.0).ok_or(RelqError::Unreachable)?;
        let ano = self.alt_bucket(bk, pos);

        let hash = self.hash_of(&stored.key);
        if hash != stored.key.hash {
            return Err(RelqError::HashMismatch);
        }
        if (hash.hval() ^ ano) & self.bk_mask != bk {
            return Err(RelqError::BucketMismatch);
        }
        Ok(())
    }

    /*
     * pipeline driver
     */

    fn step_ctx(
        &mut self,
        i: usize,
        keys: &[FlowKey],
        out: &mut [Option<NodeId>],
        nb: usize,
        hash_fn: HashFn,
    ) -> usize {
        let mut ctx = self.engine.ctx[i];
        let mut done = 0;

        match ctx.state {
            CtxState::Wait2 => ctx.state = CtxState::Wait1,
            CtxState::Wait1 => ctx.state = CtxState::PrefetchKey,

            CtxState::PrefetchKey => {
                if self.engine.next < nb {
                    ctx.req = self.engine.next as u32;
                    self.engine.next += 1;
                    prefetch::read_low(&keys[ctx.req as usize]);
                    ctx.state = CtxState::FetchBucket;
                }
            }

            CtxState::FetchBucket => {
                let key = &keys[ctx.req as usize];
                ctx.hash = hash_fn(key, self.bk_mask);
                ctx.bk[0].bk = ctx.hash.h0() & self.bk_mask;
                ctx.bk[0].hits = 0;
                ctx.bk[1].bk = ctx.hash.h1() & self.bk_mask;
                ctx.bk[1].hits = 0;
                prefetch::read_high(&self.buckets[ctx.bk[0].bk as usize]);
                prefetch::read_high(&self.buckets[ctx.bk[1].bk as usize]);
                ctx.state = CtxState::FetchNode;
            }

            CtxState::FetchNode => {
                self.search_both(&mut ctx);
                ctx.state = CtxState::CmpKey;
            }

            // A demoted context re-reads the fingerprints and resolves in
            // the same pass; the data is already hot.
            CtxState::RefetchNode | CtxState::CmpKey => {
                if ctx.state == CtxState::RefetchNode {
                    self.search_both(&mut ctx);
                }
                let key = &keys[ctx.req as usize];
                let mut node = self.match_in_bucket(ctx.bk[0].bk, ctx.bk[0].hits, key);
                if node.is_none() {
                    node = self.match_in_bucket(ctx.bk[1].bk, ctx.bk[1].hits, key);
                }
                let node = match node {
                    Some(n) => Some(n),
                    None => self.insert_node(&ctx, key),
                };

                out[ctx.req as usize] = node.map(NodeId);
                if likely(node.is_some()) {
                    self.engine.node_nb += 1;
                } else {
                    self.fails += 1;
                }
                done = 1;
                ctx.req = INVALID_REQ;
                ctx.state = CtxState::PrefetchKey;
            }
        }

        self.engine.ctx[i] = ctx;
        done
    }

    /// Fingerprint search over both candidate buckets, prefetching every
    /// node a hit points at.
    fn search_both(&self, ctx: &mut PipelineCtx) {
        let hval = ctx.hash.hval();
        for view in ctx.bk.iter_mut() {
            let bk = &self.buckets[view.bk as usize];
            let hits = self.kernel.find_16x32(&bk.hval, hval);
            view.hits = hits;

            let mut m = hits;
            while m != 0 {
                let pos = m.trailing_zeros() as usize;
                let nidx = bk.idx[pos];
                if likely(nidx != INVALID_IDX) {
                    prefetch::read_once(&self.nodes[nidx as usize]);
                }
                m &= m - 1;
            }
        }
    }

    /// Resolves fingerprint hits by full key comparison.
    fn match_in_bucket(&mut self, bk_idx: u32, hits: u16, key: &FlowKey) -> Option<u32> {
        let mut m = hits;
        while m != 0 {
            let pos = m.trailing_zeros() as usize;
            let nidx = self.buckets[bk_idx as usize].idx[pos];
            if likely(nidx != INVALID_IDX) {
                self.cmp_cnt += 1;
                if self.kernel.key_eq(&self.nodes[nidx as usize].key, key) {
                    return Some(nidx);
                }
            }
            m &= m - 1;
        }
        None
    }

    /*
     * cuckoo engine
     */

    #[inline]
    fn empty_mask(&self, bk_idx: u32) -> u16 {
        self.kernel
            .find_16x32(&self.buckets[bk_idx as usize].hval, INVALID_HVAL)
    }

    /// Alternate candidate of the occupant of `(bk_idx, pos)`.
    #[inline]
    fn alt_bucket(&self, bk_idx: u32, pos: usize) -> u32 {
        (bk_idx ^ self.buckets[bk_idx as usize].hval[pos]) & self.bk_mask
    }

    /// Moves one lane to the lowest empty lane of its alternate bucket and
    /// demotes every in-flight context that snapshotted either side.
    fn flipflop_bucket(&mut self, src: u32, src_pos: usize) -> bool {
        let dst = self.alt_bucket(src, src_pos);
        let empty = self.empty_mask(dst);
        if empty == 0 {
            return false;
        }
        let dst_pos = empty.trailing_zeros() as usize;

        let (hval, nidx) = {
            let s = &mut self.buckets[src as usize];
            let moved = (s.hval[src_pos], s.idx[src_pos]);
            s.clear(src_pos);
            moved
        };
        self.buckets[dst as usize].set(dst_pos, nidx, hval);

        self.engine.demote_watchers(dst);
        self.engine.demote_watchers(src);
        true
    }

    /// Bounded recursive kick-out: tries to empty one lane of `bk_idx`,
    /// first by direct relocation, then by clearing space in the alternate
    /// buckets one level down. Returns the freed lane.
    fn kickout_node(&mut self, bk_idx: u32, depth: u32) -> Option<usize> {
        if depth == 0 {
            return None;
        }
        for pos in 0..BUCKET_ENTRY_SZ {
            if self.flipflop_bucket(bk_idx, pos) {
                return Some(pos);
            }
        }
        for pos in 0..BUCKET_ENTRY_SZ {
            let alt = self.alt_bucket(bk_idx, pos);
            if self.kickout_node(alt, depth - 1).is_none() {
                continue;
            }
            if self.flipflop_bucket(bk_idx, pos) {
                return Some(pos);
            }
        }
        None
    }

    /// Places a new node for `key`. Primary bucket first, lowest empty lane
    /// first; kick-out only when both candidates are full. `None` when the
    /// load ceiling is reached or kick-out fails at both candidates.
    fn insert_node(&mut self, ctx: &PipelineCtx, key: &FlowKey) -> Option<u32> {
        if unlikely(self.pool.len() >= self.max) {
            return None;
        }

        let (bk_idx, pos);
        let empty0 = self.empty_mask(ctx.bk[0].bk);
        if empty0 != 0 {
            bk_idx = ctx.bk[0].bk;
            pos = empty0.trailing_zeros() as usize;
        } else {
            let empty1 = self.empty_mask(ctx.bk[1].bk);
            if empty1 != 0 {
                bk_idx = ctx.bk[1].bk;
                pos = empty1.trailing_zeros() as usize;
            } else {
                match self.kickout_node(ctx.bk[0].bk, MAX_DEPTH) {
                    Some(p) => {
                        bk_idx = ctx.bk[0].bk;
                        pos = p;
                    }
                    None => match self.kickout_node(ctx.bk[1].bk, MAX_DEPTH) {
                        Some(p) => {
                            bk_idx = ctx.bk[1].bk;
                            pos = p;
                        }
                        None => return None,
                    },
                }
            }
        }

        let nidx = self.pool.alloc(&mut self.nodes)?;
        self.buckets[bk_idx as usize].set(pos, nidx, ctx.hash.hval());
        {
            let node = &mut self.nodes[nidx as usize];
            node.key = *key;
            node.key.hash = ctx.hash;
        }
        (self.node_init)(&mut self.nodes[nidx as usize]);

        self.engine.demote_watchers(bk_idx);
        Some(nidx)
    }

    /// Finds the bucket lane holding node index `nidx` by probing both of
    /// its candidates with the index-row search.
    fn locate_node(&self, nidx: u32) -> Option<(u32, usize)> {
        let hash = self.nodes[nidx as usize].key.hash;
        for which in 0..2 {
            let bk = hash.half(which) & self.bk_mask;
            let hits = self
                .kernel
                .find_16x32(&self.buckets[bk as usize].idx, nidx);
            if hits != 0 {
                return Some((bk, hits.trailing_zeros() as usize));
            }
        }
        None
    }
}

impl fmt::Debug for FlowCache {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FlowCache")
            .field("mask", &format_args!("{:08x}", self.bk_mask))
            .field("nb", &self.nb)
            .field("max", &self.max)
            .field("len", &self.len())
            .field("kernel", &self.kernel)
            .field("cnt", &self.cnt)
            .field("fails", &self.fails)
            .field("cmp_cnt", &self.cmp_cnt)
            .finish()
    }
}
