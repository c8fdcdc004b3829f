use std::sync::Arc;

use bitvec::prelude::*;

use super::{Block, BlockId, Fragment, FragmentId, Ori, SeqId, Sequence};

#[derive(Debug, Clone)]
struct Slot {
    frag: Fragment,
    block: Option<BlockId>,
    prev: Option<FragmentId>,
    next: Option<FragmentId>,
}

/// 持有全部片段与块的 arena。
///
/// 片段与块都通过稳定句柄访问；删除后槽位置空，句柄不复用，
/// 直到 [`BlockSet::compact`] 回收空槽并重新编号。
/// 同一序列上的片段按 `(min_pos, max_pos, ori)` 串成双向链表，
/// 链表只在 [`BlockSet::connect`] 时整体重建，其余操作做局部修补。
#[derive(Debug, Clone, Default)]
pub struct BlockSet {
    seqs: Vec<Arc<Sequence>>,
    fragments: Vec<Option<Slot>>,
    blocks: Vec<Option<Block>>,
    live_fragments: usize,
    live_blocks: usize,
}

impl BlockSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sequences<I: IntoIterator<Item = Sequence>>(seqs: I) -> Self {
        let mut bs = Self::new();
        for s in seqs {
            bs.add_sequence(s);
        }
        bs
    }

    // ---------------- 序列 ----------------

    pub fn add_sequence(&mut self, seq: Sequence) -> SeqId {
        self.add_shared_sequence(Arc::new(seq))
    }

    pub fn add_shared_sequence(&mut self, seq: Arc<Sequence>) -> SeqId {
        self.seqs.push(seq);
        SeqId(self.seqs.len() - 1)
    }

    pub fn sequences(&self) -> &[Arc<Sequence>] {
        &self.seqs
    }

    pub fn seq(&self, id: SeqId) -> &Sequence {
        &self.seqs[id.0]
    }

    pub fn seq_by_name(&self, name: &str) -> Option<SeqId> {
        self.seqs.iter().position(|s| s.name() == name).map(SeqId)
    }

    // ---------------- 访问 ----------------

    pub fn block_count(&self) -> usize {
        self.live_blocks
    }

    pub fn fragment_count(&self) -> usize {
        self.live_fragments
    }

    pub fn is_empty(&self) -> bool {
        self.block_count() == 0
    }

    /// 按句柄升序返回所有存活块
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_some())
            .map(|(i, _)| BlockId(i))
            .collect()
    }

    pub fn has_block(&self, id: BlockId) -> bool {
        matches!(self.blocks.get(id.0), Some(Some(_)))
    }

    pub fn block(&self, id: BlockId) -> &Block {
        match self.blocks.get(id.0) {
            Some(Some(b)) => b,
            _ => panic!("stale block handle {:?}", id),
        }
    }

    fn block_mut(&mut self, id: BlockId) -> &mut Block {
        match self.blocks.get_mut(id.0) {
            Some(Some(b)) => b,
            _ => panic!("stale block handle {:?}", id),
        }
    }

    /// 块内片段坐标的拷贝，顺序与块内顺序一致
    pub fn block_fragments(&self, id: BlockId) -> Vec<Fragment> {
        self.block(id).iter().map(|f| *self.fragment(f)).collect()
    }

    pub fn fragment_ids(&self) -> impl Iterator<Item = FragmentId> + '_ {
        self.fragments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| FragmentId(i))
    }

    pub fn has_fragment(&self, id: FragmentId) -> bool {
        matches!(self.fragments.get(id.0), Some(Some(_)))
    }

    fn slot(&self, id: FragmentId) -> &Slot {
        match self.fragments.get(id.0) {
            Some(Some(s)) => s,
            _ => panic!("stale fragment handle {:?}", id),
        }
    }

    fn slot_mut(&mut self, id: FragmentId) -> &mut Slot {
        match self.fragments.get_mut(id.0) {
            Some(Some(s)) => s,
            _ => panic!("stale fragment handle {:?}", id),
        }
    }

    pub fn fragment(&self, id: FragmentId) -> &Fragment {
        &self.slot(id).frag
    }

    /// 替换片段坐标；链表不会自动调整，需要之后 `connect`
    pub fn set_fragment(&mut self, id: FragmentId, frag: Fragment) {
        assert!(frag.valid(self.seq(frag.seq).len()), "invalid fragment {:?}", frag);
        self.slot_mut(id).frag = frag;
    }

    pub fn block_of(&self, id: FragmentId) -> Option<BlockId> {
        self.slot(id).block
    }

    pub fn prev(&self, id: FragmentId) -> Option<FragmentId> {
        self.slot(id).prev
    }

    pub fn next(&self, id: FragmentId) -> Option<FragmentId> {
        self.slot(id).next
    }

    /// 序列坐标方向上的邻居：Forward 为 next，Reverse 为 prev
    pub fn neighbor(&self, id: FragmentId, dir: Ori) -> Option<FragmentId> {
        match dir {
            Ori::Forward => self.next(id),
            Ori::Reverse => self.prev(id),
        }
    }

    /// 片段自身方向上的邻居
    pub fn logical_neighbor(&self, id: FragmentId, dir: Ori) -> Option<FragmentId> {
        self.neighbor(id, self.fragment(id).ori * dir)
    }

    // ---------------- 修改 ----------------

    pub fn add_block(&mut self) -> BlockId {
        self.blocks.push(Some(Block::new()));
        self.live_blocks += 1;
        BlockId(self.blocks.len() - 1)
    }

    pub fn add_block_with<I: IntoIterator<Item = Fragment>>(&mut self, frags: I) -> BlockId {
        let id = self.add_block();
        for f in frags {
            self.insert_fragment(id, f);
        }
        id
    }

    /// 向块中插入片段。片段必须指向已登记的序列且坐标合法，
    /// 块内不得已有完全相同的片段。
    pub fn insert_fragment(&mut self, block: BlockId, frag: Fragment) -> FragmentId {
        assert!(frag.seq.0 < self.seqs.len(), "fragment refers to unknown sequence {:?}", frag.seq);
        assert!(frag.valid(self.seq(frag.seq).len()), "invalid fragment {:?}", frag);
        assert!(
            !self.block(block).iter().any(|f| *self.fragment(f) == frag),
            "duplicate fragment {:?} in block {:?}",
            frag,
            block
        );
        self.fragments.push(Some(Slot { frag, block: Some(block), prev: None, next: None }));
        self.live_fragments += 1;
        let id = FragmentId(self.fragments.len() - 1);
        self.block_mut(block).push(id);
        id
    }

    /// 删除片段：从链表摘除、从所属块移除，句柄失效
    pub fn erase_fragment(&mut self, id: FragmentId) {
        self.disconnect(id);
        if let Some(b) = self.slot(id).block {
            self.block_mut(b).remove(id);
        }
        self.fragments[id.0] = None;
        self.live_fragments -= 1;
    }

    pub fn remove_block(&mut self, id: BlockId) {
        let members = self.block(id).fragments().to_vec();
        for f in members {
            self.erase_fragment(f);
        }
        self.blocks[id.0] = None;
        self.live_blocks -= 1;
    }

    pub fn clear_blocks(&mut self) {
        self.fragments.clear();
        self.blocks.clear();
        self.live_fragments = 0;
        self.live_blocks = 0;
    }

    /// 回收已删除的槽位，存活的片段与块按原有顺序重新编号。
    ///
    /// 之前取得的所有句柄随之失效，只应在没有调用方持有句柄时使用。
    pub fn compact(&mut self) {
        if self.fragments.len() == self.live_fragments && self.blocks.len() == self.live_blocks {
            return;
        }
        let mut frag_map = vec![None; self.fragments.len()];
        for (new, old) in self.fragment_ids().enumerate() {
            frag_map[old.0] = Some(FragmentId(new));
        }
        let mut block_map = vec![None; self.blocks.len()];
        for (new, old) in self.block_ids().into_iter().enumerate() {
            block_map[old.0] = Some(BlockId(new));
        }
        let remap = |id: Option<FragmentId>| id.and_then(|f| frag_map[f.0]);
        self.fragments = std::mem::take(&mut self.fragments)
            .into_iter()
            .flatten()
            .map(|s| Slot {
                frag: s.frag,
                block: s.block.and_then(|b| block_map[b.0]),
                prev: remap(s.prev),
                next: remap(s.next),
            })
            .map(Some)
            .collect();
        self.blocks = std::mem::take(&mut self.blocks)
            .into_iter()
            .flatten()
            .map(|b| {
                let mut nb = Block::new();
                for &f in b.fragments() {
                    if let Some(nf) = frag_map[f.0] {
                        nb.push(nf);
                    }
                }
                Some(nb)
            })
            .collect();
    }

    pub fn inverse_block(&mut self, id: BlockId) {
        let members = self.block(id).fragments().to_vec();
        for f in members {
            self.slot_mut(f).frag.inverse();
        }
    }

    /// 把块中每个长于 `new_length` 的片段切成两段，剩余部分组成新块。
    ///
    /// 剩余片段在链表中先挂到原片段之后，再冒泡到有序位置。
    /// 切分后两块内完全相同的片段只保留一个。
    /// 没有片段被切开时返回 None。
    pub fn split_block(&mut self, id: BlockId, new_length: usize) -> Option<BlockId> {
        let members = self.block(id).fragments().to_vec();
        let mut rests = Vec::new();
        for fid in members {
            let mut frag = *self.fragment(fid);
            if let Some(rest) = frag.split(new_length) {
                self.slot_mut(fid).frag = frag;
                rests.push((fid, rest));
            }
        }
        if rests.is_empty() {
            return None;
        }
        let new_block = self.add_block();
        for (origin, rest) in rests {
            self.find_place(origin);
            if self.block(new_block).iter().any(|o| *self.fragment(o) == rest) {
                continue;
            }
            let rid = self.insert_fragment(new_block, rest);
            self.link_after(rid, origin);
            self.find_place(rid);
        }
        // 长短不一的片段切开后可能在原块内变得完全相同
        let mut kept: Vec<Fragment> = Vec::new();
        for fid in self.block(id).fragments().to_vec() {
            let frag = *self.fragment(fid);
            if kept.contains(&frag) {
                self.erase_fragment(fid);
            } else {
                kept.push(frag);
            }
        }
        Some(new_block)
    }

    /// 把 `from` 的片段并入 `into`，与 `into` 中完全相同的片段被删除，
    /// `from` 随后移除。方向对齐由调用方负责。
    pub fn merge_blocks(&mut self, into: BlockId, from: BlockId) {
        assert_ne!(into, from, "block merged into itself");
        let members = self.block(from).fragments().to_vec();
        for fid in members {
            let frag = *self.fragment(fid);
            let dup = self.block(into).iter().any(|o| *self.fragment(o) == frag);
            if dup {
                self.erase_fragment(fid);
            } else {
                self.block_mut(from).remove(fid);
                self.slot_mut(fid).block = Some(into);
                self.block_mut(into).push(fid);
            }
        }
        self.blocks[from.0] = None;
        self.live_blocks -= 1;
    }

    // ---------------- 链表 ----------------

    fn chain_key(&self, id: FragmentId) -> (usize, usize, Ori, FragmentId) {
        let f = self.fragment(id);
        (f.min_pos, f.max_pos, f.ori, id)
    }

    /// 重建所有序列上的 prev/next 链表
    pub fn connect(&mut self) {
        let mut chains: Vec<Vec<FragmentId>> = vec![Vec::new(); self.seqs.len()];
        for id in self.fragment_ids() {
            chains[self.fragment(id).seq.0].push(id);
        }
        for mut chain in chains {
            chain.sort_by_key(|&id| self.chain_key(id));
            for (i, &id) in chain.iter().enumerate() {
                let prev = if i > 0 { Some(chain[i - 1]) } else { None };
                let next = chain.get(i + 1).copied();
                let slot = self.slot_mut(id);
                slot.prev = prev;
                slot.next = next;
            }
        }
    }

    pub fn disconnect(&mut self, id: FragmentId) {
        let (prev, next) = {
            let s = self.slot(id);
            (s.prev, s.next)
        };
        if let Some(p) = prev {
            self.slot_mut(p).next = next;
        }
        if let Some(n) = next {
            self.slot_mut(n).prev = prev;
        }
        let s = self.slot_mut(id);
        s.prev = None;
        s.next = None;
    }

    /// 把 `id` 挂到 `after` 之后
    pub fn link_after(&mut self, id: FragmentId, after: FragmentId) {
        self.disconnect(id);
        let next = self.slot(after).next;
        {
            let s = self.slot_mut(id);
            s.prev = Some(after);
            s.next = next;
        }
        self.slot_mut(after).next = Some(id);
        if let Some(n) = next {
            self.slot_mut(n).prev = Some(id);
        }
    }

    /// 把 `id` 挂到 `before` 之前
    pub fn link_before(&mut self, id: FragmentId, before: FragmentId) {
        self.disconnect(id);
        let prev = self.slot(before).prev;
        {
            let s = self.slot_mut(id);
            s.prev = prev;
            s.next = Some(before);
        }
        self.slot_mut(before).prev = Some(id);
        if let Some(p) = prev {
            self.slot_mut(p).next = Some(id);
        }
    }

    /// 在链表中把片段冒泡到有序位置
    pub fn find_place(&mut self, id: FragmentId) {
        while let Some(p) = self.prev(id) {
            if self.chain_key(p) <= self.chain_key(id) {
                break;
            }
            self.link_before(id, p);
        }
        while let Some(n) = self.next(id) {
            if self.chain_key(n) >= self.chain_key(id) {
                break;
            }
            self.link_after(id, n);
        }
    }

    // ---------------- 检查 ----------------

    /// 与片段共享位置的链表邻居（先看 prev）
    pub fn overlapping_neighbor(&self, id: FragmentId) -> Option<FragmentId> {
        let f = self.fragment(id);
        [Ori::Reverse, Ori::Forward]
            .into_iter()
            .filter_map(|dir| self.neighbor(id, dir))
            .find(|&o| f.common_positions(self.fragment(o)) > 0)
    }

    pub fn find_overlap(&self) -> Option<(FragmentId, FragmentId)> {
        self.fragment_ids().find_map(|id| self.overlapping_neighbor(id).map(|o| (id, o)))
    }

    pub fn assert_no_overlaps(&self) {
        if let Some((a, b)) = self.find_overlap() {
            let (fa, fb) = (self.fragment(a), self.fragment(b));
            let seq = self.seq(fa.seq);
            panic!("fragments {} and {} overlap", fa.id(seq), fb.id(seq));
        }
    }

    /// 每条序列上被任意片段覆盖的位置
    pub fn coverage(&self) -> Vec<BitVec> {
        let mut cov: Vec<BitVec> = self.seqs.iter().map(|s| bitvec![0; s.len()]).collect();
        for id in self.fragment_ids() {
            let f = self.fragment(id);
            cov[f.seq.0][f.min_pos..=f.max_pos].fill(true);
        }
        cov
    }

    /// 被两个及以上片段覆盖的位置数
    pub fn multiply_covered(&self) -> usize {
        let mut seen: Vec<BitVec> = self.seqs.iter().map(|s| bitvec![0; s.len()]).collect();
        let mut twice: Vec<BitVec> = seen.clone();
        for id in self.fragment_ids() {
            let f = self.fragment(id);
            for pos in f.min_pos..=f.max_pos {
                if seen[f.seq.0][pos] {
                    twice[f.seq.0].set(pos, true);
                } else {
                    seen[f.seq.0].set(pos, true);
                }
            }
        }
        twice.iter().map(|b| b.count_ones()).sum()
    }
}
