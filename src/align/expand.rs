use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::banded::{AlignerOpt, BandedAligner};
use crate::dispatch::Dispatcher;
use crate::error::ConfigError;
use crate::model::{BlockId, BlockSet, Fragment, Ori, Sequence};

pub mod defaults {
    pub const BATCH: usize = 100;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandOpt {
    /// 每轮尝试延长的长度
    pub batch: usize,
    /// 不越过链表中的相邻片段
    pub avoid_overlaps: bool,
    pub aligner: AlignerOpt,
    pub workers: usize,
}

impl Default for ExpandOpt {
    fn default() -> Self {
        Self { batch: defaults::BATCH, avoid_overlaps: false, aligner: AlignerOpt::default(), workers: 1 }
    }
}

impl ExpandOpt {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch < 1 {
            return Err(ConfigError::too_small("batch", 1, self.batch as i64));
        }
        if self.workers < 1 {
            return Err(ConfigError::too_small("workers", 1, self.workers as i64));
        }
        self.aligner.validate()
    }
}

/// 扩展时的片段：坐标加上允许到达的范围 `[lo, hi_end)`
#[derive(Debug, Clone, Copy)]
struct Member {
    frag: Fragment,
    lo: usize,
    hi_end: usize,
}

impl Member {
    /// 沿片段方向还能延长的长度
    fn space(&self) -> usize {
        self.space_within(self.lo, self.hi_end)
    }

    fn space_within(&self, lo: usize, hi_end: usize) -> usize {
        match self.frag.ori {
            Ori::Forward => hi_end.saturating_sub(self.frag.max_pos + 1),
            Ori::Reverse => self.frag.min_pos.saturating_sub(lo),
        }
    }

    /// 末端之后 `len` 个位置的文本（沿片段方向）
    fn tail_text(&self, seq: &Sequence, len: usize) -> Vec<u8> {
        let f = self.frag;
        let start = match f.ori {
            Ori::Forward => f.max_pos + 1,
            Ori::Reverse => f.min_pos - len,
        };
        seq.substr(start, len, f.ori)
    }
}

/// 按块把片段向两端同步延长，直到比对代价超出预算。
pub struct Expander {
    opt: ExpandOpt,
    aligner: BandedAligner,
}

impl Expander {
    pub fn new(opt: ExpandOpt) -> Result<Self, ConfigError> {
        opt.validate()?;
        let aligner = BandedAligner::new(opt.aligner)?;
        Ok(Self { opt, aligner })
    }

    pub fn opt(&self) -> &ExpandOpt {
        &self.opt
    }

    /// 一个新的比对器实例，供调用方在单线程中反复使用
    pub fn aligner(&self) -> BandedAligner {
        self.aligner.clone()
    }

    /// 第 `i` 个成员的可延长长度。避免重叠时，同一序列上其他成员的
    /// 当前坐标也是边界，同块内相向的片段因此不会争抢同一段空隙。
    fn room_of(&self, members: &[Member], i: usize) -> usize {
        let m = &members[i];
        if !self.opt.avoid_overlaps {
            return m.space();
        }
        let (mut lo, mut hi_end) = (m.lo, m.hi_end);
        for (j, o) in members.iter().enumerate() {
            if j == i || o.frag.seq != m.frag.seq {
                continue;
            }
            if o.frag.min_pos > m.frag.max_pos {
                hi_end = hi_end.min(o.frag.min_pos);
            }
            if o.frag.max_pos < m.frag.min_pos {
                lo = lo.max(o.frag.max_pos + 1);
            }
        }
        m.space_within(lo, hi_end)
    }

    /// 只延长末端。参考片段为第一个成员。
    ///
    /// 每轮先按比对结果延长，再判断是否继续：参考片段本轮延长不足
    /// `batch` 的一半（含零）时停止，因此序列末尾不足一整轮的部分也会被吸收。
    fn expand_end(&self, members: &mut [Member], seqs: &[Arc<Sequence>], aligner: &mut BandedAligner) -> bool {
        let batch = self.opt.batch;
        let mut changed = false;
        let mut results = Vec::with_capacity(members.len());
        loop {
            let rooms: Vec<usize> = (0..members.len()).map(|i| self.room_of(members, i).min(batch)).collect();
            if rooms.iter().any(|&r| r == 0) {
                break;
            }
            let reference = members[0];
            let ref_text = reference.tail_text(&seqs[reference.frag.seq.0], rooms[0]);
            results.clear();
            let mut min_ref = usize::MAX;
            for (i, m) in members.iter().enumerate().skip(1) {
                let text = m.tail_text(&seqs[m.frag.seq.0], rooms[i]);
                let res = aligner.align(&ref_text, &text);
                min_ref = min_ref.min(res.first_len);
                results.push(res);
            }
            members[0].frag.extend_end(min_ref);
            changed |= min_ref > 0;
            for (i, res) in results.iter().enumerate() {
                let surplus = res.first_len - min_ref;
                let room = self.room_of(members, i + 1).min(rooms[i + 1]);
                let shift = res.second_len.saturating_sub(surplus).min(room);
                members[i + 1].frag.extend_end(shift);
                changed |= shift > 0;
            }
            if 2 * min_ref < batch || min_ref == 0 {
                break;
            }
        }
        changed
    }

    /// 计算块的新坐标；无法延长时返回 None
    pub fn plan_block(&self, bs: &BlockSet, block: BlockId, aligner: &mut BandedAligner) -> Option<Vec<Fragment>> {
        let ids = bs.block(block).fragments();
        if ids.len() < 2 {
            return None;
        }
        let mut members: Vec<Member> = ids
            .iter()
            .map(|&id| {
                let frag = *bs.fragment(id);
                let (mut lo, mut hi_end) = (0, bs.seq(frag.seq).len());
                if self.opt.avoid_overlaps {
                    if let Some(p) = bs.prev(id) {
                        lo = bs.fragment(p).max_pos + 1;
                    }
                    if let Some(n) = bs.next(id) {
                        hi_end = bs.fragment(n).min_pos;
                    }
                }
                Member { frag, lo, hi_end }
            })
            .collect();

        let seqs = bs.sequences();
        let mut changed = self.expand_end(&mut members, seqs, aligner);
        members.iter_mut().for_each(|m| m.frag.inverse());
        changed |= self.expand_end(&mut members, seqs, aligner);
        members.iter_mut().for_each(|m| m.frag.inverse());

        changed.then(|| members.into_iter().map(|m| m.frag).collect())
    }

    /// 单个块就地扩展，写回后把片段移回链表中的有序位置
    pub fn expand_block(&self, bs: &mut BlockSet, block: BlockId, aligner: &mut BandedAligner) -> bool {
        match self.plan_block(bs, block, aligner) {
            Some(frags) => {
                apply_plan(bs, block, frags);
                for id in bs.block(block).fragments().to_vec() {
                    bs.find_place(id);
                }
                true
            }
            None => false,
        }
    }

    /// 重建链表后计算所有块的新坐标并写回。
    ///
    /// 不避免重叠时各块互不影响，并行计算后统一写回；
    /// 避免重叠时按块句柄顺序逐块扩展并立即写回，后面的块以前面块扩展后的坐标为界。
    pub fn run(&self, bs: &mut BlockSet) -> Result<bool, ConfigError> {
        bs.connect();
        let dispatcher = Dispatcher::new(self.opt.workers)?;
        let blocks: Vec<BlockId> = bs.block_ids().into_iter().filter(|&b| bs.block(b).len() >= 2).collect();

        if self.opt.avoid_overlaps {
            let mut aligner = self.aligner();
            let mut expanded = 0;
            for &block in &blocks {
                if self.expand_block(bs, block, &mut aligner) {
                    expanded += 1;
                }
            }
            log::info!("expanded {} of {} blocks", expanded, blocks.len());
            bs.connect();
            return Ok(expanded > 0);
        }

        let snapshot: &BlockSet = bs;
        let parts = dispatcher.fold_claimed(
            &blocks,
            || (self.aligner(), Vec::new()),
            |(aligner, plans): &mut (BandedAligner, Vec<(BlockId, Vec<Fragment>)>), _, &block| {
                if let Some(frags) = self.plan_block(snapshot, block, aligner) {
                    plans.push((block, frags));
                }
            },
        );
        let mut plans: Vec<(BlockId, Vec<Fragment>)> = parts.into_iter().flat_map(|(_, p)| p).collect();
        plans.sort_by_key(|(b, _)| *b);

        let changed = !plans.is_empty();
        log::info!("expanded {} of {} blocks", plans.len(), blocks.len());
        for (block, frags) in plans {
            apply_plan(bs, block, frags);
        }
        bs.connect();
        Ok(changed)
    }
}

fn apply_plan(bs: &mut BlockSet, block: BlockId, frags: Vec<Fragment>) {
    let ids = bs.block(block).fragments().to_vec();
    for (id, f) in ids.into_iter().zip(frags) {
        bs.set_fragment(id, f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SeqId;
    use crate::util::dna;

    const BASE: &[u8] = b"gattacacgtttagcgcatgacctgaaggtcacttgcaaatcgcgtcagtaccgtatgga";

    fn opt(batch: usize) -> ExpandOpt {
        ExpandOpt { batch, ..ExpandOpt::default() }
    }

    fn expand(bs: &mut BlockSet, o: ExpandOpt) -> bool {
        Expander::new(o).unwrap().run(bs).unwrap()
    }

    #[test]
    fn identical_sequences_grow_to_full_length() {
        let mut bs = BlockSet::with_sequences([Sequence::new("a", BASE), Sequence::new("b", BASE)]);
        let b = bs.add_block_with([
            Fragment::new(SeqId(0), 20, 29, Ori::Forward),
            Fragment::new(SeqId(1), 20, 29, Ori::Forward),
        ]);
        assert!(expand(&mut bs, opt(10)));
        assert_eq!(
            bs.block_fragments(b),
            vec![Fragment::new(SeqId(0), 0, 59, Ori::Forward), Fragment::new(SeqId(1), 0, 59, Ori::Forward)]
        );
    }

    #[test]
    fn reverse_fragment_grows_the_other_way() {
        let mut bs = BlockSet::with_sequences([Sequence::new("a", BASE), Sequence::new("b", &dna::revcomp(BASE))]);
        let b = bs.add_block_with([
            Fragment::new(SeqId(0), 20, 29, Ori::Forward),
            Fragment::new(SeqId(1), 30, 39, Ori::Reverse),
        ]);
        assert!(expand(&mut bs, opt(10)));
        assert_eq!(
            bs.block_fragments(b),
            vec![Fragment::new(SeqId(0), 0, 59, Ori::Forward), Fragment::new(SeqId(1), 0, 59, Ori::Reverse)]
        );
    }

    #[test]
    fn boundary_block_is_unchanged() {
        let mut bs = BlockSet::with_sequences([Sequence::new("a", &BASE[..20]), Sequence::new("b", &BASE[..20])]);
        let frags = vec![Fragment::new(SeqId(0), 0, 19, Ori::Forward), Fragment::new(SeqId(1), 0, 19, Ori::Forward)];
        let b = bs.add_block_with(frags.clone());
        assert!(!expand(&mut bs, opt(10)));
        assert_eq!(bs.block_fragments(b), frags);
    }

    #[test]
    fn dissimilar_flanks_stop_expansion() {
        let mut bs = BlockSet::with_sequences([
            Sequence::new("a", b"aaaaaaaaaagattacacgtaaaaaaaaaa"),
            Sequence::new("b", b"ccccccccccgattacacgtcccccccccc"),
        ]);
        let frags = vec![Fragment::new(SeqId(0), 10, 19, Ori::Forward), Fragment::new(SeqId(1), 10, 19, Ori::Forward)];
        let b = bs.add_block_with(frags.clone());
        let ex = Expander::new(opt(10)).unwrap();
        let mut al = ex.aligner();
        assert!(!ex.expand_block(&mut bs, b, &mut al));
        assert_eq!(bs.block_fragments(b), frags);
    }

    #[test]
    fn neighbours_limit_growth() {
        let mut bs = BlockSet::with_sequences([Sequence::new("a", BASE), Sequence::new("b", BASE)]);
        let b = bs.add_block_with([
            Fragment::new(SeqId(0), 20, 29, Ori::Forward),
            Fragment::new(SeqId(1), 20, 29, Ori::Forward),
        ]);
        bs.add_block_with([Fragment::new(SeqId(0), 45, 49, Ori::Forward)]);
        let o = ExpandOpt { avoid_overlaps: true, ..opt(10) };
        assert!(expand(&mut bs, o));
        assert_eq!(
            bs.block_fragments(b),
            vec![Fragment::new(SeqId(0), 0, 44, Ori::Forward), Fragment::new(SeqId(1), 0, 44, Ori::Forward)]
        );
    }

    #[test]
    fn short_tail_is_absorbed() {
        // 33 不是 batch 的整数倍，最后 3 个位置也要并入
        let mut bs = BlockSet::with_sequences([Sequence::new("a", &BASE[..33]), Sequence::new("b", &BASE[..33])]);
        let b = bs.add_block_with([
            Fragment::new(SeqId(0), 10, 19, Ori::Forward),
            Fragment::new(SeqId(1), 10, 19, Ori::Forward),
        ]);
        assert!(expand(&mut bs, opt(10)));
        assert_eq!(
            bs.block_fragments(b),
            vec![Fragment::new(SeqId(0), 0, 32, Ori::Forward), Fragment::new(SeqId(1), 0, 32, Ori::Forward)]
        );
    }

    #[test]
    fn facing_blocks_do_not_share_a_gap() {
        let mut bs = BlockSet::with_sequences([Sequence::new("a", BASE), Sequence::new("b", BASE)]);
        let a = bs.add_block_with([
            Fragment::new(SeqId(0), 10, 19, Ori::Forward),
            Fragment::new(SeqId(1), 10, 19, Ori::Forward),
        ]);
        let b = bs.add_block_with([
            Fragment::new(SeqId(0), 30, 39, Ori::Forward),
            Fragment::new(SeqId(1), 30, 39, Ori::Forward),
        ]);
        let o = ExpandOpt { avoid_overlaps: true, workers: 2, ..opt(10) };
        assert!(expand(&mut bs, o));
        assert!(bs.find_overlap().is_none());
        assert_eq!(bs.multiply_covered(), 0);
        assert_eq!(
            bs.block_fragments(a),
            vec![Fragment::new(SeqId(0), 0, 29, Ori::Forward), Fragment::new(SeqId(1), 0, 29, Ori::Forward)]
        );
        assert_eq!(
            bs.block_fragments(b),
            vec![Fragment::new(SeqId(0), 30, 59, Ori::Forward), Fragment::new(SeqId(1), 30, 59, Ori::Forward)]
        );
        assert!(bs.coverage().iter().all(|c| c.all()));
    }

    #[test]
    fn members_of_one_block_do_not_share_a_gap() {
        // 前半段与后半段互为反向互补，两个片段相向延长
        let mut data = BASE[..30].to_vec();
        data.extend_from_slice(&dna::revcomp(&BASE[..30]));
        let mut bs = BlockSet::with_sequences([Sequence::new("a", &data)]);
        let b = bs.add_block_with([
            Fragment::new(SeqId(0), 10, 19, Ori::Forward),
            Fragment::new(SeqId(0), 40, 49, Ori::Reverse),
        ]);
        let o = ExpandOpt { avoid_overlaps: true, ..opt(10) };
        assert!(expand(&mut bs, o));
        assert_eq!(
            bs.block_fragments(b),
            vec![Fragment::new(SeqId(0), 0, 29, Ori::Forward), Fragment::new(SeqId(0), 30, 59, Ori::Reverse)]
        );
        assert!(bs.find_overlap().is_none());
    }

    #[test]
    fn parallel_run_matches_sequential() {
        let seqs = [Sequence::new("a", BASE), Sequence::new("b", BASE), Sequence::new("c", BASE)];
        let build = || {
            let mut bs = BlockSet::with_sequences(seqs.clone());
            bs.add_block_with([
                Fragment::new(SeqId(0), 5, 9, Ori::Forward),
                Fragment::new(SeqId(1), 5, 9, Ori::Forward),
            ]);
            bs.add_block_with([
                Fragment::new(SeqId(1), 40, 44, Ori::Forward),
                Fragment::new(SeqId(2), 40, 44, Ori::Forward),
            ]);
            bs
        };
        let mut one = build();
        let mut many = build();
        expand(&mut one, opt(4));
        expand(&mut many, ExpandOpt { workers: 2, ..opt(4) });
        for b in one.block_ids() {
            assert_eq!(one.block_fragments(b), many.block_fragments(b));
        }
    }

    #[test]
    fn rejects_zero_batch() {
        assert!(Expander::new(opt(0)).is_err());
    }
}
