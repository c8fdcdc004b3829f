use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::model::{BlockId, BlockSet, FragmentId};

type BlockQueue = BinaryHeap<(usize, Reverse<BlockId>)>;

/// 逐对消除重叠：大块优先，每次处理块中一个与邻居重叠的片段。
///
/// 结束后重建链表并断言不再有重叠。
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapsResolver;

impl OverlapsResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self, bs: &mut BlockSet) -> bool {
        let mut changed = false;
        let mut treated = 0usize;
        loop {
            bs.connect();
            if bs.find_overlap().is_none() {
                break;
            }
            let mut queue: BlockQueue = bs.block_ids().into_iter().map(|b| (bs.block(b).len(), Reverse(b))).collect();
            while let Some((_, Reverse(block))) = queue.pop() {
                while bs.has_block(block) {
                    match overlapping_pair(bs, block) {
                        Some((x, y)) => {
                            treat_fragments(bs, &mut queue, x, y);
                            treated += 1;
                            changed = true;
                        }
                        None => break,
                    }
                }
            }
        }
        bs.assert_no_overlaps();
        log::debug!("resolved {} overlapping pairs", treated);
        changed
    }
}

fn overlapping_pair(bs: &BlockSet, block: BlockId) -> Option<(FragmentId, FragmentId)> {
    bs.block(block).iter().find_map(|f| bs.overlapping_neighbor(f).map(|o| (f, o)))
}

fn treat_fragments(bs: &mut BlockSet, queue: &mut BlockQueue, x: FragmentId, y: FragmentId) {
    let (Some(x_block), Some(y_block)) = (bs.block_of(x), bs.block_of(y)) else {
        return;
    };
    let fx = *bs.fragment(x);
    let fy = *bs.fragment(y);
    // 同块内只删除位置完全相同的副本，部分重叠照常切分
    if x_block == y_block && fx.same_place(&fy) {
        bs.erase_fragment(x);
        return;
    }
    let Some(common) = fx.common_fragment(&fy) else {
        return;
    };
    let x_is_common = common == fx;
    if x_is_common && fx.length() == fy.length() {
        if fx.ori != fy.ori {
            bs.inverse_block(y_block);
        }
        bs.merge_blocks(x_block, y_block);
    } else if x_is_common {
        treat_fragments(bs, queue, y, x);
    } else {
        let new_length = if common.begin_pos() == fx.begin_pos() {
            common.length()
        } else {
            fx.begin_pos()
                .abs_diff(common.min_pos)
                .min(fx.begin_pos().abs_diff(common.max_pos))
        };
        if let Some(rest) = bs.split_block(x_block, new_length) {
            queue.push((bs.block(rest).len(), Reverse(rest)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Fragment, Ori, SeqId, Sequence};

    fn f(seq: usize, min: usize, max: usize, ori: Ori) -> Fragment {
        Fragment::new(SeqId(seq), min, max, ori)
    }

    fn set(n: usize, len: usize) -> BlockSet {
        let data: Vec<u8> = b"acgt".iter().cycle().take(len).copied().collect();
        BlockSet::with_sequences((0..n).map(|i| Sequence::new(format!("s{}", i), &data)))
    }

    #[test]
    fn no_overlap_is_no_change() {
        let mut bs = set(1, 20);
        bs.add_block_with([f(0, 0, 4, Ori::Forward), f(0, 5, 9, Ori::Forward)]);
        assert!(!OverlapsResolver::new().run(&mut bs));
        assert_eq!(bs.fragment_count(), 2);
    }

    #[test]
    fn identical_fragments_merge_blocks() {
        let mut bs = set(3, 20);
        let a = bs.add_block_with([f(0, 0, 4, Ori::Forward), f(1, 0, 4, Ori::Forward)]);
        let b = bs.add_block_with([f(0, 0, 4, Ori::Reverse), f(2, 5, 9, Ori::Forward)]);
        assert!(OverlapsResolver::new().run(&mut bs));
        assert_eq!(bs.block_count(), 1);
        assert!(!bs.has_block(b));
        // b 先被翻转，与 a 中的公共片段同向后再并入
        assert_eq!(
            bs.block_fragments(a),
            vec![f(0, 0, 4, Ori::Forward), f(1, 0, 4, Ori::Forward), f(2, 5, 9, Ori::Reverse)]
        );
    }

    #[test]
    fn partial_overlap_splits() {
        let mut bs = set(2, 30);
        bs.add_block_with([f(0, 0, 9, Ori::Forward), f(1, 0, 9, Ori::Forward)]);
        bs.add_block_with([f(0, 5, 14, Ori::Forward), f(1, 15, 24, Ori::Forward)]);
        assert!(OverlapsResolver::new().run(&mut bs));
        assert!(bs.find_overlap().is_none());
        assert_eq!(bs.multiply_covered(), 0);
        assert_eq!(bs.coverage()[0].count_ones(), 15);
        assert_eq!(bs.coverage()[1].count_ones(), 20);
        assert_eq!(bs.block_count(), 3);
    }

    #[test]
    fn same_place_copy_is_erased() {
        let mut bs = set(1, 20);
        bs.add_block_with([f(0, 0, 4, Ori::Forward), f(0, 0, 4, Ori::Reverse)]);
        assert!(OverlapsResolver::new().run(&mut bs));
        assert_eq!(bs.fragment_count(), 1);
        assert_eq!(bs.coverage()[0].count_ones(), 5);
    }

    #[test]
    fn self_overlap_is_cut_into_copies() {
        let mut bs = set(1, 20);
        let b = bs.add_block_with([f(0, 0, 5, Ori::Forward), f(0, 3, 8, Ori::Forward)]);
        assert!(OverlapsResolver::new().run(&mut bs));
        assert_eq!(bs.block_count(), 1);
        assert_eq!(bs.block_fragments(b), vec![f(0, 0, 2, Ori::Forward), f(0, 3, 5, Ori::Forward), f(0, 6, 8, Ori::Forward)]);
        assert_eq!(bs.coverage()[0].count_ones(), 9);
    }

    #[test]
    fn split_pieces_inside_one_block_keep_coverage() {
        // 切分后同一块内出现部分重叠的片段，它们不能被整段删除
        let mut bs = set(2, 20);
        let a = bs.add_block_with([f(0, 15, 16, Ori::Forward), f(1, 1, 2, Ori::Forward)]);
        bs.add_block_with([f(0, 15, 16, Ori::Forward), f(1, 0, 1, Ori::Forward)]);
        let before = bs.coverage();
        assert!(OverlapsResolver::new().run(&mut bs));
        assert!(bs.find_overlap().is_none());
        assert_eq!(bs.multiply_covered(), 0);
        assert_eq!(bs.coverage(), before);
        assert_eq!(bs.block_count(), 1);
        let mut frags = bs.block_fragments(a);
        frags.sort();
        assert_eq!(
            frags,
            vec![
                f(0, 15, 15, Ori::Forward),
                f(0, 16, 16, Ori::Forward),
                f(1, 0, 0, Ori::Forward),
                f(1, 1, 1, Ori::Forward),
                f(1, 2, 2, Ori::Forward),
            ]
        );
    }
}
