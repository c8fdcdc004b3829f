use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::{BlockId, BlockSet, Fragment, Ori};

pub mod defaults {
    pub const MAX_DIST: Option<usize> = Some(0);
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOpt {
    /// 相邻片段之间允许的最大空隙；None 表示不限
    pub max_dist: Option<usize>,
}

impl Default for JoinOpt {
    fn default() -> Self {
        Self { max_dist: defaults::MAX_DIST }
    }
}

impl JoinOpt {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// 合并首尾相接的等大块。
///
/// 若块 `one` 的每个片段在某个逻辑方向上的邻居都属于 `another`，
/// 且方向一致、空隙不超过上限，两块的片段两两连成一个片段。
#[derive(Debug, Clone, Default)]
pub struct Joiner {
    opt: JoinOpt,
}

impl Joiner {
    pub fn new(opt: JoinOpt) -> Result<Self, ConfigError> {
        opt.validate()?;
        Ok(Self { opt })
    }

    pub fn opt(&self) -> &JoinOpt {
        &self.opt
    }

    /// 可以合并时返回合并方向（相对 `one` 中片段的逻辑方向）
    pub fn can_join(&self, bs: &BlockSet, one: BlockId, another: BlockId) -> Option<Ori> {
        if one == another || bs.block(one).len() != bs.block(another).len() {
            return None;
        }
        [Ori::Forward, Ori::Reverse].into_iter().find(|&dir| {
            bs.block(one).iter().all(|f| {
                let Some(n) = bs.logical_neighbor(f, dir) else {
                    return false;
                };
                let (ff, nf) = (bs.fragment(f), bs.fragment(n));
                bs.block_of(n) == Some(another)
                    && ff.seq == nf.seq
                    && ff.ori == nf.ori
                    && self.opt.max_dist.map_or(true, |max| ff.dist_to(nf) <= max)
            })
        })
    }

    /// 把两块合并为新块，返回新块句柄。链表在原位置上修补。
    fn join_blocks(&self, bs: &mut BlockSet, one: BlockId, another: BlockId, dir: Ori) -> BlockId {
        let result = bs.add_block();
        for f in bs.block(one).fragments().to_vec() {
            let n = bs.logical_neighbor(f, dir).unwrap_or_else(|| panic!("joined fragment lost its neighbour"));
            let (ff, nf) = (*bs.fragment(f), *bs.fragment(n));
            let (first, last) = if ff.min_pos < nf.min_pos { (f, n) } else { (n, f) };
            let (prev, next) = (bs.prev(first), bs.next(last));
            bs.erase_fragment(f);
            bs.erase_fragment(n);
            let joined = Fragment::new(ff.seq, ff.min_pos.min(nf.min_pos), ff.max_pos.max(nf.max_pos), ff.ori);
            let id = bs.insert_fragment(result, joined);
            match (prev, next) {
                (Some(p), _) => bs.link_after(id, p),
                (None, Some(n)) => bs.link_before(id, n),
                (None, None) => {}
            }
        }
        bs.remove_block(one);
        bs.remove_block(another);
        result
    }

    /// 尝试合并；`another` 整体反向时先把它翻转，失败则恢复
    fn try_join(&self, bs: &mut BlockSet, one: BlockId, another: BlockId) -> Option<BlockId> {
        let front = bs.block(one).front()?;
        let inverted = [Ori::Forward, Ori::Reverse]
            .into_iter()
            .filter_map(|dir| bs.neighbor(front, dir))
            .find(|&n| bs.block_of(n) == Some(another))
            .is_some_and(|n| bs.fragment(n).ori != bs.fragment(front).ori);
        if inverted {
            bs.inverse_block(another);
        }
        match self.can_join(bs, one, another) {
            Some(dir) => Some(self.join_blocks(bs, one, another, dir)),
            None => {
                if inverted {
                    bs.inverse_block(another);
                }
                None
            }
        }
    }

    fn neighbor_block(bs: &BlockSet, block: BlockId, dir: Ori) -> Option<BlockId> {
        let front = bs.block(block).front()?;
        bs.neighbor(front, dir).and_then(|n| bs.block_of(n))
    }

    pub fn run(&self, bs: &mut BlockSet) -> bool {
        bs.connect();
        let mut order = bs.block_ids();
        order.sort_by_key(|&b| Reverse(bs.block(b).len()));
        let mut joined = 0usize;
        for start in order {
            if !bs.has_block(start) {
                continue;
            }
            let mut block = start;
            for dir in [Ori::Reverse, Ori::Forward] {
                while let Some(other) = Self::neighbor_block(bs, block, dir) {
                    match self.try_join(bs, block, other) {
                        Some(new_block) => {
                            block = new_block;
                            joined += 1;
                        }
                        None => break,
                    }
                }
            }
        }
        bs.connect();
        log::info!("joined {} block pairs", joined);
        joined > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SeqId, Sequence};

    fn f(seq: usize, min: usize, max: usize, ori: Ori) -> Fragment {
        Fragment::new(SeqId(seq), min, max, ori)
    }

    fn set() -> BlockSet {
        let data: Vec<u8> = b"acgt".iter().cycle().take(30).copied().collect();
        BlockSet::with_sequences([Sequence::new("a", &data), Sequence::new("b", &data)])
    }

    fn join(bs: &mut BlockSet, max_dist: Option<usize>) -> bool {
        Joiner::new(JoinOpt { max_dist }).unwrap().run(bs)
    }

    fn only_block(bs: &BlockSet) -> Vec<Fragment> {
        assert_eq!(bs.block_count(), 1);
        bs.block_fragments(bs.block_ids()[0])
    }

    #[test]
    fn adjacent_blocks_are_joined() {
        let mut bs = set();
        bs.add_block_with([f(0, 0, 4, Ori::Forward), f(1, 0, 4, Ori::Forward)]);
        bs.add_block_with([f(0, 5, 9, Ori::Forward), f(1, 5, 9, Ori::Forward)]);
        assert!(join(&mut bs, Some(0)));
        assert_eq!(only_block(&bs), vec![f(0, 0, 9, Ori::Forward), f(1, 0, 9, Ori::Forward)]);
        assert!(bs.find_overlap().is_none());
    }

    #[test]
    fn gap_limit_is_respected() {
        let build = || {
            let mut bs = set();
            bs.add_block_with([f(0, 0, 4, Ori::Forward), f(1, 0, 4, Ori::Forward)]);
            bs.add_block_with([f(0, 7, 11, Ori::Forward), f(1, 6, 10, Ori::Forward)]);
            bs
        };
        let mut strict = build();
        assert!(!join(&mut strict, Some(0)));
        assert_eq!(strict.block_count(), 2);

        let mut loose = build();
        assert!(join(&mut loose, Some(2)));
        assert_eq!(only_block(&loose), vec![f(0, 0, 11, Ori::Forward), f(1, 0, 10, Ori::Forward)]);

        let mut unlimited = build();
        assert!(join(&mut unlimited, None));
        assert_eq!(unlimited.block_count(), 1);
    }

    #[test]
    fn reverse_fragments_join_through_logical_neighbours() {
        let mut bs = set();
        bs.add_block_with([f(0, 0, 4, Ori::Forward), f(1, 10, 14, Ori::Reverse)]);
        bs.add_block_with([f(0, 5, 9, Ori::Forward), f(1, 5, 9, Ori::Reverse)]);
        assert!(join(&mut bs, Some(0)));
        assert_eq!(only_block(&bs), vec![f(0, 0, 9, Ori::Forward), f(1, 5, 14, Ori::Reverse)]);
    }

    #[test]
    fn inverted_neighbour_block_is_flipped() {
        let mut bs = set();
        bs.add_block_with([f(0, 0, 4, Ori::Forward), f(1, 0, 4, Ori::Forward)]);
        bs.add_block_with([f(0, 5, 9, Ori::Reverse), f(1, 5, 9, Ori::Reverse)]);
        assert!(join(&mut bs, Some(0)));
        assert_eq!(only_block(&bs), vec![f(0, 0, 9, Ori::Forward), f(1, 0, 9, Ori::Forward)]);
    }

    #[test]
    fn chain_of_blocks_collapses() {
        let mut bs = set();
        for start in [0, 5, 10] {
            bs.add_block_with([f(0, start, start + 4, Ori::Forward), f(1, start, start + 4, Ori::Forward)]);
        }
        assert!(join(&mut bs, Some(0)));
        assert_eq!(only_block(&bs), vec![f(0, 0, 14, Ori::Forward), f(1, 0, 14, Ori::Forward)]);
    }

    #[test]
    fn different_sizes_are_not_joined() {
        let mut bs = set();
        bs.add_block_with([f(0, 0, 4, Ori::Forward), f(1, 0, 4, Ori::Forward)]);
        let b = bs.add_block_with([f(0, 5, 9, Ori::Forward)]);
        assert!(!join(&mut bs, None));
        assert_eq!(bs.block_count(), 2);
        assert_eq!(bs.block_fragments(b), vec![f(0, 5, 9, Ori::Forward)]);
    }
}
