use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::dispatch::Dispatcher;
use crate::error::ConfigError;
use crate::index::kmer::{check_k, KmerScanner, Window};
use crate::index::BloomFilter;
use crate::model::{BlockSet, Fragment, Ori, SeqId, Sequence};

pub mod defaults {
    pub const ANCHOR_SIZE: usize = 20;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorOpt {
    /// k-mer 长度，1..=32
    pub anchor_size: usize,
    /// 跳过与自身反向互补相同的窗口
    pub no_palindromes: bool,
    /// None 为两个方向取规范键
    pub only_ori: Option<Ori>,
    /// 紧接在命中之后的命中不记为候选
    pub skip_similar: bool,
    pub max_anchor_fragments: Option<usize>,
    pub workers: usize,
}

impl Default for AnchorOpt {
    fn default() -> Self {
        Self {
            anchor_size: defaults::ANCHOR_SIZE,
            no_palindromes: false,
            only_ori: None,
            skip_similar: false,
            max_anchor_fragments: None,
            workers: 1,
        }
    }
}

impl AnchorOpt {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_k(self.anchor_size)?;
        if self.workers < 1 {
            return Err(ConfigError::too_small("workers", 1, self.workers as i64));
        }
        Ok(())
    }
}

/// 两遍扫描的重复 k-mer 查找。
///
/// 第一遍用 Bloom 过滤器找出出现至少两次（或假阳性）的键；
/// 第二遍只收集这些键对应的窗口，并按精确文本分组，去掉假阳性。
pub struct AnchorFinder {
    opt: AnchorOpt,
}

impl AnchorFinder {
    pub fn new(opt: AnchorOpt) -> Result<Self, ConfigError> {
        opt.validate()?;
        Ok(Self { opt })
    }

    pub fn opt(&self) -> &AnchorOpt {
        &self.opt
    }

    /// 窗口的查找键与读出规范串的方向
    fn key_of(&self, w: &Window) -> Option<(u64, Ori)> {
        if !w.eligible() || (self.opt.no_palindromes && w.is_palindrome()) {
            return None;
        }
        Some(match self.opt.only_ori {
            None => w.canonical(),
            Some(Ori::Forward) => (w.direct, Ori::Forward),
            Some(Ori::Reverse) => (w.reverse, Ori::Reverse),
        })
    }

    fn scan_candidates<F>(&self, seq: &Sequence, mut test_and_add: F, out: &mut Vec<u64>)
    where
        F: FnMut(u64) -> bool,
    {
        let mut prev_hit = false;
        for w in KmerScanner::new(seq.as_bytes(), self.opt.anchor_size) {
            let hit = match self.key_of(&w) {
                Some((key, _)) => {
                    let hit = test_and_add(key);
                    if hit && !(self.opt.skip_similar && prev_hit) {
                        out.push(key);
                    }
                    hit
                }
                None => false,
            };
            prev_hit = hit;
        }
    }

    fn collect_fragments(&self, id: SeqId, seq: &Sequence, candidates: &[u64]) -> Vec<Fragment> {
        let k = self.opt.anchor_size;
        KmerScanner::new(seq.as_bytes(), k)
            .filter_map(|w| {
                let (key, ori) = self.key_of(&w)?;
                candidates
                    .binary_search(&key)
                    .ok()
                    .map(|_| Fragment::new(id, w.pos, w.pos + k - 1, ori))
            })
            .collect()
    }

    /// 返回重复 k-mer 分组，每组至少两个片段；组按文本排序，组内按位置排序
    pub fn find(&self, seqs: &[Arc<Sequence>]) -> Result<Vec<Vec<Fragment>>, ConfigError> {
        let k = self.opt.anchor_size;
        let total: usize = seqs.iter().map(|s| s.len()).sum();
        let space = if k >= 32 { u64::MAX } else { 1u64 << (2 * k) };
        let expected = (total as u64).min(space).max(1) as usize;
        let fp = (1.0 / expected as f64).clamp(f64::MIN_POSITIVE, 0.5);
        let mut filter = BloomFilter::new(expected, fp)?;
        let dispatcher = Dispatcher::new(self.opt.workers)?;
        log::debug!(
            "anchor filter: {} bits, {} hashes for {} expected k-mers",
            filter.bits(),
            filter.hashes(),
            expected
        );

        let mut candidates: Vec<u64> = if dispatcher.workers() > 1 {
            let shared = Mutex::new(filter);
            let parts = dispatcher.fold_claimed(seqs, Vec::new, |acc, _, seq| {
                self.scan_candidates(
                    seq,
                    |key| shared.lock().unwrap_or_else(PoisonError::into_inner).test_and_add(key),
                    acc,
                );
            });
            parts.into_iter().flatten().collect()
        } else {
            let mut out = Vec::new();
            for seq in seqs {
                self.scan_candidates(seq, |key| filter.test_and_add(key), &mut out);
            }
            out
        };
        candidates.sort_unstable();
        candidates.dedup();
        log::debug!("anchor candidates after first pass: {}", candidates.len());

        let ids: Vec<SeqId> = (0..seqs.len()).map(SeqId).collect();
        let per_seq = dispatcher.map_claimed(&ids, |&id| self.collect_fragments(id, &seqs[id.0], &candidates));

        let mut groups: BTreeMap<Vec<u8>, Vec<Fragment>> = BTreeMap::new();
        for frags in per_seq {
            for f in frags {
                groups.entry(f.text(&seqs[f.seq.0])).or_default().push(f);
            }
        }

        Ok(take_groups(groups.into_values(), self.opt.max_anchor_fragments))
    }

    /// 在 `bs` 中为每组重复 k-mer 新建一个块
    pub fn run(&self, bs: &mut BlockSet) -> Result<bool, ConfigError> {
        let groups = self.find(bs.sequences())?;
        let changed = !groups.is_empty();
        let mut fragments = 0;
        for group in groups {
            fragments += group.len();
            bs.add_block_with(group);
        }
        log::info!("found {} anchor fragments", fragments);
        Ok(changed)
    }
}

/// 依次取组直到片段总数达到上限。
/// 不足两个片段的组既不输出也不占用上限。
fn take_groups<I>(groups: I, cap: Option<usize>) -> Vec<Vec<Fragment>>
where
    I: IntoIterator<Item = Vec<Fragment>>,
{
    let mut budget = cap.unwrap_or(usize::MAX);
    let mut out = Vec::new();
    for mut frags in groups {
        if budget < 2 {
            break;
        }
        if frags.len() < 2 {
            continue;
        }
        frags.truncate(budget);
        budget -= frags.len();
        out.push(frags);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seqs(list: &[&str]) -> Vec<Arc<Sequence>> {
        list.iter()
            .enumerate()
            .map(|(i, s)| Arc::new(Sequence::new(format!("s{}", i), s.as_bytes())))
            .collect()
    }

    fn finder(k: usize) -> AnchorFinder {
        AnchorFinder::new(AnchorOpt { anchor_size: k, ..AnchorOpt::default() }).unwrap()
    }

    #[test]
    fn rejects_bad_anchor_size() {
        assert!(AnchorFinder::new(AnchorOpt { anchor_size: 0, ..AnchorOpt::default() }).is_err());
        assert!(AnchorFinder::new(AnchorOpt { anchor_size: 33, ..AnchorOpt::default() }).is_err());
    }

    #[test]
    fn two_occurrences_make_one_block() {
        // 只有 "gattaca" 出现两次
        let s = seqs(&["ccgattacatg", "agattacaac"]);
        let groups = finder(7).find(&s).unwrap();
        assert_eq!(groups.len(), 1);
        let texts: Vec<Vec<u8>> = groups[0].iter().map(|f| f.text(&s[f.seq.0])).collect();
        assert_eq!(groups[0].len(), 2);
        assert_eq!(texts[0], texts[1]);
        assert_eq!(groups[0][0], Fragment::new(SeqId(0), 2, 8, Ori::Forward));
        assert_eq!(groups[0][1], Fragment::new(SeqId(1), 1, 7, Ori::Forward));
    }

    #[test]
    fn reverse_complement_is_same_anchor() {
        // acgga 与其反向互补 tccgt
        let s = seqs(&["acggattt", "ggtccgtc"]);
        let groups = finder(5).find(&s).unwrap();
        assert_eq!(groups.len(), 1);
        let g = &groups[0];
        assert_eq!(g[0], Fragment::new(SeqId(0), 0, 4, Ori::Forward));
        assert_eq!(g[1], Fragment::new(SeqId(1), 2, 6, Ori::Reverse));
    }

    #[test]
    fn only_ori_restricts_matches() {
        let s = seqs(&["acggattt", "ggtccgtc"]);
        let f = AnchorFinder::new(AnchorOpt {
            anchor_size: 5,
            only_ori: Some(Ori::Forward),
            ..AnchorOpt::default()
        })
        .unwrap();
        assert!(f.find(&s).unwrap().is_empty());
    }

    #[test]
    fn windows_with_n_are_skipped() {
        let s = seqs(&["acgnacg", "acgnacg"]);
        assert!(finder(4).find(&s).unwrap().is_empty());
        assert_eq!(finder(3).find(&s).unwrap().len(), 1);
    }

    #[test]
    fn single_palindrome_is_not_a_repeat() {
        let s = seqs(&["tacgtg"]);
        assert!(finder(4).find(&s).unwrap().is_empty());
        let no_pal = AnchorFinder::new(AnchorOpt {
            anchor_size: 4,
            no_palindromes: true,
            ..AnchorOpt::default()
        })
        .unwrap();
        assert!(no_pal.find(&seqs(&["acgtcacgt"])).unwrap().is_empty());
        assert_eq!(finder(4).find(&seqs(&["acgtcacgt"])).unwrap().len(), 1);
    }

    #[test]
    fn workers_give_same_result() {
        let s = seqs(&["aaacgtgggaaacgtccc", "tttaaacgtaaa", "gattacagattaca", "ccccgggg"]);
        let one = finder(5).find(&s).unwrap();
        let many = AnchorFinder::new(AnchorOpt { anchor_size: 5, workers: 3, ..AnchorOpt::default() })
            .unwrap()
            .find(&s)
            .unwrap();
        assert_eq!(one, many);
    }

    #[test]
    fn max_fragments_caps_output() {
        let s = seqs(&["aaacgtgggaaacgtccc", "tttaaacgtaaa"]);
        let capped = AnchorFinder::new(AnchorOpt {
            anchor_size: 6,
            max_anchor_fragments: Some(2),
            ..AnchorOpt::default()
        })
        .unwrap();
        let groups = capped.find(&s).unwrap();
        assert_eq!(groups.iter().map(Vec::len).sum::<usize>(), 2);
    }

    #[test]
    fn lone_fragments_do_not_use_the_cap() {
        let fr = |pos: usize| Fragment::new(SeqId(0), pos, pos + 3, Ori::Forward);
        let groups = vec![vec![fr(0)], vec![fr(10), fr(20)], vec![fr(30), fr(40), fr(50)]];
        assert_eq!(
            take_groups(groups.clone(), Some(4)),
            vec![vec![fr(10), fr(20)], vec![fr(30), fr(40)]]
        );
        assert_eq!(take_groups(groups.clone(), Some(3)), vec![vec![fr(10), fr(20)]]);
        assert_eq!(take_groups(groups, None).len(), 2);
    }

    #[test]
    fn skip_similar_keeps_first_hit_of_a_run() {
        // 同一段重复出现两次，中间用 n 隔开
        let seq = Sequence::new("s", b"gattacatcgngattacatcg");
        let count = |skip_similar: bool| {
            let f = AnchorFinder::new(AnchorOpt { anchor_size: 4, skip_similar, ..AnchorOpt::default() }).unwrap();
            let mut seen = std::collections::HashSet::new();
            let mut out = Vec::new();
            f.scan_candidates(&seq, |key| !seen.insert(key), &mut out);
            out.len()
        };
        assert_eq!(count(false), 7);
        assert_eq!(count(true), 1);
    }

    #[test]
    fn skip_similar_still_finds_the_repeat() {
        let s = seqs(&["gattacatcgngattacatcg"]);
        let f = AnchorFinder::new(AnchorOpt { anchor_size: 4, skip_similar: true, ..AnchorOpt::default() }).unwrap();
        let groups = f.find(&s).unwrap();
        assert!(!groups.is_empty());
        assert!(groups.len() < 7);
        for g in &groups {
            assert_eq!(g.len(), 2);
            assert_eq!(g[1].min_pos, g[0].min_pos + 11);
        }
    }

    #[test]
    fn run_adds_blocks() {
        let mut bs = BlockSet::with_sequences([
            Sequence::new("a", b"aaacgtgggaaacgtccc"),
            Sequence::new("b", b"tttaaacgtaaa"),
        ]);
        let f = finder(6);
        assert!(f.run(&mut bs).unwrap());
        assert_eq!(bs.block_count(), 1);
        let frags = bs.block_fragments(bs.block_ids()[0]);
        assert_eq!(frags.len(), 3);
        for fr in &frags {
            assert_eq!(fr.ori, Ori::Forward);
            assert_eq!(fr.text(bs.seq(fr.seq)), b"aaacgt");
        }
        let mut empty = BlockSet::with_sequences([Sequence::new("x", b"acg")]);
        assert!(!f.run(&mut empty).unwrap());
    }
}
