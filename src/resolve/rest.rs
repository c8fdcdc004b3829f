use crate::model::{BlockSet, Fragment, Ori, SeqId};

/// 为未被覆盖的区间补充单片段块，使所有块恰好划分全部位置。
#[derive(Debug, Clone, Copy, Default)]
pub struct Rest;

impl Rest {
    pub fn new() -> Self {
        Self
    }

    /// 未被任何片段覆盖的极大区间
    pub fn uncovered(bs: &BlockSet) -> Vec<Fragment> {
        let mut out = Vec::new();
        for (seq, cov) in bs.coverage().iter().enumerate() {
            let mut pos = 0;
            while let Some(start) = cov[pos..].first_zero().map(|i| i + pos) {
                let end = cov[start..].first_one().map_or(cov.len(), |i| i + start);
                out.push(Fragment::new(SeqId(seq), start, end - 1, Ori::Forward));
                pos = end;
            }
        }
        out
    }

    pub fn run(&self, bs: &mut BlockSet) -> bool {
        let gaps = Self::uncovered(bs);
        let added = gaps.len();
        for f in gaps {
            bs.add_block_with([f]);
        }
        bs.connect();
        log::info!("added {} blocks for uncovered regions", added);
        added > 0
    }
}
