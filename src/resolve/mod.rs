//! 分块整形：重叠消解（局部 / 全局图）、相邻块合并、补齐未覆盖区间。

pub mod graph;
pub mod join;
pub mod local;
pub mod rest;

pub use graph::{GraphResolveOpt, GraphResolver, ParityUnionFind};
pub use join::{JoinOpt, Joiner};
pub use local::OverlapsResolver;
pub use rest::Rest;

use crate::model::{BlockSet, Fragment, Ori};

/// 与句柄和块内顺序无关的分块表示，用于判断分块是否改变。
///
/// 每个块的片段排序后统一方向，使首个片段为正向。
pub fn canonical_blocks(bs: &BlockSet) -> Vec<Vec<Fragment>> {
    let mut blocks: Vec<Vec<Fragment>> = bs
        .block_ids()
        .into_iter()
        .map(|b| {
            let mut frags = bs.block_fragments(b);
            frags.sort();
            if frags.first().is_some_and(|f| f.ori == Ori::Reverse) {
                frags.iter_mut().for_each(|f| f.inverse());
                frags.sort();
            }
            frags
        })
        .collect();
    blocks.sort();
    blocks
}
