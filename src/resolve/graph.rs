use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::canonical_blocks;
use crate::error::ConfigError;
use crate::model::{BlockSet, Fragment, Ori, SeqId};

pub mod defaults {
    pub const MIN_DISTANCE: usize = 0;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphResolveOpt {
    /// 相距不超过该值的切点合并为它们的平均位置；0 表示不合并
    pub min_distance: usize,
}

impl Default for GraphResolveOpt {
    fn default() -> Self {
        Self { min_distance: defaults::MIN_DISTANCE }
    }
}

impl GraphResolveOpt {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// 带方向奇偶的并查集。
///
/// 每个元素记录相对父节点的方向，`find` 返回根以及元素相对根的方向。
#[derive(Debug, Clone)]
pub struct ParityUnionFind {
    parent: Vec<usize>,
    parity: Vec<Ori>,
}

impl ParityUnionFind {
    pub fn new(n: usize) -> Self {
        Self { parent: (0..n).collect(), parity: vec![Ori::Forward; n] }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// 迭代查找并压缩路径
    pub fn find(&mut self, v: usize) -> (usize, Ori) {
        let mut path = Vec::new();
        let mut root = v;
        while self.parent[root] != root {
            path.push(root);
            root = self.parent[root];
        }
        let mut acc = Ori::Forward;
        for &u in path.iter().rev() {
            acc = acc * self.parity[u];
            self.parity[u] = acc;
            self.parent[u] = root;
        }
        if v == root {
            (root, Ori::Forward)
        } else {
            (root, self.parity[v])
        }
    }

    /// 声明 `a` 与 `b` 的相对方向为 `rel`。与已有关系矛盾时不做修改并返回 false。
    pub fn union(&mut self, a: usize, b: usize, rel: Ori) -> bool {
        let (ra, pa) = self.find(a);
        let (rb, pb) = self.find(b);
        if ra == rb {
            return pa * pb == rel;
        }
        let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent[hi] = lo;
        self.parity[hi] = pa * pb * rel;
        true
    }
}

/// 切点 `cut` 在片段方向上距片段起点的偏移
fn cut_offset(f: &Fragment, cut: usize) -> usize {
    match f.ori {
        Ori::Forward => cut - f.min_pos,
        Ori::Reverse => f.max_pos + 1 - cut,
    }
}

fn offset_cut(f: &Fragment, offset: usize) -> usize {
    match f.ori {
        Ori::Forward => f.min_pos + offset,
        Ori::Reverse => f.max_pos + 1 - offset,
    }
}

/// 按长度比例把 `from` 中的偏移映射到 `to`，四舍五入
fn map_offset(offset: usize, from: &Fragment, to: &Fragment) -> usize {
    let (fl, tl) = (from.length(), to.length());
    (offset * tl + fl / 2) / fl
}

type Cuts = Vec<BTreeSet<usize>>;

/// 全局重叠消解：以基本区段为顶点、块内对应关系为边构图，
/// 每个连通分量输出一个块。
///
/// 输入块被整体替换；不被任何片段覆盖的位置保持不被覆盖。
#[derive(Debug, Clone, Default)]
pub struct GraphResolver {
    opt: GraphResolveOpt,
}

impl GraphResolver {
    pub fn new(opt: GraphResolveOpt) -> Result<Self, ConfigError> {
        opt.validate()?;
        Ok(Self { opt })
    }

    pub fn opt(&self) -> &GraphResolveOpt {
        &self.opt
    }

    fn collect_cuts(n_seqs: usize, blocks: &[Vec<Fragment>]) -> Cuts {
        let mut cuts: Cuts = vec![BTreeSet::new(); n_seqs];
        for f in blocks.iter().flatten() {
            cuts[f.seq.0].insert(f.min_pos);
            cuts[f.seq.0].insert(f.max_pos + 1);
        }
        cuts
    }

    /// 合并相近的切点并据此改写片段边界，退化为空的片段被丢弃
    fn snap(&self, cuts: &Cuts, blocks: Vec<Vec<Fragment>>) -> Vec<Vec<Fragment>> {
        let d = self.opt.min_distance;
        let maps: Vec<HashMap<usize, usize>> = cuts
            .iter()
            .map(|set| {
                let mut map = HashMap::new();
                let mut group: Vec<usize> = Vec::new();
                let mut flush = |group: &mut Vec<usize>| {
                    if !group.is_empty() {
                        let avg = group.iter().sum::<usize>() / group.len();
                        map.extend(group.drain(..).map(|c| (c, avg)));
                    }
                };
                for &c in set {
                    if group.last().is_some_and(|&last| c - last > d) {
                        flush(&mut group);
                    }
                    group.push(c);
                }
                flush(&mut group);
                map
            })
            .collect();

        blocks
            .into_iter()
            .map(|block| {
                let mut out: Vec<Fragment> = Vec::with_capacity(block.len());
                for f in block {
                    let map = &maps[f.seq.0];
                    let (min, end) = (map[&f.min_pos], map[&(f.max_pos + 1)]);
                    if end > min {
                        let g = Fragment::new(f.seq, min, end - 1, f.ori);
                        if !out.contains(&g) {
                            out.push(g);
                        }
                    }
                }
                out
            })
            .collect()
    }

    /// 把片段内部的切点按比例投射到同块其他片段，直到不再产生新切点
    fn propagate(cuts: &mut Cuts, blocks: &[Vec<Fragment>]) -> usize {
        let mut rounds = 0;
        loop {
            rounds += 1;
            let mut added = false;
            for block in blocks {
                for (i, f) in block.iter().enumerate() {
                    let inner: Vec<usize> = cuts[f.seq.0].range(f.min_pos + 1..=f.max_pos).copied().collect();
                    for c in inner {
                        let offset = cut_offset(f, c);
                        for (j, o) in block.iter().enumerate() {
                            if i == j {
                                continue;
                            }
                            let mapped = map_offset(offset, f, o);
                            if mapped > 0 && mapped < o.length() {
                                added |= cuts[o.seq.0].insert(offset_cut(o, mapped));
                            }
                        }
                    }
                }
            }
            if !added {
                return rounds;
            }
        }
    }

    /// 片段内部相邻切点之间的区段 `[start, end)`
    fn segments(cuts: &Cuts, f: &Fragment) -> Vec<(usize, usize)> {
        let bounds: Vec<usize> = cuts[f.seq.0].range(f.min_pos..=f.max_pos + 1).copied().collect();
        bounds.windows(2).map(|w| (w[0], w[1])).collect()
    }

    /// 计算新的分块，不修改 `bs`
    pub fn partition(&self, bs: &BlockSet) -> Vec<Vec<Fragment>> {
        let mut blocks: Vec<Vec<Fragment>> = bs.block_ids().into_iter().map(|b| bs.block_fragments(b)).collect();
        let n_seqs = bs.sequences().len();
        let mut cuts = Self::collect_cuts(n_seqs, &blocks);
        if self.opt.min_distance > 0 {
            blocks = self.snap(&cuts, blocks);
            cuts = Self::collect_cuts(n_seqs, &blocks);
        }
        let rounds = Self::propagate(&mut cuts, &blocks);

        // 顶点：被覆盖的基本区段，按 (序列, 起点) 编号
        let mut seg_end: BTreeMap<(SeqId, usize), usize> = BTreeMap::new();
        for f in blocks.iter().flatten() {
            for (start, end) in Self::segments(&cuts, f) {
                seg_end.insert((f.seq, start), end);
            }
        }
        let vertices: Vec<(SeqId, usize, usize)> = seg_end.iter().map(|(&(s, a), &e)| (s, a, e)).collect();
        let by_start: HashMap<(SeqId, usize), usize> =
            vertices.iter().enumerate().map(|(v, &(s, a, _))| ((s, a), v)).collect();
        let by_end: HashMap<(SeqId, usize), usize> =
            vertices.iter().enumerate().map(|(v, &(s, _, e))| ((s, e), v)).collect();

        let mut uf = ParityUnionFind::new(vertices.len());
        let mut dropped = 0usize;
        for block in &blocks {
            for (i, f) in block.iter().enumerate() {
                for (start, end) in Self::segments(&cuts, f) {
                    let from = by_start[&(f.seq, start)];
                    let head = if f.ori == Ori::Forward { start } else { end };
                    let offset = cut_offset(f, head);
                    for o in &block[i + 1..] {
                        let mapped = map_offset(offset, f, o);
                        if mapped >= o.length() {
                            continue;
                        }
                        let cut = offset_cut(o, mapped);
                        let target = match o.ori {
                            Ori::Forward => by_start.get(&(o.seq, cut)),
                            Ori::Reverse => by_end.get(&(o.seq, cut)),
                        };
                        if let Some(&to) = target {
                            if !uf.union(from, to, f.ori * o.ori) {
                                dropped += 1;
                            }
                        }
                    }
                }
            }
        }

        let mut components: BTreeMap<usize, Vec<(usize, Ori)>> = BTreeMap::new();
        for v in 0..vertices.len() {
            let (root, ori) = uf.find(v);
            components.entry(root).or_default().push((v, ori));
        }
        // 根总是分量中编号最小的顶点：分量按最小顶点排序，且该顶点为正向
        let result: Vec<Vec<Fragment>> = components
            .into_values()
            .map(|members| {
                members
                    .into_iter()
                    .map(|(v, ori)| {
                        let (seq, start, end) = vertices[v];
                        Fragment::new(seq, start, end - 1, ori)
                    })
                    .collect()
            })
            .collect();
        log::debug!(
            "graph: {} vertices, {} components, {} propagation rounds, {} conflicting edges dropped",
            vertices.len(),
            result.len(),
            rounds,
            dropped
        );
        result
    }

    /// 用连通分量替换全部块，返回分块是否改变
    pub fn run(&self, bs: &mut BlockSet) -> bool {
        let before = canonical_blocks(bs);
        let blocks = self.partition(bs);
        bs.clear_blocks();
        for block in blocks {
            bs.add_block_with(block);
        }
        bs.connect();
        bs.assert_no_overlaps();
        before != canonical_blocks(bs)
    }
}
