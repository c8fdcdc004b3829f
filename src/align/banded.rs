use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::util::dna::UNKNOWN;

pub mod defaults {
    pub const MAX_ERRORS: u32 = 5;
    pub const GAP_RANGE: usize = 2;
    pub const MISMATCH_PENALTY: u32 = 1;
    pub const GAP_PENALTY: u32 = 1;
}

const INF: u32 = u32::MAX / 4;

const DIAG: u8 = 0;
const UP: u8 = 1;
const LEFT: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignerOpt {
    /// 允许的最大代价 E
    pub max_errors: u32,
    /// 带宽 g：只计算 `|i - j| <= g` 的格子
    pub gap_range: usize,
    pub mismatch_penalty: u32,
    pub gap_penalty: u32,
    /// 去掉比对末尾不产生匹配的错配/空位
    pub no_tail: bool,
}

impl Default for AlignerOpt {
    fn default() -> Self {
        Self {
            max_errors: defaults::MAX_ERRORS,
            gap_range: defaults::GAP_RANGE,
            mismatch_penalty: defaults::MISMATCH_PENALTY,
            gap_penalty: defaults::GAP_PENALTY,
            no_tail: true,
        }
    }
}

impl AlignerOpt {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mismatch_penalty < 1 {
            return Err(ConfigError::too_small("mismatch-penalty", 1, self.mismatch_penalty as i64));
        }
        if self.gap_penalty < 1 {
            return Err(ConfigError::too_small("gap-penalty", 1, self.gap_penalty as i64));
        }
        if self.gap_range as u64 * self.gap_penalty as u64 > self.max_errors as u64 {
            return Err(ConfigError::BandExceedsBudget {
                gap_range: self.gap_range,
                gap_penalty: self.gap_penalty,
                max_errors: self.max_errors,
            });
        }
        Ok(())
    }
}

/// 两个前缀的比对结果：各自被消耗的长度与代价
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairAlignment {
    pub first_len: usize,
    pub second_len: usize,
    pub cost: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracedAlignment {
    pub alignment: PairAlignment,
    /// 逐列的对齐位置，None 表示该侧为空位
    pub pairs: Vec<(Option<usize>, Option<usize>)>,
    /// M 为对齐列，I 为 first 多出的字符，D 为 second 多出的字符
    pub cigar: String,
}

/// DP 工作缓冲区，可跨调用复用
#[derive(Debug, Clone, Default)]
pub struct AlignBuffer {
    cost: Vec<u32>,
    track: Vec<u8>,
}

impl AlignBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn resize(&mut self, size: usize) {
        self.cost.clear();
        self.cost.resize(size, INF);
        self.track.clear();
        self.track.resize(size, DIAG);
    }
}

/// 带状全局比对（前缀到前缀），代价超出预算时停止。
///
/// 同一实例可反复调用，缓冲区随之复用；多线程时每个工作线程各持一个实例。
#[derive(Debug, Clone)]
pub struct BandedAligner {
    opt: AlignerOpt,
    buf: AlignBuffer,
    width: usize,
}

impl BandedAligner {
    pub fn new(opt: AlignerOpt) -> Result<Self, ConfigError> {
        opt.validate()?;
        Ok(Self { opt, buf: AlignBuffer::new(), width: 2 * opt.gap_range + 1 })
    }

    pub fn opt(&self) -> &AlignerOpt {
        &self.opt
    }

    #[inline]
    fn at(&self, i: usize, j: usize) -> usize {
        i * self.width + j + self.opt.gap_range - i
    }

    /// 填充带状矩阵，返回最后一个未超预算行的最小代价格子
    fn fill(&mut self, first: &[u8], second: &[u8]) -> (usize, usize) {
        let g = self.opt.gap_range;
        let (m, n) = (first.len(), second.len());
        let rows = m.min(n + g) + 1;
        let gap = self.opt.gap_penalty;
        let mis = self.opt.mismatch_penalty;
        self.buf.resize(rows * self.width);

        for j in 0..=g.min(n) {
            let idx = self.at(0, j);
            self.buf.cost[idx] = j as u32 * gap;
            self.buf.track[idx] = LEFT;
        }

        let mut best = (0usize, 0usize);
        for i in 1..rows {
            let lo = i.saturating_sub(g);
            let hi = (i + g).min(n);
            let mut row_best: Option<(usize, u32)> = None;
            for j in lo..=hi {
                let (c, t) = if j == 0 {
                    (i as u32 * gap, UP)
                } else {
                    let a = first[i - 1];
                    let sub = if a == second[j - 1] && a != UNKNOWN { 0 } else { mis };
                    let mut c = self.buf.cost[self.at(i - 1, j - 1)] + sub;
                    let mut t = DIAG;
                    if j < i + g {
                        let up = self.buf.cost[self.at(i - 1, j)] + gap;
                        if up < c {
                            c = up;
                            t = UP;
                        }
                    }
                    if j > lo {
                        let left = self.buf.cost[self.at(i, j - 1)] + gap;
                        if left < c {
                            c = left;
                            t = LEFT;
                        }
                    }
                    (c, t)
                };
                let idx = self.at(i, j);
                self.buf.cost[idx] = c;
                self.buf.track[idx] = t;

                let better = match row_best {
                    None => true,
                    Some((bj, bc)) => c < bc || (c == bc && i.abs_diff(j) < i.abs_diff(bj)),
                };
                if better {
                    row_best = Some((j, c));
                }
            }
            match row_best {
                Some((bj, bc)) if bc <= self.opt.max_errors => best = (i, bj),
                _ => break,
            }
        }
        best
    }

    #[inline]
    fn predecessor(&self, i: usize, j: usize) -> (usize, usize) {
        match self.buf.track[self.at(i, j)] {
            DIAG => (i - 1, j - 1),
            UP => (i - 1, j),
            _ => (i, j - 1),
        }
    }

    /// 沿回溯路径后退，直到前一格的代价不再严格更小
    fn cut_tail(&self, mut i: usize, mut j: usize) -> (usize, usize) {
        while i > 0 || j > 0 {
            let (pi, pj) = self.predecessor(i, j);
            if self.buf.cost[self.at(pi, pj)] < self.buf.cost[self.at(i, j)] {
                i = pi;
                j = pj;
            } else {
                break;
            }
        }
        (i, j)
    }

    fn end_cell(&mut self, first: &[u8], second: &[u8]) -> (usize, usize) {
        let (i, j) = self.fill(first, second);
        if self.opt.no_tail {
            self.cut_tail(i, j)
        } else {
            (i, j)
        }
    }

    /// 比对 first 与 second 的前缀，返回在预算内能走到的最远位置
    pub fn align(&mut self, first: &[u8], second: &[u8]) -> PairAlignment {
        let (i, j) = self.end_cell(first, second);
        PairAlignment { first_len: i, second_len: j, cost: self.buf.cost[self.at(i, j)] }
    }

    pub fn align_with_trace(&mut self, first: &[u8], second: &[u8]) -> TracedAlignment {
        let (bi, bj) = self.end_cell(first, second);
        let alignment = PairAlignment { first_len: bi, second_len: bj, cost: self.buf.cost[self.at(bi, bj)] };

        let mut ops: Vec<char> = Vec::new();
        let mut pairs = Vec::new();
        let (mut i, mut j) = (bi, bj);
        while i > 0 || j > 0 {
            let (pi, pj) = self.predecessor(i, j);
            if pi < i && pj < j {
                ops.push('M');
                pairs.push((Some(pi), Some(pj)));
            } else if pi < i {
                ops.push('I');
                pairs.push((Some(pi), None));
            } else {
                ops.push('D');
                pairs.push((None, Some(pj)));
            }
            i = pi;
            j = pj;
        }
        ops.reverse();
        pairs.reverse();

        TracedAlignment { alignment, pairs, cigar: ops_to_cigar(&ops) }
    }

    /// 较短的串能否被完整消耗且代价不超过 E
    pub fn aligned(&mut self, a: &[u8], b: &[u8]) -> bool {
        let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
        let (row, _) = self.fill(short, long);
        row == short.len()
    }
}

pub fn ops_to_cigar(ops: &[char]) -> String {
    let mut cigar = String::new();
    if ops.is_empty() {
        return cigar;
    }
    let mut cur = ops[0];
    let mut len = 1usize;
    for &op in &ops[1..] {
        if op == cur {
            len += 1;
        } else {
            let _ = write!(&mut cigar, "{}{}", len, cur);
            cur = op;
            len = 1;
        }
    }
    let _ = write!(&mut cigar, "{}{}", len, cur);
    cigar
}
