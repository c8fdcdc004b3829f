//! k-mer 滚动哈希：正向与反向互补两个方向同时维护，每步 O(1)。
//!
//! 编码 a=0 c=1 g=2 t=3，互补为 `3 - x`；n 及其他非法字符按 0 计入哈希，
//! 含 n 的窗口由计数 `ns` 标记为不可用。

use crate::error::ConfigError;
use crate::model::Ori;
use crate::util::dna;

/// 哈希必须放进 u64，每个符号占 2 bit
pub const MAX_K: usize = 32;

pub fn check_k(k: usize) -> Result<(), ConfigError> {
    if k == 0 || k > MAX_K {
        return Err(ConfigError::AnchorSize { got: k, max: MAX_K });
    }
    Ok(())
}

#[inline]
fn comp_code(b: u8) -> u64 {
    dna::to_code(b).map_or(0, |c| 3 - c)
}

/// 窗口的 4 进制位置编码，阅读方向上的第一个符号为最高位。
/// `ori` 为反向时按反向互补串读取。
pub fn make_hash(window: &[u8], ori: Ori) -> u64 {
    let mut h = 0u64;
    match ori {
        Ori::Forward => {
            for &b in window {
                h = (h << 2) | dna::hash_code(b);
            }
        }
        Ori::Reverse => {
            for &b in window.iter().rev() {
                h = (h << 2) | comp_code(b);
            }
        }
    }
    h
}

/// O(1) 更新。`forward` 为真时去掉最高位、左移并把 `added` 放到最低位；
/// 否则去掉最低位、右移并把 `added` 放到最高位。
#[inline]
pub fn reuse_hash(old: u64, k: usize, removed: u64, added: u64, forward: bool) -> u64 {
    let top = 2 * (k - 1);
    if forward {
        ((old - (removed << top)) << 2) | added
    } else {
        ((old - removed) >> 2) | (added << top)
    }
}

/// 一个窗口的两个方向哈希及其中 n 的个数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub pos: usize,
    pub direct: u64,
    pub reverse: u64,
    pub ns: usize,
}

impl Window {
    #[inline]
    pub fn eligible(&self) -> bool {
        self.ns == 0
    }

    /// 与自身反向互补相同
    #[inline]
    pub fn is_palindrome(&self) -> bool {
        self.direct == self.reverse
    }

    /// 规范键与读出规范串的方向
    #[inline]
    pub fn canonical(&self) -> (u64, Ori) {
        if self.direct <= self.reverse {
            (self.direct, Ori::Forward)
        } else {
            (self.reverse, Ori::Reverse)
        }
    }
}

/// 逐位置产生窗口：首个窗口直接计算，其后复用上一个哈希
pub struct KmerScanner<'a> {
    seq: &'a [u8],
    k: usize,
    next_pos: usize,
    last: Option<Window>,
}

impl<'a> KmerScanner<'a> {
    /// `k` 需先经 [`check_k`] 校验
    pub fn new(seq: &'a [u8], k: usize) -> Self {
        debug_assert!(check_k(k).is_ok());
        Self { seq, k, next_pos: 0, last: None }
    }
}

impl Iterator for KmerScanner<'_> {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        let k = self.k;
        let pos = self.next_pos;
        if pos + k > self.seq.len() {
            return None;
        }
        let w = match self.last {
            None => {
                let window = &self.seq[..k];
                Window {
                    pos,
                    direct: make_hash(window, Ori::Forward),
                    reverse: make_hash(window, Ori::Reverse),
                    ns: window.iter().filter(|&&b| !dna::is_valid(b)).count(),
                }
            }
            Some(prev) => {
                let removed = self.seq[pos - 1];
                let added = self.seq[pos + k - 1];
                let mut ns = prev.ns;
                if !dna::is_valid(removed) {
                    ns -= 1;
                }
                if !dna::is_valid(added) {
                    ns += 1;
                }
                Window {
                    pos,
                    direct: reuse_hash(prev.direct, k, dna::hash_code(removed), dna::hash_code(added), true),
                    reverse: reuse_hash(prev.reverse, k, comp_code(removed), comp_code(added), false),
                    ns,
                }
            }
        };
        self.last = Some(w);
        self.next_pos += 1;
        Some(w)
    }
}
