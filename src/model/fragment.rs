use serde::{Deserialize, Serialize};

use super::{Ori, SeqId, Sequence};

/// 序列上的闭区间 `[min_pos, max_pos]` 加方向。
///
/// 片段本身只是坐标值；所属块与 prev/next 邻居由 [`super::BlockSet`]
/// 以句柄形式保存。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fragment {
    pub seq: SeqId,
    pub min_pos: usize,
    pub max_pos: usize,
    pub ori: Ori,
}

impl Fragment {
    pub fn new(seq: SeqId, min_pos: usize, max_pos: usize, ori: Ori) -> Self {
        Self { seq, min_pos, max_pos, ori }
    }

    /// 由起止位置构造：`begin > last` 时为反向片段
    pub fn from_begin_last(seq: SeqId, begin: usize, last: usize) -> Self {
        if begin <= last {
            Self::new(seq, begin, last, Ori::Forward)
        } else {
            Self::new(seq, last, begin, Ori::Reverse)
        }
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.max_pos - self.min_pos + 1
    }

    #[inline]
    pub fn begin_pos(&self) -> usize {
        match self.ori {
            Ori::Forward => self.min_pos,
            Ori::Reverse => self.max_pos,
        }
    }

    #[inline]
    pub fn last_pos(&self) -> usize {
        match self.ori {
            Ori::Forward => self.max_pos,
            Ori::Reverse => self.min_pos,
        }
    }

    /// 最后一个位置之后的位置，反向片段在 0 处结束时为 -1
    pub fn end_pos(&self) -> isize {
        match self.ori {
            Ori::Forward => self.max_pos as isize + 1,
            Ori::Reverse => self.min_pos as isize - 1,
        }
    }

    pub fn set_begin_pos(&mut self, pos: usize) {
        match self.ori {
            Ori::Forward => self.min_pos = pos,
            Ori::Reverse => self.max_pos = pos,
        }
    }

    pub fn set_last_pos(&mut self, pos: usize) {
        match self.ori {
            Ori::Forward => self.max_pos = pos,
            Ori::Reverse => self.min_pos = pos,
        }
    }

    /// 沿片段方向把末端延长 `len` 个位置
    pub fn extend_end(&mut self, len: usize) {
        match self.ori {
            Ori::Forward => self.max_pos += len,
            Ori::Reverse => {
                assert!(len <= self.min_pos, "fragment extended past sequence start");
                self.min_pos -= len;
            }
        }
    }

    pub fn inverse(&mut self) {
        self.ori = self.ori.flip();
    }

    pub fn valid(&self, seq_len: usize) -> bool {
        self.min_pos <= self.max_pos && self.max_pos < seq_len
    }

    #[inline]
    pub fn has(&self, pos: usize) -> bool {
        self.min_pos <= pos && pos <= self.max_pos
    }

    /// 同一位置（忽略方向）
    pub fn same_place(&self, other: &Fragment) -> bool {
        self.seq == other.seq && self.min_pos == other.min_pos && self.max_pos == other.max_pos
    }

    pub fn common_positions(&self, other: &Fragment) -> usize {
        if self.seq != other.seq {
            return 0;
        }
        let max_min = self.min_pos.max(other.min_pos);
        let min_max = self.max_pos.min(other.max_pos);
        if max_min <= min_max {
            min_max - max_min + 1
        } else {
            0
        }
    }

    /// 两片段的公共区间，方向取 self 的方向
    pub fn common_fragment(&self, other: &Fragment) -> Option<Fragment> {
        if self.seq != other.seq {
            return None;
        }
        let max_min = self.min_pos.max(other.min_pos);
        let min_max = self.max_pos.min(other.max_pos);
        (max_min <= min_max).then(|| Fragment::new(self.seq, max_min, min_max, self.ori))
    }

    pub fn is_subfragment_of(&self, other: &Fragment) -> bool {
        self.seq == other.seq && self.min_pos >= other.min_pos && self.max_pos <= other.max_pos
    }

    /// 同一序列上两片段之间的空隙长度，重叠时为 0
    pub fn dist_to(&self, other: &Fragment) -> usize {
        debug_assert_eq!(self.seq, other.seq);
        if self.common_positions(other) > 0 {
            0
        } else if self.max_pos < other.min_pos {
            other.min_pos - self.max_pos - 1
        } else {
            self.min_pos - other.max_pos - 1
        }
    }

    /// 片段内偏移（沿片段方向）对应的序列坐标
    #[inline]
    pub fn offset_to_pos(&self, offset: usize) -> usize {
        match self.ori {
            Ori::Forward => self.min_pos + offset,
            Ori::Reverse => self.max_pos - offset,
        }
    }

    #[inline]
    pub fn pos_to_offset(&self, pos: usize) -> usize {
        match self.ori {
            Ori::Forward => pos - self.min_pos,
            Ori::Reverse => self.max_pos - pos,
        }
    }

    /// 在 `new_length` 处切开：self 保留前 `new_length` 个位置，返回剩余部分。
    /// 长度不足时不切，返回 None。
    pub fn split(&mut self, new_length: usize) -> Option<Fragment> {
        if new_length == 0 || self.length() <= new_length {
            return None;
        }
        let mut rest = *self;
        rest.set_begin_pos(self.offset_to_pos(new_length));
        self.set_last_pos(self.offset_to_pos(new_length - 1));
        debug_assert_eq!(self.common_positions(&rest), 0);
        Some(rest)
    }

    /// 沿片段方向读出的文本（反向片段为反向互补）
    pub fn text(&self, seq: &Sequence) -> Vec<u8> {
        seq.substr(self.min_pos, self.length(), self.ori)
    }

    /// 片段内第 `offset` 个字符（沿片段方向）
    pub fn at(&self, seq: &Sequence, offset: usize) -> u8 {
        let raw = seq.char_at(self.offset_to_pos(offset));
        match self.ori {
            Ori::Forward => raw,
            Ori::Reverse => crate::util::dna::complement(raw),
        }
    }

    /// 记录格式中的片段名 `{seq}_{begin}_{last}`
    pub fn id(&self, seq: &Sequence) -> String {
        format!("{}_{}_{}", seq.name(), self.begin_pos(), self.last_pos())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const S: SeqId = SeqId(0);

    #[test]
    fn positions_follow_orientation() {
        let f = Fragment::new(S, 3, 7, Ori::Reverse);
        assert_eq!(f.length(), 5);
        assert_eq!(f.begin_pos(), 7);
        assert_eq!(f.last_pos(), 3);
        assert_eq!(f.end_pos(), 2);
        assert_eq!(f.offset_to_pos(1), 6);
        assert_eq!(f.pos_to_offset(6), 1);
        let g = Fragment::new(S, 0, 0, Ori::Reverse);
        assert_eq!(g.end_pos(), -1);
    }

    #[test]
    fn from_begin_last_picks_ori() {
        assert_eq!(Fragment::from_begin_last(S, 2, 5), Fragment::new(S, 2, 5, Ori::Forward));
        assert_eq!(Fragment::from_begin_last(S, 5, 2), Fragment::new(S, 2, 5, Ori::Reverse));
    }

    #[test]
    fn common_and_distance() {
        let a = Fragment::new(S, 2, 8, Ori::Forward);
        let b = Fragment::new(S, 6, 12, Ori::Reverse);
        assert_eq!(a.common_positions(&b), 3);
        assert_eq!(a.common_fragment(&b), Some(Fragment::new(S, 6, 8, Ori::Forward)));
        let c = Fragment::new(S, 15, 20, Ori::Forward);
        assert_eq!(a.common_positions(&c), 0);
        assert_eq!(a.common_fragment(&c), None);
        assert_eq!(a.dist_to(&c), 6);
        assert_eq!(c.dist_to(&a), 6);
        let other_seq = Fragment::new(SeqId(1), 2, 8, Ori::Forward);
        assert_eq!(a.common_positions(&other_seq), 0);
    }

    #[test]
    fn split_forward_and_reverse() {
        let mut f = Fragment::new(S, 10, 19, Ori::Forward);
        let rest = f.split(4).unwrap();
        assert_eq!(f, Fragment::new(S, 10, 13, Ori::Forward));
        assert_eq!(rest, Fragment::new(S, 14, 19, Ori::Forward));

        let mut r = Fragment::new(S, 10, 19, Ori::Reverse);
        let rest = r.split(4).unwrap();
        assert_eq!(r, Fragment::new(S, 16, 19, Ori::Reverse));
        assert_eq!(rest, Fragment::new(S, 10, 15, Ori::Reverse));

        let mut short = Fragment::new(S, 0, 2, Ori::Forward);
        assert!(short.split(3).is_none());
        assert!(short.split(0).is_none());
    }

    #[test]
    fn text_and_id() {
        let seq = Sequence::new("chr", b"aaacgtggg");
        let f = Fragment::new(S, 2, 5, Ori::Reverse);
        assert_eq!(f.text(&seq), b"acgt");
        assert_eq!(f.at(&seq, 0), b'a');
        assert_eq!(f.id(&seq), "chr_5_2");
        let mut g = Fragment::new(S, 0, 2, Ori::Forward);
        assert!(g.valid(seq.len()));
        g.extend_end(6);
        assert!(g.valid(seq.len()));
        g.extend_end(1);
        assert!(!g.valid(seq.len()));
    }
}
