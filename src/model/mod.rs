//! 区间数据模型：序列、片段、块与持有它们的 arena。

pub mod block;
pub mod block_set;
pub mod fragment;
pub mod sequence;

use std::ops::Mul;

use serde::{Deserialize, Serialize};

pub use block::Block;
pub use block_set::BlockSet;
pub use fragment::Fragment;
pub use sequence::Sequence;

/// 片段方向：正向 (+1) 或反向互补 (-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ori {
    Reverse,
    Forward,
}

impl Ori {
    pub fn sign(self) -> i32 {
        match self {
            Ori::Forward => 1,
            Ori::Reverse => -1,
        }
    }

    pub fn from_sign(sign: i32) -> Option<Ori> {
        match sign {
            1 => Some(Ori::Forward),
            -1 => Some(Ori::Reverse),
            _ => None,
        }
    }

    #[inline]
    pub fn flip(self) -> Ori {
        match self {
            Ori::Forward => Ori::Reverse,
            Ori::Reverse => Ori::Forward,
        }
    }
}

/// 相对方向：同向为 Forward，反向为 Reverse
impl Mul for Ori {
    type Output = Ori;

    fn mul(self, rhs: Ori) -> Ori {
        if self == rhs {
            Ori::Forward
        } else {
            Ori::Reverse
        }
    }
}

/// `BlockSet` 中序列列表的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeqId(pub usize);

/// 片段在 arena 中的稳定句柄；片段删除后句柄失效，`compact` 之前不会复用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentId(pub usize);

/// 块在 arena 中的稳定句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);
