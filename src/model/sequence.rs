use serde::{Deserialize, Serialize};

use super::Ori;
use crate::util::dna;

/// 一条输入序列：名称 + 规范化后的小写 acgtn 字节串，构造后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    name: String,
    data: Vec<u8>,
}

impl Sequence {
    pub fn new<S: Into<String>>(name: S, raw: &[u8]) -> Self {
        Self { name: name.into(), data: dna::normalize_seq(raw) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// 有界读取：超出末尾时截断，`start` 越界返回空切片
    pub fn get(&self, start: usize, len: usize) -> &[u8] {
        if start >= self.data.len() {
            return &[];
        }
        let end = start.saturating_add(len).min(self.data.len());
        &self.data[start..end]
    }

    #[inline]
    pub fn char_at(&self, pos: usize) -> u8 {
        self.data[pos]
    }

    /// 取 `[start, start+len)`，`ori` 为反向时返回反向互补
    pub fn substr(&self, start: usize, len: usize, ori: Ori) -> Vec<u8> {
        let part = self.get(start, len);
        match ori {
            Ori::Forward => part.to_vec(),
            Ori::Reverse => dna::revcomp(part),
        }
    }
}
