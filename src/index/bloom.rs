use std::f64::consts::LN_2;

use bitvec::prelude::*;

use crate::error::ConfigError;

/// k 个独立哈希的 Bloom 过滤器，只有假阳性，没有假阴性。
///
/// 每个位置由同一个 64-bit 哈希与不同种子异或后再做一次 64-bit
/// 混合得到，因此调用方只需提供一个哈希值。
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: BitVec,
    seeds: Vec<u64>,
}

/// splitmix64 的末尾混合步骤
#[inline]
fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

impl BloomFilter {
    /// 按预期成员数与目标假阳性率确定位数和哈希个数：
    /// `bits = ceil(-n ln p / ln2^2)`，`k = round(ln2 * bits / n)`。
    pub fn new(expected_members: usize, target_fp: f64) -> Result<Self, ConfigError> {
        if !(target_fp > 0.0 && target_fp < 1.0) {
            return Err(ConfigError::FalsePositiveRate(target_fp));
        }
        let n = expected_members.max(1) as f64;
        let bits = (-n * target_fp.ln() / (LN_2 * LN_2)).ceil().max(1.0) as usize;
        let hashes = ((LN_2 * bits as f64 / n).round() as usize).max(1);
        Ok(Self::with_size(bits, hashes))
    }

    pub fn with_size(bits: usize, hashes: usize) -> Self {
        let bits = bits.max(1);
        let seeds = (0..hashes.max(1) as u64)
            .map(|i| mix64((i + 1).wrapping_mul(0x9e37_79b9_7f4a_7c15)))
            .collect();
        Self { bits: bitvec![0; bits], seeds }
    }

    #[inline]
    fn position(&self, seed: u64, hash: u64) -> usize {
        (mix64(hash ^ seed) % self.bits.len() as u64) as usize
    }

    /// 返回调用前全部 k 位是否已置位，并总是置位它们
    pub fn test_and_add(&mut self, hash: u64) -> bool {
        let mut all = true;
        for i in 0..self.seeds.len() {
            let pos = self.position(self.seeds[i], hash);
            if !self.bits[pos] {
                all = false;
                self.bits.set(pos, true);
            }
        }
        all
    }

    pub fn test(&self, hash: u64) -> bool {
        self.seeds.iter().all(|&s| self.bits[self.position(s, hash)])
    }

    pub fn add(&mut self, hash: u64) {
        self.test_and_add(hash);
    }

    pub fn bits(&self) -> usize {
        self.bits.len()
    }

    pub fn hashes(&self) -> usize {
        self.seeds.len()
    }

    pub fn true_bits(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn clear(&mut self) {
        self.bits.fill(false);
    }
}
