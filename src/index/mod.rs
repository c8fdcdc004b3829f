//! k-mer 索引：Bloom 过滤器与双向滚动哈希。

pub mod bloom;
pub mod kmer;

pub use bloom::BloomFilter;
pub use kmer::{make_hash, reuse_hash, KmerScanner, Window};
