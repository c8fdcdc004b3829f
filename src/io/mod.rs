//! 输入输出：FASTA 序列、分块文本记录与二进制快照。

pub mod blocks;
pub mod fasta;
pub mod snapshot;

pub use blocks::{read_blocks, read_blocks_from_file, write_blocks, write_blocks_to_file};
pub use fasta::{read_sequences, read_sequences_from_file, FastaReader, FastaRecord};
pub use snapshot::{Snapshot, SnapshotMeta};
