//! # pangenome-blocks
//!
//! 基于 Bloom 过滤器预筛的重复片段查找与泛基因组分块。
//!
//! 输入一组 DNA 序列，输出互不重叠的同源块（block）划分：
//!
//! - **锚点查找**：两遍 k-mer 扫描，Bloom 过滤器筛出重复候选，按精确文本分组
//! - **块扩展**：带状编辑距离比对，所有片段同步向两端延长
//! - **重叠消解**：局部逐对修复，或全局构图后按连通分量重新分块
//! - **整形**：合并首尾相接的块、补齐未覆盖区间
//!
//! ## 快速示例
//!
//! ```rust
//! use pangenome_blocks::align::{AnchorFinder, AnchorOpt};
//! use pangenome_blocks::model::{BlockSet, Sequence};
//! use pangenome_blocks::resolve::OverlapsResolver;
//!
//! let mut bs = BlockSet::with_sequences([
//!     Sequence::new("a", b"aaacgtgggaaacgtccc"),
//!     Sequence::new("b", b"tttaaacgtaaa"),
//! ]);
//! let finder = AnchorFinder::new(AnchorOpt { anchor_size: 6, ..AnchorOpt::default() }).unwrap();
//! finder.run(&mut bs).unwrap();
//! OverlapsResolver::new().run(&mut bs);
//! assert_eq!(bs.block_count(), 1);
//! ```
//!
//! ## 模块说明
//!
//! - [`model`] — 序列、片段、块与 arena 形式的 [`model::BlockSet`]
//! - [`index`] — Bloom 过滤器与双向滚动哈希
//! - [`align`] — 锚点查找、带状比对、块扩展
//! - [`resolve`] — 重叠消解、块合并、补齐
//! - [`pipeline`] — 按名称注册、按顺序执行的步骤
//! - [`io`] — FASTA、分块文本记录与快照
//! - [`dispatch`] — 按项认领的工作池
//! - [`util`] — DNA 编码 / 反向互补等工具函数

pub mod align;
pub mod dispatch;
pub mod error;
pub mod index;
pub mod io;
pub mod model;
pub mod pipeline;
pub mod resolve;
pub mod util;

pub use error::ConfigError;
