//! 重复片段的发现与延长：锚点查找、带状比对、块扩展。

pub mod anchor;
pub mod banded;
pub mod expand;

pub use anchor::{AnchorFinder, AnchorOpt};
pub use banded::{AlignerOpt, BandedAligner, PairAlignment, TracedAlignment};
pub use expand::{ExpandOpt, Expander};
