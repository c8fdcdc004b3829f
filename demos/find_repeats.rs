//! 演示如何在 library 模式下查找重复并得到无重叠的分块。
//!
//! 运行方式：
//! ```bash
//! cargo run --example find_repeats
//! ```

use pangenome_blocks::align::{AlignerOpt, BandedAligner};
use pangenome_blocks::io;
use pangenome_blocks::model::{BlockSet, Sequence};
use pangenome_blocks::pipeline::{Pipeline, StepRegistry};

fn main() -> anyhow::Result<()> {
    // 1. 两条共享一段 30bp 区域的序列，第二条中该区域为反向互补
    let shared = b"gattacacgtttagcgcatgacctgaaggt";
    let mut a = b"ccctttgggaaattt".to_vec();
    a.extend_from_slice(shared);
    a.extend_from_slice(b"tatatacgcgcg");
    let mut b = b"aacctt".to_vec();
    b.extend_from_slice(&pangenome_blocks::util::dna::revcomp(shared));
    b.extend_from_slice(b"ggccaagtgt");
    let mut bs = BlockSet::with_sequences([Sequence::new("a", &a), Sequence::new("b", &b)]);
    println!("序列: a={} bp, b={} bp", a.len(), b.len());

    // 2. 带状比对：容许少量差异
    let mut aligner = BandedAligner::new(AlignerOpt { max_errors: 1, ..AlignerOpt::default() })?;
    println!("aligned(ATCG, ATGG) = {}", aligner.aligned(b"atcg", b"atgg"));

    // 3. 按名称组装流水线
    let registry = StepRegistry::new();
    let mut pipeline = Pipeline::parse(&registry, "find-anchors,resolve,expand,resolve,join,rest,check-no-overlaps")?;
    pipeline.set("anchor-size=8")?;
    pipeline.set("expand.batch=10")?;
    pipeline.run(&mut bs)?;

    // 4. 输出分块
    println!("\n{} 个块, {} 个片段:", bs.block_count(), bs.fragment_count());
    let mut out = Vec::new();
    io::write_blocks(&bs, &mut out)?;
    print!("{}", String::from_utf8_lossy(&out));
    Ok(())
}
