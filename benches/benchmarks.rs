use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pangenome_blocks::align::{AlignerOpt, AnchorFinder, AnchorOpt, BandedAligner, ExpandOpt, Expander};
use pangenome_blocks::index::{BloomFilter, KmerScanner};
use pangenome_blocks::model::{BlockSet, Sequence};
use pangenome_blocks::resolve::OverlapsResolver;

fn make_reference(len: usize, seed: u32) -> Vec<u8> {
    let bases = [b'a', b'c', b'g', b't'];
    let mut seq = Vec::with_capacity(len);
    let mut x: u32 = seed;
    for _ in 0..len {
        x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        seq.push(bases[(x >> 16) as usize % 4]);
    }
    seq
}

/// 两条序列共享一段 2kb 的区域，其中一处有替换
fn make_pair() -> BlockSet {
    let shared = make_reference(2_000, 7);
    let mut a = make_reference(4_000, 42);
    let mut b = make_reference(4_000, 99);
    a[1_000..3_000].copy_from_slice(&shared);
    b[500..2_500].copy_from_slice(&shared);
    b[1_500] = if b[1_500] == b'a' { b'c' } else { b'a' };
    BlockSet::with_sequences([Sequence::new("a", &a), Sequence::new("b", &b)])
}

fn bench_bloom(c: &mut Criterion) {
    let keys: Vec<u64> = (0..10_000u64).map(|i| i.wrapping_mul(0x9e37_79b9_7f4a_7c15)).collect();
    c.bench_function("bloom_test_and_add_10k", |b| {
        b.iter(|| {
            let mut filter = BloomFilter::new(keys.len(), 0.01).unwrap();
            for &k in &keys {
                black_box(filter.test_and_add(k));
            }
        })
    });
}

fn bench_kmer_scan(c: &mut Criterion) {
    let seq = Sequence::new("bench", &make_reference(10_000, 42));
    c.bench_function("kmer_scan_10k_k20", |b| {
        b.iter(|| black_box(KmerScanner::new(black_box(seq.as_bytes()), 20).filter(|w| w.eligible()).count()))
    });
}

fn bench_banded(c: &mut Criterion) {
    let first = make_reference(100, 42);
    let mut second = first.clone();
    second[50] = b'n';
    let mut aligner = BandedAligner::new(AlignerOpt::default()).unwrap();
    c.bench_function("banded_align_100bp", |b| b.iter(|| black_box(aligner.align(black_box(&first), black_box(&second)))));
}

fn bench_find_anchors(c: &mut Criterion) {
    let bs = make_pair();
    let finder = AnchorFinder::new(AnchorOpt::default()).unwrap();
    c.bench_function("find_anchors_8k", |b| b.iter(|| black_box(finder.find(black_box(bs.sequences())).unwrap())));
}

fn bench_find_resolve_expand(c: &mut Criterion) {
    let base = make_pair();
    let finder = AnchorFinder::new(AnchorOpt::default()).unwrap();
    let expander = Expander::new(ExpandOpt::default()).unwrap();
    c.bench_function("anchors_resolve_expand_8k", |b| {
        b.iter(|| {
            let mut bs = base.clone();
            finder.run(&mut bs).unwrap();
            OverlapsResolver::new().run(&mut bs);
            expander.run(&mut bs).unwrap();
            black_box(bs.block_count())
        })
    });
}

criterion_group!(benches, bench_bloom, bench_kmer_scan, bench_banded, bench_find_anchors, bench_find_resolve_expand);
criterion_main!(benches);
