use chainlab_core::{
    chain::Chain,
    codec::HeaderTemplate,
    constants::ZERO_HASH_HEX,
    pow::{mine_block, sha256d},
    Block, BlockHeader,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn bench_pow(c: &mut Criterion) {
    c.bench_function("mine_block_difficulty_3", |b| {
        let block = Block::new(
            1,
            ZERO_HASH_HEX.to_string(),
            1_700_000_000,
            "Payroll transfers".into(),
        );
        b.iter(|| {
            let _mined = mine_block(block.clone(), 3, u64::MAX);
        });
    });

    c.bench_function("header_sha256d", |b| {
        let header = BlockHeader {
            name: "Block #0".into(),
            height: Some(0),
            version: 1,
            prev_block: ZERO_HASH_HEX.into(),
            merkle_root: "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b".into(),
            timestamp: 1_231_006_505,
            bits: 0x1d00ffff,
        };
        let mut template = HeaderTemplate::new(&header).unwrap();
        let mut nonce = 0u32;
        b.iter(|| {
            nonce = nonce.wrapping_add(1);
            black_box(sha256d(template.set_nonce(nonce)));
        });
    });

    c.bench_function("build_chain_5x2", |b| {
        b.iter(|| black_box(Chain::build_at(5, 2, 0, 1_700_000_000)));
    });
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);
