use blocksync::HashAlgorithm;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn make_block(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

fn bench_block_digest(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_digest");

    for block_size in [64 * 1024, 1024 * 1024, 4 * 1024 * 1024].iter() {
        let block = make_block(*block_size);
        group.throughput(Throughput::Bytes(*block_size as u64));

        for algo in [HashAlgorithm::Sha1, HashAlgorithm::Blake3] {
            group.bench_with_input(
                BenchmarkId::new(algo.name(), block_size),
                &block,
                |b, block| {
                    b.iter(|| algo.digest(black_box(block)));
                },
            );
        }
    }
    group.finish();
}

fn bench_digest_compare(c: &mut Criterion) {
    let local = HashAlgorithm::Sha1.digest(&make_block(1024 * 1024));
    let line = local.to_hex();

    c.bench_function("decode_and_compare_remote_digest", |b| {
        b.iter(|| {
            let remote =
                blocksync::RemoteDigest::decode(black_box(&line), HashAlgorithm::Sha1).unwrap();
            remote.matches(&local)
        });
    });
}

criterion_group!(benches, bench_block_digest, bench_digest_compare);
criterion_main!(benches);
