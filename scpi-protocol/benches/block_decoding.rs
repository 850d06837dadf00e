use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use scpi_protocol::{BinaryFormat, block::BlockHeader, block::encode_block};

fn block_header(c: &mut Criterion) {
    let payload = vec![0x5Au8; 1_000_000];
    let block = encode_block(&payload);
    c.bench_function("parse definite header", |b| {
        b.iter(|| BlockHeader::parse(black_box(&block)))
    });

    let mut indefinite = b"#0".to_vec();
    indefinite.extend(std::iter::repeat_n(b'a', 64 * 1024));
    indefinite.push(b'\n');
    c.bench_function("parse indefinite header 64k", |b| {
        b.iter(|| BlockHeader::parse(black_box(&indefinite)))
    });
}

fn typed_arrays(c: &mut Criterion) {
    let values: Vec<f64> = (0..100_000).map(|i| i as f64 * 0.5).collect();
    for code in ["B", "h<", "f", "d<"] {
        let format: BinaryFormat = code.parse().unwrap();
        let bytes = format.encode(&values);
        c.bench_function(&format!("decode 100k '{code}'"), |b| {
            b.iter(|| format.decode(black_box(&bytes)))
        });
    }
}

criterion_group!(benches, block_header, typed_arrays);
criterion_main!(benches);
