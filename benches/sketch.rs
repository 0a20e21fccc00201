use batch_distinct_counter::Sketch;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const VALUES: usize = 100_000;

fn benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let values: Vec<String> = (0..VALUES).map(|_| rng.gen::<u64>().to_string()).collect();

    let mut full = Sketch::new();
    for value in &values {
        full.insert(value);
    }
    let mut half = Sketch::new();
    for value in &values[..VALUES / 2] {
        half.insert(value);
    }

    let mut group = c.benchmark_group("sketch");

    group.throughput(Throughput::Elements(values.len() as u64));
    group.bench_function("insert", |b| {
        b.iter(|| {
            let mut sketch = Sketch::new();
            for value in &values {
                sketch.insert(black_box(value));
            }
            black_box(sketch.observed_buckets())
        })
    });

    group.throughput(Throughput::Elements(1));
    group.bench_function("estimate", |b| b.iter(|| black_box(full.estimate())));
    group.bench_function("merge", |b| {
        b.iter(|| {
            let mut sketch = half.clone();
            sketch.merge(&full);
            black_box(sketch.observed_buckets())
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
