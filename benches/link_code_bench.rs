use affiliate_backend::services::commission::{compute_commission, CommissionSchedule, parse_tiers};
use affiliate_backend::utils::link_code::{generate_code, is_valid_code};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn bench_code_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("code_generation");

    for length in [8usize, 12, 16].iter() {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(length), length, |b, &len| {
            b.iter(|| generate_code(black_box(len)));
        });
    }
    group.finish();
}

fn bench_code_validation(c: &mut Criterion) {
    let code = generate_code(12);

    c.bench_function("code_validation", |b| {
        b.iter(|| is_valid_code(black_box(&code), 12));
    });
}

fn bench_commission(c: &mut Criterion) {
    let schedule = CommissionSchedule::new(parse_tiers("0:5,11:7,51:10").unwrap_or_default());

    c.bench_function("commission_for_order", |b| {
        b.iter(|| {
            let rate = schedule.rate_for(black_box(37));
            compute_commission(black_box(1_234_567), rate)
        });
    });
}

criterion_group!(
    benches,
    bench_code_generation,
    bench_code_validation,
    bench_commission
);
criterion_main!(benches);
