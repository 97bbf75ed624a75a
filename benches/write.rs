use criterion::{black_box, BatchSize, Criterion};
use criterion::{criterion_group, criterion_main};
use tempfile::{tempdir, TempDir};

use hive::bag::{BagConfig, BagWriter};
use hive::msg::{Header, Imu, TOPIC_IMU};
use hive::{Clock, QuantaClock, SystemClock};

const WRITES_PER_ITER: usize = 10_000;

fn writer_with<K: Clock>(clock: K) -> (TempDir, BagWriter<K>) {
    let dir = tempdir().expect("tempdir");
    let writer =
        BagWriter::create_with_clock(dir.path().join("bench.bag"), BagConfig::default(), clock)
            .expect("writer");
    (dir, writer)
}

fn write_all<K: Clock>((_dir, mut writer): (TempDir, BagWriter<K>)) {
    let imu = Imu::from_raw(Header::new(0, "LHR-08DE963B"), [0, 0, 4096], [0, 0, 0]);
    for _ in 0..WRITES_PER_ITER {
        writer.write_now(TOPIC_IMU, black_box(&imu)).expect("write");
    }
    writer.finish().expect("finish");
}

fn bench_write_now(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_now");
    group.bench_function("system_clock", |b| {
        b.iter_batched(|| writer_with(SystemClock), write_all, BatchSize::LargeInput);
    });
    group.bench_function("quanta_clock", |b| {
        b.iter_batched(|| writer_with(QuantaClock::new()), write_all, BatchSize::LargeInput);
    });
    group.finish();
}

criterion_group!(benches, bench_write_now);
criterion_main!(benches);
