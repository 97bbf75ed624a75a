use criterion::{black_box, BenchmarkId, Criterion};
use criterion::{criterion_group, criterion_main};
use tempfile::tempdir;

use hive::bag::{BagReader, BagWriter, HandlerError};
use hive::msg::{Axis, Header, Imu, LightSample, ViveLight, TOPIC_IMU, TOPIC_LIGHT};
use hive::solver::Solver;

const RECORDS_PER_TOPIC: u64 = 10_000;

fn sweep(stamp_ns: u64, sensors: u16) -> ViveLight {
    ViveLight {
        header: Header::new(stamp_ns, "LHR-08DE963B"),
        lighthouse: "LHB-4DA0C1C4".to_string(),
        axis: Axis::Horizontal,
        samples: (0..sensors)
            .map(|sensor| LightSample::from_ticks(sensor, 210_000, 480))
            .collect(),
    }
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");
    for &sensors in &[1_u16, 8, 32] {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("bench.bag");
        {
            let mut writer = BagWriter::create(&path).expect("writer");
            let light = sweep(0, sensors);
            let imu = Imu::from_raw(Header::new(0, "LHR-08DE963B"), [0, 0, 4096], [0, 0, 0]);
            for i in 0..RECORDS_PER_TOPIC {
                writer.write(TOPIC_LIGHT, i, &light).expect("light");
                writer.write(TOPIC_IMU, i, &imu).expect("imu");
            }
        }
        let reader = BagReader::open(&path).expect("reader");

        group.bench_with_input(BenchmarkId::new("solver", sensors), &sensors, |b, _| {
            b.iter(|| {
                let mut solver = Solver::new();
                reader
                    .read(TOPIC_LIGHT, &mut solver, &mut ())
                    .expect("read");
                black_box(solver);
            });
        });

        group.bench_with_input(BenchmarkId::new("count", sensors), &sensors, |b, _| {
            b.iter(|| {
                let mut samples = 0usize;
                reader
                    .read(
                        TOPIC_LIGHT,
                        &mut |light: ViveLight, samples: &mut usize| -> Result<(), HandlerError> {
                            *samples += light.samples.len();
                            Ok(())
                        },
                        &mut samples,
                    )
                    .expect("read");
                black_box(samples);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_read);
criterion_main!(benches);
