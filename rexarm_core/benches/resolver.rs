use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rexarm_core::{CalibrationContext, DepthModel, DhChain, DisplayRect, resolve};
use rexarm_traits::DepthImage;

// Depth frame with a gentle ramp so every sample is populated
fn synth_depth(width: usize, height: usize) -> DepthImage {
    let mut img = DepthImage::zeros(width, height);
    for row in 0..height {
        for col in 0..width {
            img.set(row, col, 300 + ((row + col) % 400) as u16);
        }
    }
    img
}

fn tune(g: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>) {
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p rexarm_core --bench resolver
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(10));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }
}

pub fn bench_resolve(c: &mut Criterion) {
    let mut g = c.benchmark_group("resolve");
    tune(&mut g);

    let rect = DisplayRect::default();
    let depth = synth_depth(rect.width(), rect.height());
    let model = DepthModel::default();
    let ctx = CalibrationContext::new(320.0, 240.0, [[0.5, 0.0], [0.0, 0.5]]);

    g.bench_function("uncalibrated", |b| {
        b.iter(|| resolve(black_box((600, 300)), &rect, &depth, None, &model))
    });
    g.bench_function("calibrated", |b| {
        b.iter(|| resolve(black_box((600, 300)), &rect, &depth, Some(&ctx), &model))
    });
    g.bench_function("outside", |b| {
        b.iter(|| resolve(black_box((10, 10)), &rect, &depth, Some(&ctx), &model))
    });
    g.finish();
}

pub fn bench_forward(c: &mut Criterion) {
    let mut g = c.benchmark_group("forward_kinematics");
    tune(&mut g);

    let chain = DhChain::from(&rexarm_config::KinematicsCfg::default());
    let angles = [0.1, -0.4, 0.7, 0.2, -0.3, 0.5];
    g.bench_function("wrist_pose", |b| b.iter(|| chain.forward(black_box(&angles))));
    g.finish();
}

criterion_group!(resolver, bench_resolve, bench_forward);
criterion_main!(resolver);
