//! Registration micro-benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kaya_fusion::algorithms::registration::absolute_orientation;
use kaya_fusion::{
    Icp, IcpConfig, JointFilter, JointFilterConfig, OutlierFilter, PointCloud, Quaternion,
    RigidTransform, SamplingFilter, SurfaceNormalConfig, Vec3,
};

fn corner_cloud(n: usize) -> PointCloud {
    let mut cloud = PointCloud::new();
    for i in 0..n {
        for j in 0..n {
            let u = i as f32 * 0.08;
            let v = j as f32 * 0.08;
            let jitter = (i * n + j) as f32 * 1e-5;
            cloud.push(Vec3::new(u, v, jitter));
            cloud.push(Vec3::new(u, jitter, v + 0.08));
        }
    }
    cloud
}

fn bench_icp(c: &mut Criterion) {
    let reading = corner_cloud(12);
    let offset = RigidTransform::new(
        Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), 0.04),
        Vec3::new(0.02, -0.01, 0.03),
    );
    let reference = offset.apply_cloud(&reading);
    let icp = Icp::new(IcpConfig {
        reference_filter: SamplingFilter::SurfaceNormal(SurfaceNormalConfig {
            keep_ratio: 1.0,
            knn: 6,
            seed: 0,
        }),
        outlier_filter: OutlierFilter::None,
        ..IcpConfig::default()
    });

    c.bench_function("icp_corner_288pts", |b| {
        b.iter(|| {
            icp.compute(
                black_box(&reading),
                black_box(&reference),
                &RigidTransform::identity(),
            )
        })
    });
}

fn bench_absolute_orientation(c: &mut Criterion) {
    let from: Vec<Vec3> = (0..25)
        .map(|i| {
            let i = i as f32;
            Vec3::new((i * 0.37).sin(), 1.0 + (i * 0.53).cos(), (i * 0.71).sin())
        })
        .collect();
    let offset = RigidTransform::new(
        Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.6),
        Vec3::new(1.0, 0.2, -0.5),
    );
    let to: Vec<Vec3> = from.iter().map(|p| offset.apply(*p)).collect();

    c.bench_function("absolute_orientation_25pts", |b| {
        b.iter(|| absolute_orientation::solve(black_box(&from), black_box(&to), false))
    });
}

fn bench_joint_filter_cycle(c: &mut Criterion) {
    c.bench_function("joint_filter_predict_update", |b| {
        let mut filter = JointFilter::new(JointFilterConfig::default());
        let measurement = Vec3::new(0.3, 1.1, -0.4);
        b.iter(|| {
            filter.predict(black_box(1.0 / 30.0));
            filter.update(black_box(measurement));
            filter.position()
        })
    });
}

criterion_group!(
    benches,
    bench_icp,
    bench_absolute_orientation,
    bench_joint_filter_cycle
);
criterion_main!(benches);
