use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use itertools::Itertools;

use meshbits::entities::{Bit, Pavement};
use meshbits::geometry::Region;
use meshbits::geometry::grip::compute_grip_point;
use meshbits::geometry::primitives::{Point, Rect};
use meshbits::util::CraftConfig;

criterion_main!(benches);
criterion_group!(benches, compute_bits_bench, grip_point_bench);

const SIDES: [f64; 3] = [250.0, 500.0, 1000.0];

/// Disk-like octagon of radius `r` centered at the origin
fn octagon(r: f64) -> Region {
    let vertices = (0..8)
        .map(|i| {
            let a = std::f64::consts::FRAC_PI_4 * (i as f64 + 0.5);
            Point(r * a.cos(), r * a.sin())
        })
        .collect_vec();
    Region::from_polygon(&vertices)
}

fn grid_pavement(side: f64, config: CraftConfig) -> Pavement {
    let n_x = (side / config.bit_length).ceil() as i64;
    let n_y = (side / config.bit_width).ceil() as i64;
    let bits = (-n_x..=n_x)
        .cartesian_product(-n_y..=n_y)
        .map(|(i, j)| {
            let origin = Point(
                i as f64 * (config.bit_length + 3.0),
                j as f64 * (config.bit_width + 3.0),
            );
            Bit::new(origin, Point(1.0, 0.0), config).unwrap()
        })
        .collect_vec();
    Pavement::from_bits(bits, Point(1.0, 0.0), config).unwrap()
}

/// Clipping a full grid of bits against an octagon of growing size
fn compute_bits_bench(c: &mut Criterion) {
    let config = CraftConfig::default();
    let mut group = c.benchmark_group("compute_bits");
    for side in SIDES {
        let region = octagon(side / 2.0);
        let pavement = grid_pavement(side, config);
        group.bench_function(BenchmarkId::from_parameter(side), |b| {
            b.iter(|| {
                let mut pavement = pavement.clone();
                pavement.compute_bits(&region);
                pavement.len()
            })
        });
    }
    group.finish();
}

/// Grip point of an L-shaped piece, whose centroid lies outside the piece
fn grip_point_bench(c: &mut Criterion) {
    let config = CraftConfig::default();
    let horizontal = Region::from_rect(Rect::try_new(0.0, 0.0, 120.0, 8.0).unwrap());
    let vertical = Region::from_rect(Rect::try_new(0.0, 0.0, 8.0, 24.0).unwrap());
    let l_shape = horizontal.union(&vertical);

    c.bench_function("grip_point_l_shape", |b| {
        b.iter(|| compute_grip_point(&l_shape, config.gripper_radius()))
    });
}
