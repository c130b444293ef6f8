use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro128StarStar;
use scene_advisor::{
    Asc, FieldParity, PictureStructure,
    image::AnalyzedFrame,
    kernels::KernelTable,
    params::{AscConfig, SUB_SAMPLES},
    stats,
};

fn random_plane(rng: &mut Xoshiro128StarStar, len: usize) -> Vec<u8> {
    (0..len).map(|_| rng.random()).collect()
}

pub fn bench_run_frame_1080p(c: &mut Criterion) {
    let mut rng = Xoshiro128StarStar::from_seed(*b"deadbeeflolcakes");
    let (width, height) = (1920, 1080);
    let frames = [
        random_plane(&mut rng, width * height),
        random_plane(&mut rng, width * height),
    ];
    let mut asc = Asc::new();
    asc.init(width, height, width, PictureStructure::Progressive, false)
        .unwrap();

    let mut n = 0;
    c.bench_function("run_frame 1080p", |b| {
        b.iter(|| {
            n ^= 1;
            asc.run_frame(black_box(&frames[n]), FieldParity::Top)
                .unwrap();
        })
    });
}

pub fn bench_frame_stats(c: &mut Criterion) {
    let mut rng = Xoshiro128StarStar::from_seed(*b"deadbeeflolcakes");
    let kernels = KernelTable::default();
    let config = AscConfig::default();
    let mut reference = AnalyzedFrame::try_new().unwrap();
    let mut cur = AnalyzedFrame::try_new().unwrap();
    let mut aux = AnalyzedFrame::try_new().unwrap();
    reference.plane = random_plane(&mut rng, SUB_SAMPLES);
    cur.plane = random_plane(&mut rng, SUB_SAMPLES);
    stats::compute(&kernels, &config, &mut reference, None, &mut aux);

    c.bench_function("frame stats", |b| {
        b.iter(|| stats::compute(&kernels, &config, &mut cur, Some(&reference), &mut aux))
    });
}

criterion_group!(analysis, bench_run_frame_1080p, bench_frame_stats);
criterion_main!(analysis);
