#![allow(clippy::unwrap_used, reason = "allow in test files")]

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro128StarStar;

use super::*;
use crate::params::{SUB_HEIGHT, SUB_WIDTH};

fn load(plane: &[u8]) -> AnalyzedFrame {
    let mut frame = AnalyzedFrame::try_new().unwrap();
    frame.plane.copy_from_slice(plane);
    let sum: u64 = plane.iter().map(|&p| u64::from(p)).sum();
    frame.avg_luma = ((sum + SUB_SAMPLES as u64 / 2) / SUB_SAMPLES as u64) as i16;
    frame
}

fn random_plane(max: u8, seed: &[u8; 16]) -> Vec<u8> {
    let mut rng = Xoshiro128StarStar::from_seed(*seed);
    (0..SUB_SAMPLES).map(|_| rng.random_range(0..=max)).collect()
}

/// Runs `cur` against `reference` after measuring the reference on its own.
fn analyze(reference: &[u8], cur: &[u8]) -> (FrameStats, AnalyzedFrame) {
    let kernels = KernelTable::scalar();
    let config = AscConfig::default();
    let mut aux = AnalyzedFrame::try_new().unwrap();
    let mut ref_frame = load(reference);
    compute(&kernels, &config, &mut ref_frame, None, &mut aux);
    let mut cur_frame = load(cur);
    let stats = compute(&kernels, &config, &mut cur_frame, Some(&ref_frame), &mut aux);
    (stats, cur_frame)
}

#[test]
fn first_frame_is_neutral() {
    let plane = random_plane(255, b"deadbeeflolcakes");
    let mut frame = load(&plane);
    let mut aux = AnalyzedFrame::try_new().unwrap();
    let stats = compute(
        &KernelTable::scalar(),
        &AscConfig::default(),
        &mut frame,
        None,
        &mut aux,
    );
    assert!(stats.first);
    assert_eq!(stats.tsc, 0);
    assert_eq!(stats.afd, 0);
    assert_eq!(stats.tcor, 100);
    assert_eq!(stats.mc_tcor, 100);
    assert!(stats.sc > 0);
    assert!(frame.mvs.iter().all(|mv| *mv == MotionVector::default()));
}

#[test]
fn identical_flat_frames() {
    let plane = vec![128u8; SUB_SAMPLES];
    let (stats, frame) = analyze(&plane, &plane);
    assert_eq!(stats.sc, 0);
    assert_eq!(stats.tsc, 0);
    assert_eq!(stats.afd, 0);
    assert_eq!(stats.var, 0);
    assert_eq!(stats.mc_tcor, 100);
    assert_eq!(stats.histogram, [0, 0, SUB_SAMPLES as i32, 0, 0]);
    assert!(!stats.gain_corrected);
    assert!(frame.mvs.iter().all(|mv| *mv == MotionVector::default()));
}

#[test]
fn textured_frame_against_flat_reference() {
    let flat = vec![128u8; SUB_SAMPLES];
    let noise = random_plane(255, b"deadbeeflolcakes");
    let (stats, _) = analyze(&flat, &noise);
    assert_eq!(stats.mc_tcor, 0);
    assert_eq!(stats.tcor, 0);
    assert_eq!(stats.ref_rs_val + stats.ref_cs_val, 0);
    assert!(stats.rs_diff > 0 && stats.cs_diff > 0);
    assert!(stats.histogram[0] + stats.histogram[4] > SUB_SAMPLES as i32 / 2);
}

#[test]
fn translation_is_found_inside_the_search_range() {
    let reference = random_plane(255, b"deadbeeflolcakes");
    let mut cur = random_plane(255, b"0123456789abcdef");
    for y in 0..SUB_HEIGHT - 3 {
        for x in 5..SUB_WIDTH {
            cur[y * SUB_WIDTH + x] = reference[(y + 3) * SUB_WIDTH + x - 5];
        }
    }
    let (stats, frame) = analyze(&reference, &cur);
    // block (4, 2) lies well inside the shifted area
    let mv = frame.mvs[2 * ME_BLOCKS_X + 4];
    assert_eq!(mv, MotionVector { x: -5, y: 3 });
    assert_eq!(frame.sad[2 * ME_BLOCKS_X + 4], 0);
    assert!(stats.mc_tcor > stats.tcor);
    assert!(stats.mv_mag > 0);
}

#[test]
fn poorly_matched_blocks_are_searched_wider() {
    let reference = random_plane(255, b"deadbeeflolcakes");
    let mut cur = random_plane(255, b"0123456789abcdef");
    for y in 0..SUB_HEIGHT {
        for x in 0..SUB_WIDTH - 20 {
            cur[y * SUB_WIDTH + x] = reference[y * SUB_WIDTH + x + 20];
        }
    }
    let (_, frame) = analyze(&reference, &cur);
    // beyond the regular ±16 range, inside the wide ±32 one
    let idx = 3 * ME_BLOCKS_X + 2;
    assert_eq!(frame.mvs[idx], MotionVector { x: 20, y: 0 });
    assert_eq!(frame.sad[idx], 0);
}

#[test]
fn large_brightness_change_is_gain_corrected() {
    let reference = random_plane(200, b"deadbeeflolcakes");
    let cur: Vec<u8> = reference.iter().map(|&p| p + 40).collect();
    let (stats, frame) = analyze(&reference, &cur);
    assert!(stats.gain_corrected);
    assert_eq!(stats.afd, 40);
    assert_eq!(stats.dc_residual, 0);
    assert_eq!(stats.tsc, 0);
    assert_eq!(stats.mcjtvar, 0);
    assert_eq!(stats.mc_tcor, 100);
    assert!(frame.mvs.iter().all(|mv| *mv == MotionVector::default()));
}

#[test]
fn small_brightness_change_is_left_alone() {
    let reference = random_plane(200, b"deadbeeflolcakes");
    let cur: Vec<u8> = reference.iter().map(|&p| p + 10).collect();
    let (stats, _) = analyze(&reference, &cur);
    assert!(!stats.gain_corrected);
    assert_eq!(stats.afd, 10);
    assert_eq!(stats.dc_residual, 10);
    assert_eq!(stats.jtvar, 100);
}

#[test]
fn variance_of_two_level_plane() {
    let mut plane = vec![0u8; SUB_SAMPLES];
    plane[..SUB_SAMPLES / 2].fill(100);
    assert_eq!(plane_variance(&plane), 2500);
    assert_eq!(plane_variance(&[]), 0);
}
