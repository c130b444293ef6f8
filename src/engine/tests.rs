#![allow(clippy::unwrap_used, reason = "allow in test files")]

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro128StarStar;

use super::*;

const WIDTH: usize = 176;
const HEIGHT: usize = 144;

fn engine() -> Asc {
    let mut asc = Asc::new();
    asc.init(WIDTH, HEIGHT, WIDTH, PictureStructure::Progressive, false)
        .unwrap();
    asc
}

fn flat(value: u8) -> Vec<u8> {
    vec![value; WIDTH * HEIGHT]
}

fn noise(seed: &[u8; 16]) -> Vec<u8> {
    let mut rng = Xoshiro128StarStar::from_seed(*seed);
    (0..WIDTH * HEIGHT).map(|_| rng.random()).collect()
}

#[test]
fn slots_alternate_and_link_references() {
    let mut asc = engine();
    let picture = flat(90);
    for _ in 0..3 {
        asc.run_frame(&picture, FieldParity::Top).unwrap();
    }
    let session = asc.session.as_ref().unwrap();
    assert!(session.has_reference);
    assert_eq!(session.reference.frame_number, 2);
    assert_eq!(session.reference.forward_reference, Some(1));
    assert_eq!(session.current.frame_number, 1);
    assert_eq!(session.frame_order, 3);
}

#[test]
fn failed_frame_leaves_state_untouched() {
    let mut asc = engine();
    asc.run_frame(&flat(90), FieldParity::Top).unwrap();
    let short = vec![0u8; WIDTH * HEIGHT - 1];
    assert!(matches!(
        asc.run_frame(&short, FieldParity::Top),
        Err(AscError::BufferTooSmall { .. })
    ));
    assert_eq!(asc.frame_number(), Some(0));
    assert_eq!(asc.session.as_ref().unwrap().frame_order, 1);
}

#[test]
fn control_level_is_clamped() {
    let mut asc = engine();
    asc.set_control_level(42).unwrap();
    assert_eq!(asc.control_level(), Some(ControlLevel::MAX));
    asc.set_control_level(3).unwrap();
    assert_eq!(asc.control_level(), Some(3));
}

#[test]
fn gop_size_is_validated() {
    let mut asc = engine();
    assert!(matches!(
        asc.set_gop_size(0),
        Err(AscError::UnsupportedConfiguration(_))
    ));
    assert_eq!(asc.gop_size(), Some(30));
    asc.set_gop_size(12).unwrap();
    assert_eq!(asc.gop_size(), Some(12));
    asc.reset_gop_size().unwrap();
    assert_eq!(asc.gop_size(), Some(30));
}

#[test]
fn resize_moves_the_window_origin() {
    let mut asc = engine();
    let picture = flat(40);
    for _ in 0..7 {
        asc.run_frame(&picture, FieldParity::Top).unwrap();
    }
    assert_eq!(asc.starting_frame_number(), 0);
    asc.set_gop_size(10).unwrap();
    assert_eq!(asc.starting_frame_number(), 7);
    assert_eq!(asc.shot_state(3), None);
    asc.run_frame(&picture, FieldParity::Top).unwrap();
    assert_eq!(asc.shot_state(7), Some(ShotState::None));
}

#[test]
fn custom_config_reaches_the_session() {
    let mut asc = Asc::new();
    let config = AscConfig {
        gop_size: NonZeroUsize::new(8).unwrap(),
        ltr_retention: NonZeroUsize::new(4),
        ..AscConfig::default()
    };
    asc.init_with_config(WIDTH, HEIGHT, WIDTH, PictureStructure::Progressive, false, config)
        .unwrap();
    let picture = flat(70);
    for _ in 0..10 {
        asc.run_frame(&picture, FieldParity::Top).unwrap();
    }
    assert_eq!(asc.gop_size(), Some(8));
    assert_eq!(asc.session.as_ref().unwrap().ltr.history_len(), 4);
}

#[test]
fn invalid_config_leaves_engine_closed() {
    let mut asc = engine();
    let config = AscConfig {
        ltr_bad_limit: 0,
        ..AscConfig::default()
    };
    assert!(
        asc.init_with_config(WIDTH, HEIGHT, WIDTH, PictureStructure::Progressive, false, config)
            .is_err()
    );
    assert!(!asc.is_initialized());
    asc.close();
}

#[test]
fn ltr_history_follows_friendliness() {
    let mut asc = engine();
    let picture = flat(120);
    for _ in 0..31 {
        asc.run_frame(&picture, FieldParity::Top).unwrap();
    }
    let session = asc.session.as_ref().unwrap();
    assert_eq!(session.ltr.history_len(), 31);
    assert_eq!(session.ltr.decision(), LtrDecision::Continue);

    asc.reset_last_frame_processed();
    assert_eq!(asc.session.as_ref().unwrap().ltr.history_len(), 0);
    assert_eq!(asc.ltr_op_hint().unwrap(), LtrDecision::Stop);
}

#[test]
fn cut_is_reported_immediately() {
    let mut asc = engine();
    asc.run_frame(&flat(100), FieldParity::Top).unwrap();
    asc.run_frame(&noise(b"deadbeeflolcakes"), FieldParity::Top)
        .unwrap();
    assert!(asc.frame_shot_decision());
    assert!(asc.frame_last_in_scene());
    assert!(!asc.gop_corrected_frame_shot_decision());
    assert_eq!(asc.shot_state(1), Some(ShotState::Pending));
    assert_eq!(asc.pending_shot_count(), 1);
    let stats = asc.frame_stats().unwrap();
    assert!(stats.gain_corrected);
    assert!(stats.score >= 40);
}
