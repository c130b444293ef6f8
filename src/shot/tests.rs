#![allow(clippy::unwrap_used, reason = "allow in test files")]

use std::num::NonZeroUsize;

use quickcheck_macros::quickcheck;

use super::*;

fn frame(frame_number: u32, avg_luma: i16, sc: u32) -> FrameStats {
    FrameStats {
        frame_number,
        first: frame_number == 0,
        avg_luma,
        ref_avg_luma: avg_luma,
        sc,
        pdist: 2,
        mc_tcor: 100,
        histogram: [0, 0, SUB_SAMPLES as i32, 0, 0],
        ..FrameStats::default()
    }
}

fn corrector(gop: usize) -> GopCorrector {
    GopCorrector::new(NonZeroUsize::new(gop).unwrap(), 0).unwrap()
}

fn step(corrector: &mut GopCorrector, mut stats: FrameStats, boundary: bool) -> Option<ConfirmedShot> {
    stats.shot = corrector.resolve(&stats, boundary);
    corrector.commit(stats)
}

#[test]
fn identical_frames_score_zero() {
    let stats = frame(3, 90, 10);
    assert_eq!(ShotScore::measure(&stats).total(), 0);
}

#[test]
fn hard_cut_scores_high() {
    let stats = FrameStats {
        mc_tcor: 0,
        rs_val: 100,
        cs_val: 100,
        rs_diff: 100 * RSCS_BLOCK_COUNT as u32,
        cs_diff: 100 * RSCS_BLOCK_COUNT as u32,
        histogram: [3700, 300, 219, 300, 3673],
        ..frame(1, 128, 14)
    };
    let score = ShotScore::measure(&stats);
    assert_eq!(
        score,
        ShotScore {
            tcor: 100,
            rs_cs: 100,
            histogram: 90,
            dc: 0
        }
    );
    assert_eq!(score.total(), 87);
}

#[test]
fn dc_term_saturates() {
    let stats = FrameStats {
        ref_avg_luma: 0,
        ..frame(1, 128, 0)
    };
    assert_eq!(ShotScore::measure(&stats).dc, 100);
}

#[test]
fn threshold_follows_control_level() {
    // histogram 30 + dc 10 = 40
    let stats = FrameStats {
        histogram: [SUB_SAMPLES as i32, 0, 0, 0, 0],
        ref_avg_luma: 0,
        ..frame(4, 100, 0)
    };
    assert!(classify(&stats, ControlLevel::default()).0);
    assert!(!classify(&stats, ControlLevel::try_from(4).unwrap()).0);
    assert!(classify(&stats, ControlLevel::try_from(10).unwrap()).0);
}

#[test]
fn first_frame_is_never_a_boundary() {
    let stats = FrameStats {
        histogram: [SUB_SAMPLES as i32, 0, 0, 0, 0],
        mc_tcor: -100,
        ..frame(0, 0, 0)
    };
    assert!(!classify(&stats, ControlLevel::saturating(10)).0);
}

#[test]
fn pdist_classes() {
    assert_eq!(pdist(&frame(0, 0, 100)), 0);
    let at = |tsc, sc| pdist(&FrameStats { tsc, ..frame(1, 0, sc) });
    assert_eq!(at(0, 100), 4);
    assert_eq!(at(20, 0), 1);
    assert_eq!(at(3, 30), 3);
    assert_eq!(at(16, 48), 2);
}

#[test]
fn static_frames_are_repeats() {
    let mut averages = RunningAverages::default();
    let first = FrameStats {
        var: 400,
        ref_var: 400,
        ..frame(0, 80, 20)
    };
    assert_eq!(advise(&first, false, &mut averages), FrameAdvice::empty());
    assert_eq!(averages.luma, 80);

    let still = FrameStats {
        var: 400,
        ref_var: 400,
        ..frame(1, 80, 20)
    };
    let advice = advise(&still, false, &mut averages);
    assert!(advice.contains(FrameAdvice::REPEATED));
    assert!(!advice.contains(FrameAdvice::FILTER));
    assert!(advice.contains(FrameAdvice::LTR_FRIENDLY));
}

#[test]
fn luma_drift_from_the_running_average_is_not_a_repeat() {
    let still = FrameStats {
        var: 400,
        ref_var: 400,
        ..frame(12, 80, 20)
    };
    let mut settled = RunningAverages { luma: 79, sad: 0 };
    let mut drifting = RunningAverages { luma: 60, sad: 0 };

    assert!(advise(&still, false, &mut settled).contains(FrameAdvice::REPEATED));
    assert!(!advise(&still, false, &mut drifting).contains(FrameAdvice::REPEATED));
    assert_eq!(settled.luma, 79);
    assert_eq!(drifting.luma, 63);
}

#[test]
fn noisy_stable_frames_get_filter_and_denoise() {
    let mut averages = RunningAverages { luma: 80, sad: 4 };
    let stats = FrameStats {
        afd: 6,
        tsc: 5,
        mc_tcor: 80,
        mcjtvar: 20,
        mv_diff: 2,
        var: 500,
        ref_var: 510,
        ..frame(7, 80, 30)
    };
    let advice = advise(&stats, false, &mut averages);
    assert!(advice.contains(FrameAdvice::DENOISE | FrameAdvice::FILTER));
    assert!(!advice.intersects(FrameAdvice::REPEATED | FrameAdvice::LTR_FRIENDLY));
    assert_eq!(averages.sad, 4);
}

#[test]
fn boundary_resets_the_averages() {
    let mut averages = RunningAverages { luma: 10, sad: 10 };
    let stats = FrameStats {
        tsc: 50,
        mc_tcor: 95,
        ..frame(9, 200, 60)
    };
    let advice = advise(&stats, true, &mut averages);
    assert!(advice.contains(FrameAdvice::LAST_IN_SHOT));
    assert!(!advice.intersects(FrameAdvice::FILTER | FrameAdvice::LTR_FRIENDLY));
    assert_eq!(averages, RunningAverages { luma: 200, sad: 50 });
}

#[test]
fn boundary_is_confirmed_one_gop_later() {
    let mut gop = corrector(5);
    assert_eq!(step(&mut gop, frame(0, 100, 10), false), None);
    assert_eq!(step(&mut gop, frame(1, 200, 40), true), None);
    assert_eq!(gop.shot_state(1), Some(ShotState::Pending));
    for f in 2..6 {
        assert_eq!(step(&mut gop, frame(f, 200, 40), false), None);
    }
    assert_eq!(gop.shot_state(1), Some(ShotState::Pending));
    let confirmed = step(&mut gop, frame(6, 200, 40), false).unwrap();
    assert_eq!(
        confirmed,
        ConfirmedShot {
            frame_number: 1,
            pdist: 2
        }
    );
    assert_eq!(gop.last_confirmed(), Some(confirmed));
    assert_eq!(gop.pending_count(), 0);
    assert_eq!(gop.shot_state(1), Some(ShotState::Confirmed));
    assert_eq!(gop.confirmed_count(), 1);
    assert_eq!(step(&mut gop, frame(7, 200, 40), false), None);
    assert_eq!(gop.last_confirmed(), Some(confirmed));

    for f in 8..11 {
        step(&mut gop, frame(f, 200, 40), false);
    }
    assert_eq!(gop.confirmed_count(), 1);
    step(&mut gop, frame(11, 200, 40), false);
    assert_eq!(gop.confirmed_count(), 0);
    assert_eq!(gop.shot_state(1), None);
}

#[test]
fn confirmation_survives_frame_counter_wrap() {
    let origin = u32::MAX - 3;
    let at = |i: u32| origin.wrapping_add(i);
    let mut gop = GopCorrector::new(NonZeroUsize::new(5).unwrap(), origin).unwrap();
    step(&mut gop, frame(at(0), 100, 10), false);
    step(&mut gop, frame(at(1), 200, 40), true);
    for i in 2..6 {
        assert_eq!(step(&mut gop, frame(at(i), 200, 40), false), None);
    }
    assert_eq!(at(6), 2);
    let confirmed = step(&mut gop, frame(at(6), 200, 40), false).unwrap();
    assert_eq!(confirmed.frame_number, u32::MAX - 2);
    assert_eq!(gop.shot_state(u32::MAX - 2), Some(ShotState::Confirmed));
    assert_eq!(gop.record(at(5)).map(|r| r.frame_number), Some(1));

    for i in 7..11 {
        step(&mut gop, frame(at(i), 200, 40), false);
    }
    assert_eq!(gop.confirmed_count(), 1);
    step(&mut gop, frame(at(11), 200, 40), false);
    assert_eq!(gop.confirmed_count(), 0);
}

#[test]
fn flash_is_discarded() {
    let mut gop = corrector(10);
    for f in 0..5 {
        step(&mut gop, frame(f, 100, 20), false);
    }
    assert_eq!(gop.last_sc_detection_distance(), 5);
    step(&mut gop, frame(5, 220, 50), true);
    assert_eq!(gop.pending_count(), 1);

    let mut back = frame(6, 102, 21);
    back.shot = gop.resolve(&back, true);
    assert_eq!(back.shot, ShotState::Discarded);
    gop.commit(back);

    assert_eq!(gop.pending_count(), 0);
    assert_eq!(gop.shot_state(5), Some(ShotState::Discarded));
    assert_eq!(gop.shot_state(6), Some(ShotState::Discarded));
    assert_eq!(gop.last_sc_detection_distance(), 7);
    for f in 7..30 {
        assert_eq!(step(&mut gop, frame(f, 100, 20), false), None);
    }
}

#[test]
fn new_scene_after_a_cut_is_not_a_flash() {
    let mut gop = corrector(10);
    for f in 0..5 {
        step(&mut gop, frame(f, 100, 20), false);
    }
    step(&mut gop, frame(5, 220, 50), true);
    let mut other = frame(6, 30, 90);
    assert_eq!(gop.resolve(&other, true), ShotState::Pending);
    other.shot = ShotState::Pending;
    gop.commit(other);
    assert_eq!(gop.pending_count(), 2);
}

#[test]
fn resize_drops_pending_and_restarts_the_horizon() {
    let mut gop = corrector(30);
    step(&mut gop, frame(0, 100, 10), false);
    step(&mut gop, frame(1, 200, 40), true);
    for f in 2..10 {
        step(&mut gop, frame(f, 200, 40), false);
    }
    gop.resize(NonZeroUsize::new(15).unwrap(), 10).unwrap();
    assert_eq!(gop.pending_count(), 0);
    assert_eq!(gop.gop_size(), 15);
    assert_eq!(gop.shot_state(1), None);

    step(&mut gop, frame(10, 30, 80), true);
    for f in 11..25 {
        assert_eq!(step(&mut gop, frame(f, 30, 80), false), None);
    }
    let confirmed = step(&mut gop, frame(25, 30, 80), false).unwrap();
    assert_eq!(confirmed.frame_number, 10);
}

#[test]
fn confirmed_count_stays_within_the_ring() {
    let mut gop = corrector(4);
    for f in 0..40 {
        step(&mut gop, frame(f, (f * 40 % 250) as i16, f * 7 % 90), f % 3 == 1);
        assert!(gop.confirmed_count() <= gop.gop_size());
        assert!(gop.pending_count() <= gop.gop_size());
    }
}

#[quickcheck]
fn confirmation_waits_for_the_full_horizon(boundaries: Vec<bool>, gop: u8) -> bool {
    let gop_size = usize::from(gop % 16) + 1;
    let mut corrector = corrector(gop_size);
    let mut confirmed = Vec::new();
    for (f, &boundary) in boundaries.iter().enumerate() {
        let f = f as u32;
        // distinct scenes so the flash rule never fires
        let stats = frame(f, (f % 2 * 100) as i16, f * 13 % 200);
        if let Some(shot) = step(&mut corrector, stats, boundary && f > 0) {
            if f - shot.frame_number < gop_size as u32 || confirmed.contains(&shot.frame_number) {
                return false;
            }
            confirmed.push(shot.frame_number);
        }
    }
    true
}
