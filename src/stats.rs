#[cfg(test)]
mod tests;

use std::num::NonZeroUsize;

use crate::{
    image::{AnalyzedFrame, MotionVector},
    kernels::{BlockSearch, KernelTable},
    params::{
        AscConfig, FrameAdvice, ME_BLOCK, ME_BLOCK_COUNT, ME_BLOCKS_X, ME_BLOCKS_Y,
        RSCS_BLOCKS_X_NZ, RSCS_BLOCKS_Y_NZ, SUB_HEIGHT_NZ, SUB_SAMPLES, SUB_WIDTH, SUB_WIDTH_NZ,
        SearchRange, ShotState,
    },
    util::math::{PairMoments, rounded_sqrt},
};

/// Average luma change above which the reference is gain-corrected first.
pub const GAIN_CORRECTION_LIMIT: i32 = 20;
/// Per-block SAD above which a block is searched again over the wide range.
pub const BAD_BLOCK_SAD: u32 = 12 * (ME_BLOCK * ME_BLOCK) as u32;

/// Everything measured on one frame, plus the decisions taken on it.
///
/// One record per frame lives in the history ring for a GoP's worth of frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame_number: u32,
    /// No reference existed; every temporal field is neutral.
    pub first: bool,
    /// Spatial complexity.
    pub sc: u32,
    /// Temporal complexity: mean per-pixel SAD of the motion search.
    pub tsc: u32,
    /// Mean absolute frame difference against the raw reference.
    pub afd: u32,
    pub avg_luma: i16,
    pub ref_avg_luma: i16,
    pub var: i32,
    pub ref_var: i32,
    pub jtvar: i32,
    pub mcjtvar: i32,
    pub tcor: i16,
    pub mc_tcor: i16,
    pub rs_val: u32,
    pub cs_val: u32,
    pub ref_rs_val: u32,
    pub ref_cs_val: u32,
    pub rs_diff: u32,
    pub cs_diff: u32,
    pub histogram: [i32; 5],
    /// Mean squared motion vector length.
    pub mv_mag: u32,
    /// Mean squared change of the motion field against the reference's.
    pub mv_diff: u32,
    pub gain_corrected: bool,
    /// Mean luma mismatch left between the frame and its reference after
    /// gain correction, from the histogram pass's DC sums.
    pub dc_residual: u32,

    pub score: u32,
    pub scene_change: bool,
    pub shot: ShotState,
    pub advice: FrameAdvice,
    pub pdist: u8,
}

/// Runs the per-frame measurements of `cur` against `reference`.
///
/// `cur.plane` must already hold the subsampled picture. Results land in the
/// fields of `cur`; the returned record carries the frame-level summary.
/// `aux` receives the gain-corrected reference when one is needed.
pub fn compute(
    kernels: &KernelTable,
    config: &AscConfig,
    cur: &mut AnalyzedFrame,
    reference: Option<&AnalyzedFrame>,
    aux: &mut AnalyzedFrame,
) -> FrameStats {
    spatial(kernels, cur);

    let Some(reference) = reference else {
        cur.clear_temporal();
        return FrameStats {
            first: true,
            sc: rounded_sqrt(u64::from(cur.rs_val) + u64::from(cur.cs_val)),
            avg_luma: cur.avg_luma,
            ref_avg_luma: cur.avg_luma,
            var: cur.var,
            ref_var: cur.var,
            tcor: cur.tcor,
            mc_tcor: cur.mc_tcor,
            rs_val: cur.rs_val,
            cs_val: cur.cs_val,
            ref_rs_val: cur.rs_val,
            ref_cs_val: cur.cs_val,
            histogram: [0, 0, SUB_SAMPLES as i32, 0, 0],
            ..FrameStats::default()
        };
    };

    let delta = i32::from(cur.avg_luma) - i32::from(reference.avg_luma);
    let gain_corrected = delta.abs() > GAIN_CORRECTION_LIMIT;
    if gain_corrected {
        kernels.gain_offset(
            &reference.plane,
            &mut aux.plane,
            SUB_WIDTH_NZ,
            SUB_HEIGHT_NZ,
            SUB_WIDTH_NZ,
            (-delta) as i16,
        );
    }
    let ref_plane: &[u8] = if gain_corrected {
        &aux.plane
    } else {
        &reference.plane
    };

    let tsc_sum = motion_search(kernels, config, cur, ref_plane);
    temporal(cur, &reference.plane, ref_plane);

    let mut histogram = [0i32; 5];
    let (src_dc, ref_dc) = kernels.image_diff_histogram(
        &cur.plane,
        ref_plane,
        SUB_WIDTH_NZ,
        SUB_WIDTH_NZ,
        SUB_HEIGHT_NZ,
        &mut histogram,
    );
    let (rs_diff, cs_diff) = kernels.rs_cs_diff(
        &cur.rs,
        &cur.cs,
        &reference.rs,
        &reference.cs,
        RSCS_BLOCKS_X_NZ,
        RSCS_BLOCKS_Y_NZ,
    );

    let (mag, diff) = cur
        .mvs
        .iter()
        .zip(&reference.mvs)
        .fold((0u64, 0u64), |(mag, diff), (&mv, &mv_ref)| {
            (
                mag + u64::from(mv.magnitude_sq()),
                diff + u64::from(mv.distance_sq(mv_ref)),
            )
        });

    FrameStats {
        first: false,
        sc: rounded_sqrt(u64::from(cur.rs_val) + u64::from(cur.cs_val)),
        tsc: (tsc_sum / SUB_SAMPLES as u64) as u32,
        afd: afd(&cur.plane, &reference.plane),
        avg_luma: cur.avg_luma,
        ref_avg_luma: reference.avg_luma,
        var: cur.var,
        ref_var: reference.var,
        jtvar: cur.jtvar,
        mcjtvar: cur.mcjtvar,
        tcor: cur.tcor,
        mc_tcor: cur.mc_tcor,
        rs_val: cur.rs_val,
        cs_val: cur.cs_val,
        ref_rs_val: reference.rs_val,
        ref_cs_val: reference.cs_val,
        rs_diff,
        cs_diff,
        histogram,
        mv_mag: (mag / ME_BLOCK_COUNT as u64) as u32,
        mv_diff: (diff / ME_BLOCK_COUNT as u64) as u32,
        gain_corrected,
        dc_residual: (src_dc.abs_diff(ref_dc) / SUB_SAMPLES as u64) as u32,
        ..FrameStats::default()
    }
}

/// Block and frame Rs/Cs plus variance; needs no reference.
fn spatial(kernels: &KernelTable, cur: &mut AnalyzedFrame) {
    kernels.rs_cs_4x4(
        &cur.plane,
        SUB_WIDTH_NZ,
        RSCS_BLOCKS_X_NZ,
        RSCS_BLOCKS_Y_NZ,
        &mut cur.rs,
        &mut cur.cs,
    );
    let (rs_val, cs_val) = kernels.rs_cs_bound(
        &cur.rs,
        &cur.cs,
        &mut cur.rs_cs,
        RSCS_BLOCKS_X_NZ,
        RSCS_BLOCKS_Y_NZ,
    );
    cur.rs_val = rs_val;
    cur.cs_val = cs_val;
    cur.var = plane_variance(&cur.plane);
}

/// Searches every 8x8 block and returns the summed SAD of the kept matches.
fn motion_search(
    kernels: &KernelTable,
    config: &AscConfig,
    cur: &mut AnalyzedFrame,
    ref_plane: &[u8],
) -> u64 {
    let request = |bx: usize, by: usize, range: SearchRange| BlockSearch {
        src: &cur.plane,
        reference: ref_plane,
        pitch: SUB_WIDTH_NZ,
        plane_width: SUB_WIDTH_NZ,
        plane_height: SUB_HEIGHT_NZ,
        block_x: bx * ME_BLOCK,
        block_y: by * ME_BLOCK,
        range_x: range.x,
        range_y: range.y,
    };

    let mut found = [(MotionVector::default(), 0u32); ME_BLOCK_COUNT];
    for by in 0..ME_BLOCKS_Y {
        for bx in 0..ME_BLOCKS_X {
            let first = kernels.block_search(&request(bx, by, config.search_range));
            let mut best = (
                MotionVector {
                    x: first.x,
                    y: first.y,
                },
                u32::from(first.sad),
            );
            if best.1 > BAD_BLOCK_SAD {
                let wide = kernels.block_full_search(&request(bx, by, config.wide_search_range));
                if wide.sad < best.1 {
                    best = (
                        MotionVector {
                            x: wide.x,
                            y: wide.y,
                        },
                        wide.sad,
                    );
                }
            }
            found[by * ME_BLOCKS_X + bx] = best;
        }
    }

    let mut total = 0u64;
    for ((mv, sad), &(best_mv, best_sad)) in cur.mvs.iter_mut().zip(cur.sad.iter_mut()).zip(&found) {
        *mv = best_mv;
        *sad = best_sad.min(u32::from(u16::MAX)) as u16;
        total += u64::from(best_sad);
    }
    total
}

/// Correlation and joint variance, direct and along the motion field.
fn temporal(cur: &mut AnalyzedFrame, raw_ref: &[u8], ref_plane: &[u8]) {
    let mut direct = PairMoments::default();
    let mut compensated = PairMoments::default();
    let mut jt = 0u64;
    let mut mcjt = 0u64;

    for (&c, &r) in cur.plane.iter().zip(ref_plane) {
        direct.push(c, r);
    }
    for (&c, &r) in cur.plane.iter().zip(raw_ref) {
        let d = i64::from(c) - i64::from(r);
        jt += (d * d) as u64;
    }

    for by in 0..ME_BLOCKS_Y {
        for bx in 0..ME_BLOCKS_X {
            let mv = cur.mvs[by * ME_BLOCKS_X + bx];
            for j in 0..ME_BLOCK {
                let y = by * ME_BLOCK + j;
                let ry = (y as i32 + mv.y) as usize;
                for i in 0..ME_BLOCK {
                    let x = bx * ME_BLOCK + i;
                    let rx = (x as i32 + mv.x) as usize;
                    let c = cur.plane[y * SUB_WIDTH + x];
                    let p = ref_plane[ry * SUB_WIDTH + rx];
                    compensated.push(c, p);
                    let d = i64::from(c) - i64::from(p);
                    mcjt += (d * d) as u64;
                }
            }
        }
    }

    cur.tcor = direct.correlation_percent();
    cur.mc_tcor = compensated.correlation_percent();
    cur.jtvar = (jt / SUB_SAMPLES as u64) as i32;
    cur.mcjtvar = (mcjt / SUB_SAMPLES as u64) as i32;
}

fn afd(cur: &[u8], reference: &[u8]) -> u32 {
    let sum: u64 = cur
        .iter()
        .zip(reference)
        .map(|(&c, &r)| u64::from(c.abs_diff(r)))
        .sum();
    (sum / cur.len().max(1) as u64) as u32
}

/// Population variance of the plane, truncated.
fn plane_variance(plane: &[u8]) -> i32 {
    let Some(n) = NonZeroUsize::new(plane.len()) else {
        return 0;
    };
    let (sum, sum_sq) = plane.iter().fold((0u64, 0u64), |(s, q), &p| {
        let p = u64::from(p);
        (s + p, q + p * p)
    });
    let n = n.get() as u128;
    let spread = n * u128::from(sum_sq) - u128::from(sum) * u128::from(sum);
    (spread / (n * n)) as i32
}
