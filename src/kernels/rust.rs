use std::num::NonZeroUsize;

use super::{BlockMatch, BlockSearch};
use crate::{
    params::{ME_BLOCK, RSCS_BLOCK},
    util::math::div_round,
};

/// Pixel differences beyond these magnitudes land in the outer histogram buckets.
pub(super) const HIST_THRESH_LO: i32 = 4;
pub(super) const HIST_THRESH_HI: i32 = 12;

pub(super) fn subsample_point(
    src: &[u8],
    src_width: NonZeroUsize,
    src_height: NonZeroUsize,
    src_pitch: NonZeroUsize,
    dst: &mut [u8],
    dst_width: NonZeroUsize,
    dst_height: NonZeroUsize,
    dst_pitch: NonZeroUsize,
    line_sums: &mut [u32],
) {
    let (src_w, src_h) = (src_width.get(), src_height.get());
    let (dst_w, dst_h) = (dst_width.get(), dst_height.get());

    for y in 0..dst_h {
        // centre of the destination cell, always inside the source
        let sy = ((2 * y + 1) * src_h) / (2 * dst_h);
        let src_row = &src[sy * src_pitch.get()..];
        let dst_row = &mut dst[y * dst_pitch.get()..][..dst_w];
        let mut sum = 0u32;
        for (x, out) in dst_row.iter_mut().enumerate() {
            let sx = ((2 * x + 1) * src_w) / (2 * dst_w);
            let pix = src_row[sx];
            *out = pix;
            sum += u32::from(pix);
        }
        line_sums[y] = sum;
    }
}

pub(super) fn avg_luma(line_sums: &[u32], samples_per_line: NonZeroUsize) -> i16 {
    let total: u64 = line_sums.iter().map(|&s| u64::from(s)).sum();
    let count = (line_sums.len() * samples_per_line.get()) as u64;
    if count == 0 {
        return 0;
    }
    div_round(total, count) as i16
}

pub(super) fn rs_cs_4x4(
    src: &[u8],
    pitch: NonZeroUsize,
    wblocks: NonZeroUsize,
    hblocks: NonZeroUsize,
    rs: &mut [u16],
    cs: &mut [u16],
) {
    let pitch = pitch.get();
    for by in 0..hblocks.get() {
        for bx in 0..wblocks.get() {
            let mut acc_rs = 0u32;
            let mut acc_cs = 0u32;
            for j in 0..RSCS_BLOCK {
                let y = by * RSCS_BLOCK + j;
                for i in 0..RSCS_BLOCK {
                    let x = bx * RSCS_BLOCK + i;
                    let pix = i32::from(src[y * pitch + x]);
                    if y > 0 {
                        let d = pix - i32::from(src[(y - 1) * pitch + x]);
                        acc_rs += (d * d) as u32;
                    }
                    if x > 0 {
                        let d = pix - i32::from(src[y * pitch + x - 1]);
                        acc_cs += (d * d) as u32;
                    }
                }
            }
            let idx = by * wblocks.get() + bx;
            rs[idx] = (acc_rs >> 4) as u16;
            cs[idx] = (acc_cs >> 4) as u16;
        }
    }
}

pub(super) fn rs_cs_bound(
    rs: &[u16],
    cs: &[u16],
    rs_cs: &mut [u16],
    wblocks: NonZeroUsize,
    hblocks: NonZeroUsize,
) -> (u32, u32) {
    let len = wblocks.get() * hblocks.get();
    let mut acc_rs = 0u32;
    let mut acc_cs = 0u32;
    for ((out, &r), &c) in rs_cs[..len].iter_mut().zip(&rs[..len]).zip(&cs[..len]) {
        *out = ((u32::from(r) + u32::from(c) + 1) >> 1) as u16;
        acc_rs += u32::from(r);
        acc_cs += u32::from(c);
    }
    (acc_rs / len as u32, acc_cs / len as u32)
}

pub(super) fn rs_cs_diff(
    rs0: &[u16],
    cs0: &[u16],
    rs1: &[u16],
    cs1: &[u16],
    wblocks: NonZeroUsize,
    hblocks: NonZeroUsize,
) -> (u32, u32) {
    let len = wblocks.get() * hblocks.get();
    let rs_diff = rs0[..len]
        .iter()
        .zip(&rs1[..len])
        .map(|(&a, &b)| u32::from(a.abs_diff(b)))
        .sum();
    let cs_diff = cs0[..len]
        .iter()
        .zip(&cs1[..len])
        .map(|(&a, &b)| u32::from(a.abs_diff(b)))
        .sum();
    (rs_diff, cs_diff)
}

pub(super) fn image_diff_histogram(
    src: &[u8],
    reference: &[u8],
    pitch: NonZeroUsize,
    width: NonZeroUsize,
    height: NonZeroUsize,
    histogram: &mut [i32; 5],
) -> (i64, i64) {
    *histogram = [0; 5];
    let mut src_dc = 0i64;
    let mut ref_dc = 0i64;
    for y in 0..height.get() {
        let src_row = &src[y * pitch.get()..][..width.get()];
        let ref_row = &reference[y * pitch.get()..][..width.get()];
        for (&s, &r) in src_row.iter().zip(ref_row) {
            let d = i32::from(s) - i32::from(r);
            let bucket = if d < -HIST_THRESH_HI {
                0
            } else if d < -HIST_THRESH_LO {
                1
            } else if d <= HIST_THRESH_LO {
                2
            } else if d <= HIST_THRESH_HI {
                3
            } else {
                4
            };
            histogram[bucket] += 1;
            src_dc += i64::from(s);
            ref_dc += i64::from(r);
        }
    }
    (src_dc, ref_dc)
}

#[must_use]
pub(super) fn sad_8x8(src: &[u8], reference: &[u8], pitch: usize) -> u32 {
    let mut sum = 0u32;
    for row in 0..ME_BLOCK {
        sum += sad_row(&src[row * pitch..], &reference[row * pitch..]);
    }
    sum
}

#[inline]
fn sad_row(src: &[u8], reference: &[u8]) -> u32 {
    src[..ME_BLOCK]
        .iter()
        .zip(&reference[..ME_BLOCK])
        .map(|(&s, &r)| u32::from(s.abs_diff(r)))
        .sum()
}

pub(super) fn me_sad_8x8_block_search(request: &BlockSearch<'_>) -> BlockMatch<u16> {
    request.assert_in_bounds();
    let pitch = request.pitch.get();
    let src = &request.src[request.src_offset()..];
    let best = request.search(|offset, best| {
        let reference = &request.reference[offset..];
        let mut sum = 0u32;
        for row in 0..ME_BLOCK {
            sum += sad_row(&src[row * pitch..], &reference[row * pitch..]);
            // cannot win any more
            if sum >= best {
                return sum;
            }
        }
        sum
    });
    BlockMatch {
        sad: best.sad.min(u32::from(u16::MAX)) as u16,
        x: best.x,
        y: best.y,
    }
}

pub(super) fn me_sad_8x8_block_fsearch(request: &BlockSearch<'_>) -> BlockMatch<u32> {
    request.assert_in_bounds();
    let pitch = request.pitch.get();
    let src = &request.src[request.src_offset()..];
    request.search(|offset, _| sad_8x8(src, &request.reference[offset..], pitch))
}

pub(super) fn gain_offset(
    src: &[u8],
    dst: &mut [u8],
    width: NonZeroUsize,
    height: NonZeroUsize,
    pitch: NonZeroUsize,
    gain_diff: i16,
) {
    let gain_diff = i32::from(gain_diff);
    for y in 0..height.get() {
        let src_row = &src[y * pitch.get()..][..width.get()];
        let dst_row = &mut dst[y * pitch.get()..][..width.get()];
        for (out, &pix) in dst_row.iter_mut().zip(src_row) {
            *out = (i32::from(pix) - gain_diff).clamp(0, 255) as u8;
        }
    }
}

pub(super) fn ra_ca_pic(
    pic: &[u8],
    width: NonZeroUsize,
    height: NonZeroUsize,
    pitch: NonZeroUsize,
) -> f64 {
    let pitch = pitch.get();
    let blocks_x = width.get() / RSCS_BLOCK;
    let blocks_y = height.get() / RSCS_BLOCK;
    let mut rs = 0u64;
    let mut cs = 0u64;
    let mut count = 0u64;

    for by in 1..blocks_y {
        for bx in 1..blocks_x {
            for j in 0..RSCS_BLOCK {
                let y = by * RSCS_BLOCK + j;
                let row = &pic[y * pitch..];
                let above = &pic[(y - 1) * pitch..];
                for i in 0..RSCS_BLOCK {
                    let x = bx * RSCS_BLOCK + i;
                    let pix = i32::from(row[x]);
                    let dr = pix - i32::from(above[x]);
                    let dc = pix - i32::from(row[x - 1]);
                    rs += (dr * dr) as u64;
                    cs += (dc * dc) as u64;
                }
            }
            count += (RSCS_BLOCK * RSCS_BLOCK) as u64;
        }
    }

    if count == 0 {
        return 0.0;
    }
    (rs as f64 / count as f64 + cs as f64 / count as f64).sqrt()
}
