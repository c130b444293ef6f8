#![allow(clippy::undocumented_unsafe_blocks)]

use std::{arch::x86_64::*, num::NonZeroUsize};

use super::{BlockMatch, BlockSearch};
use crate::params::ME_BLOCK;

// The entry points below are only ever bound into a `KernelTable` whose tier
// was selected after SSE4.1 was detected, which is what makes the inner
// `unsafe` calls sound.

pub(super) fn rs_cs_bound(
    rs: &[u16],
    cs: &[u16],
    rs_cs: &mut [u16],
    wblocks: NonZeroUsize,
    hblocks: NonZeroUsize,
) -> (u32, u32) {
    let len = wblocks.get() * hblocks.get();
    assert!(rs.len() >= len && cs.len() >= len && rs_cs.len() >= len);
    unsafe { rs_cs_bound_impl(rs, cs, rs_cs, len) }
}

#[target_feature(enable = "sse4.1")]
unsafe fn rs_cs_bound_impl(rs: &[u16], cs: &[u16], rs_cs: &mut [u16], len: usize) -> (u32, u32) {
    let zero = _mm_setzero_si128();
    let mut acc_rs = _mm_setzero_si128();
    let mut acc_cs = _mm_setzero_si128();
    let mut i = 0;

    while i + 8 <= len {
        let r = _mm_loadu_si128(rs.as_ptr().add(i) as *const __m128i);
        let c = _mm_loadu_si128(cs.as_ptr().add(i) as *const __m128i);
        _mm_storeu_si128(rs_cs.as_mut_ptr().add(i) as *mut __m128i, _mm_avg_epu16(r, c));
        acc_rs = _mm_add_epi32(acc_rs, widen_add_u16(r, zero));
        acc_cs = _mm_add_epi32(acc_cs, widen_add_u16(c, zero));
        i += 8;
    }

    let mut sum_rs = hsum_u32(acc_rs);
    let mut sum_cs = hsum_u32(acc_cs);
    while i < len {
        rs_cs[i] = ((u32::from(rs[i]) + u32::from(cs[i]) + 1) >> 1) as u16;
        sum_rs += u32::from(rs[i]);
        sum_cs += u32::from(cs[i]);
        i += 1;
    }
    (sum_rs / len as u32, sum_cs / len as u32)
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
    assert!(rs0.len() >= len && cs0.len() >= len && rs1.len() >= len && cs1.len() >= len);
    unsafe { (abs_diff_sum(rs0, rs1, len), abs_diff_sum(cs0, cs1, len)) }
}

#[target_feature(enable = "sse4.1")]
unsafe fn abs_diff_sum(a: &[u16], b: &[u16], len: usize) -> u32 {
    let zero = _mm_setzero_si128();
    let mut acc = _mm_setzero_si128();
    let mut i = 0;

    while i + 8 <= len {
        let va = _mm_loadu_si128(a.as_ptr().add(i) as *const __m128i);
        let vb = _mm_loadu_si128(b.as_ptr().add(i) as *const __m128i);
        let d = _mm_sub_epi16(_mm_max_epu16(va, vb), _mm_min_epu16(va, vb));
        acc = _mm_add_epi32(acc, widen_add_u16(d, zero));
        i += 8;
    }

    let mut sum = hsum_u32(acc);
    while i < len {
        sum += u32::from(a[i].abs_diff(b[i]));
        i += 1;
    }
    sum
}

/// Adds the eight u16 lanes of `v` pairwise into four u32 lanes.
#[inline]
#[target_feature(enable = "sse4.1")]
unsafe fn widen_add_u16(v: __m128i, zero: __m128i) -> __m128i {
    _mm_add_epi32(_mm_unpacklo_epi16(v, zero), _mm_unpackhi_epi16(v, zero))
}

#[inline]
#[target_feature(enable = "sse4.1")]
unsafe fn hsum_u32(v: __m128i) -> u32 {
    let mut lanes = [0u32; 4];
    _mm_storeu_si128(lanes.as_mut_ptr() as *mut __m128i, v);
    lanes.iter().sum()
}

#[inline]
#[target_feature(enable = "sse4.1")]
unsafe fn sad_8x8(src: *const u8, reference: *const u8, pitch: usize) -> u32 {
    let mut acc = _mm_setzero_si128();
    for row in (0..ME_BLOCK).step_by(2) {
        let s = _mm_unpacklo_epi64(
            _mm_loadl_epi64(src.add(row * pitch) as *const __m128i),
            _mm_loadl_epi64(src.add((row + 1) * pitch) as *const __m128i),
        );
        let r = _mm_unpacklo_epi64(
            _mm_loadl_epi64(reference.add(row * pitch) as *const __m128i),
            _mm_loadl_epi64(reference.add((row + 1) * pitch) as *const __m128i),
        );
        acc = _mm_add_epi64(acc, _mm_sad_epu8(s, r));
    }
    let total = _mm_add_epi64(acc, _mm_unpackhi_epi64(acc, acc));
    _mm_cvtsi128_si64(total) as u32
}

pub(super) fn me_sad_8x8_block_search(request: &BlockSearch<'_>) -> BlockMatch<u16> {
    let best = me_sad_8x8_block_fsearch(request);
    BlockMatch {
        sad: best.sad.min(u32::from(u16::MAX)) as u16,
        x: best.x,
        y: best.y,
    }
}

pub(super) fn me_sad_8x8_block_fsearch(request: &BlockSearch<'_>) -> BlockMatch<u32> {
    request.assert_in_bounds();
    let pitch = request.pitch.get();
    let src = request.src[request.src_offset()..].as_ptr();
    let reference = request.reference.as_ptr();
    request.search(|offset, _| unsafe { sad_8x8(src, reference.add(offset), pitch) })
}

pub(super) fn gain_offset(
    src: &[u8],
    dst: &mut [u8],
    width: NonZeroUsize,
    height: NonZeroUsize,
    pitch: NonZeroUsize,
    gain_diff: i16,
) {
    let needed = crate::error::required_len(width.get(), height.get(), pitch.get());
    assert!(needed.is_some_and(|n| src.len() >= n && dst.len() >= n));
    unsafe { gain_offset_impl(src, dst, width.get(), height.get(), pitch.get(), gain_diff) }
}

#[target_feature(enable = "sse4.1")]
unsafe fn gain_offset_impl(
    src: &[u8],
    dst: &mut [u8],
    width: usize,
    height: usize,
    pitch: usize,
    gain_diff: i16,
) {
    let magnitude = gain_diff.unsigned_abs().min(255) as u8;
    let k = _mm_set1_epi8(magnitude as i8);

    for y in 0..height {
        let src_row = src.as_ptr().add(y * pitch);
        let dst_row = dst.as_mut_ptr().add(y * pitch);
        let mut x = 0;
        while x + 16 <= width {
            let v = _mm_loadu_si128(src_row.add(x) as *const __m128i);
            let out = if gain_diff > 0 {
                _mm_subs_epu8(v, k)
            } else {
                _mm_adds_epu8(v, k)
            };
            _mm_storeu_si128(dst_row.add(x) as *mut __m128i, out);
            x += 16;
        }
        while x < width {
            let pix = i32::from(*src_row.add(x));
            *dst_row.add(x) = (pix - i32::from(gain_diff)).clamp(0, 255) as u8;
            x += 1;
        }
    }
}
