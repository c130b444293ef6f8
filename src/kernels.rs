//! Numeric primitives behind a capability-selected dispatch table.
//!
//! Every primitive has a scalar body in [`rust`]. Primitives that benefit from
//! vector units also have SSE4.1 and AVX2 bodies. [`KernelTable::new`] binds one
//! body per primitive from the CPU capabilities once, so the per-frame call
//! sites pay a single indirect call and never re-check the CPU.
//!
//! All tiers agree bit-for-bit; the tests in this module hold them to that.

#[cfg(target_arch = "x86_64")]
mod avx2;
mod rust;
#[cfg(target_arch = "x86_64")]
mod sse41;


use std::num::NonZeroUsize;

use cfg_if::cfg_if;

use crate::{params::ME_BLOCK, util::CpuCaps};

pub type SubsampleFn = fn(
    &[u8],
    NonZeroUsize,
    NonZeroUsize,
    NonZeroUsize,
    &mut [u8],
    NonZeroUsize,
    NonZeroUsize,
    NonZeroUsize,
    &mut [u32],
);
pub type AvgLumaFn = fn(&[u32], NonZeroUsize) -> i16;
pub type RsCsFn = fn(&[u8], NonZeroUsize, NonZeroUsize, NonZeroUsize, &mut [u16], &mut [u16]);
pub type RsCsBoundFn =
    fn(&[u16], &[u16], &mut [u16], NonZeroUsize, NonZeroUsize) -> (u32, u32);
pub type RsCsDiffFn =
    fn(&[u16], &[u16], &[u16], &[u16], NonZeroUsize, NonZeroUsize) -> (u32, u32);
pub type ImageDiffHistogramFn =
    fn(&[u8], &[u8], NonZeroUsize, NonZeroUsize, NonZeroUsize, &mut [i32; 5]) -> (i64, i64);
pub type BlockSearchFn = fn(&BlockSearch<'_>) -> BlockMatch<u16>;
pub type BlockFullSearchFn = fn(&BlockSearch<'_>) -> BlockMatch<u32>;
pub type GainOffsetFn = fn(&[u8], &mut [u8], NonZeroUsize, NonZeroUsize, NonZeroUsize, i16);
pub type RaCaFn = fn(&[u8], NonZeroUsize, NonZeroUsize, NonZeroUsize) -> f64;

/// Widest instruction set the table was bound for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelTier {
    Scalar,
    Sse41,
    Avx2,
}

impl KernelTier {
    #[must_use]
    pub fn select(caps: CpuCaps) -> Self {
        cfg_if! {
            if #[cfg(all(target_arch = "x86_64", not(feature = "no_simd")))] {
                if caps.avx2 {
                    Self::Avx2
                } else if caps.sse41 {
                    Self::Sse41
                } else {
                    Self::Scalar
                }
            } else {
                let _ = caps;
                Self::Scalar
            }
        }
    }
}

/// One 8x8 block search request against a reference plane.
///
/// `src` and `reference` are whole planes sharing `pitch` and the
/// `plane_width` x `plane_height` geometry. The block sits at pixel
/// (`block_x`, `block_y`) of `src`.
#[derive(Debug, Clone, Copy)]
pub struct BlockSearch<'a> {
    pub src: &'a [u8],
    pub reference: &'a [u8],
    pub pitch: NonZeroUsize,
    pub plane_width: NonZeroUsize,
    pub plane_height: NonZeroUsize,
    pub block_x: usize,
    pub block_y: usize,
    pub range_x: usize,
    pub range_y: usize,
}

/// Best candidate found by a block search, as a displacement from the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMatch<S> {
    pub sad: S,
    pub x: i32,
    pub y: i32,
}

impl BlockSearch<'_> {
    /// Inclusive displacement bounds that keep the reference block in the plane.
    #[must_use]
    pub(crate) fn bounds(&self) -> (isize, isize, isize, isize) {
        let max_x = (self.plane_width.get() - ME_BLOCK - self.block_x) as isize;
        let max_y = (self.plane_height.get() - ME_BLOCK - self.block_y) as isize;
        (
            -(self.range_x.min(self.block_x) as isize),
            (self.range_x as isize).min(max_x),
            -(self.range_y.min(self.block_y) as isize),
            (self.range_y as isize).min(max_y),
        )
    }

    #[must_use]
    pub(crate) fn src_offset(&self) -> usize {
        self.block_y * self.pitch.get() + self.block_x
    }

    /// Panics unless both planes cover the declared geometry and the block fits.
    pub(crate) fn assert_in_bounds(&self) {
        let needed = crate::error::required_len(
            self.plane_width.get(),
            self.plane_height.get(),
            self.pitch.get(),
        );
        assert!(needed.is_some_and(|n| self.src.len() >= n && self.reference.len() >= n));
        assert!(self.block_x + ME_BLOCK <= self.plane_width.get());
        assert!(self.block_y + ME_BLOCK <= self.plane_height.get());
    }

    /// Walks every candidate, zero displacement first, keeping strictly better
    /// matches. `eval` gets the reference offset and the best SAD so far and may
    /// return any value `>= best` once it knows the candidate cannot win.
    pub(crate) fn search(&self, mut eval: impl FnMut(usize, u32) -> u32) -> BlockMatch<u32> {
        let (min_x, max_x, min_y, max_y) = self.bounds();
        let origin = self.src_offset() as isize;
        let pitch = self.pitch.get() as isize;

        let mut best = BlockMatch {
            sad: eval(origin as usize, u32::MAX),
            x: 0,
            y: 0,
        };
        for dy in min_y..=max_y {
            for dx in min_x..=max_x {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let offset = (origin + dy * pitch + dx) as usize;
                let sad = eval(offset, best.sad);
                if sad < best.sad {
                    best = BlockMatch {
                        sad,
                        x: dx as i32,
                        y: dy as i32,
                    };
                }
            }
        }
        best
    }
}

/// Concrete kernel bodies bound for one session.
#[derive(Debug, Clone, Copy)]
pub struct KernelTable {
    tier: KernelTier,
    subsample: SubsampleFn,
    avg_luma: AvgLumaFn,
    rs_cs_4x4: RsCsFn,
    rs_cs_bound: RsCsBoundFn,
    rs_cs_diff: RsCsDiffFn,
    image_diff_histogram: ImageDiffHistogramFn,
    block_search: BlockSearchFn,
    block_full_search: BlockFullSearchFn,
    gain_offset: GainOffsetFn,
    ra_ca_pic: RaCaFn,
}

impl KernelTable {
    /// Binds the widest available body for each primitive.
    #[must_use]
    pub fn new(caps: CpuCaps) -> Self {
        let tier = KernelTier::select(caps);
        let mut table = Self::scalar();
        table.tier = tier;

        #[cfg(target_arch = "x86_64")]
        match tier {
            KernelTier::Avx2 => {
                table.rs_cs_bound = avx2::rs_cs_bound;
                table.rs_cs_diff = avx2::rs_cs_diff;
                table.block_search = avx2::me_sad_8x8_block_search;
                table.block_full_search = avx2::me_sad_8x8_block_fsearch;
                table.gain_offset = avx2::gain_offset;
            }
            KernelTier::Sse41 => {
                table.rs_cs_bound = sse41::rs_cs_bound;
                table.rs_cs_diff = sse41::rs_cs_diff;
                table.block_search = sse41::me_sad_8x8_block_search;
                table.block_full_search = sse41::me_sad_8x8_block_fsearch;
                table.gain_offset = sse41::gain_offset;
            }
            KernelTier::Scalar => (),
        }

        table
    }

    /// A table bound to the scalar bodies regardless of the CPU.
    #[must_use]
    pub fn scalar() -> Self {
        Self {
            tier: KernelTier::Scalar,
            subsample: rust::subsample_point,
            avg_luma: rust::avg_luma,
            rs_cs_4x4: rust::rs_cs_4x4,
            rs_cs_bound: rust::rs_cs_bound,
            rs_cs_diff: rust::rs_cs_diff,
            image_diff_histogram: rust::image_diff_histogram,
            block_search: rust::me_sad_8x8_block_search,
            block_full_search: rust::me_sad_8x8_block_fsearch,
            gain_offset: rust::gain_offset,
            ra_ca_pic: rust::ra_ca_pic,
        }
    }

    #[must_use]
    pub fn tier(&self) -> KernelTier {
        self.tier
    }

    /// Point-samples `src` into `dst`, writing one row sum per destination row.
    pub fn subsample(
        &self,
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
        (self.subsample)(
            src, src_width, src_height, src_pitch, dst, dst_width, dst_height, dst_pitch,
            line_sums,
        );
    }

    /// Rounded mean sample value from per-row sums.
    #[must_use]
    pub fn avg_luma(&self, line_sums: &[u32], samples_per_line: NonZeroUsize) -> i16 {
        (self.avg_luma)(line_sums, samples_per_line)
    }

    pub fn rs_cs_4x4(
        &self,
        src: &[u8],
        pitch: NonZeroUsize,
        wblocks: NonZeroUsize,
        hblocks: NonZeroUsize,
        rs: &mut [u16],
        cs: &mut [u16],
    ) {
        (self.rs_cs_4x4)(src, pitch, wblocks, hblocks, rs, cs);
    }

    /// Fills the combined per-block RsCs and returns the per-block means of Rs and Cs.
    pub fn rs_cs_bound(
        &self,
        rs: &[u16],
        cs: &[u16],
        rs_cs: &mut [u16],
        wblocks: NonZeroUsize,
        hblocks: NonZeroUsize,
    ) -> (u32, u32) {
        (self.rs_cs_bound)(rs, cs, rs_cs, wblocks, hblocks)
    }

    /// Sums of absolute per-block Rs and Cs differences between two frames.
    #[must_use]
    pub fn rs_cs_diff(
        &self,
        rs0: &[u16],
        cs0: &[u16],
        rs1: &[u16],
        cs1: &[u16],
        wblocks: NonZeroUsize,
        hblocks: NonZeroUsize,
    ) -> (u32, u32) {
        (self.rs_cs_diff)(rs0, cs0, rs1, cs1, wblocks, hblocks)
    }

    /// Buckets pixel differences into five classes; returns the DC sums of both planes.
    pub fn image_diff_histogram(
        &self,
        src: &[u8],
        reference: &[u8],
        pitch: NonZeroUsize,
        width: NonZeroUsize,
        height: NonZeroUsize,
        histogram: &mut [i32; 5],
    ) -> (i64, i64) {
        (self.image_diff_histogram)(src, reference, pitch, width, height, histogram)
    }

    #[must_use]
    pub fn block_search(&self, request: &BlockSearch<'_>) -> BlockMatch<u16> {
        (self.block_search)(request)
    }

    #[must_use]
    pub fn block_full_search(&self, request: &BlockSearch<'_>) -> BlockMatch<u32> {
        (self.block_full_search)(request)
    }

    pub fn gain_offset(
        &self,
        src: &[u8],
        dst: &mut [u8],
        width: NonZeroUsize,
        height: NonZeroUsize,
        pitch: NonZeroUsize,
        gain_diff: i16,
    ) {
        (self.gain_offset)(src, dst, width, height, pitch, gain_diff);
    }

    #[must_use]
    pub fn ra_ca_pic(
        &self,
        pic: &[u8],
        width: NonZeroUsize,
        height: NonZeroUsize,
        pitch: NonZeroUsize,
    ) -> f64 {
        (self.ra_ca_pic)(pic, width, height, pitch)
    }
}

impl Default for KernelTable {
    fn default() -> Self {
        Self::new(CpuCaps::detect())
    }
}
