//! Shot-boundary classification, GoP-bounded correction of those
//! classifications, and the per-frame encoder advisories.

#[cfg(test)]
mod tests;

use std::num::NonZeroUsize;

use smallvec::SmallVec;
use tracing::debug;

use crate::{
    error::Result,
    history::StatsRing,
    image::try_buffer,
    params::{ControlLevel, FrameAdvice, RSCS_BLOCK_COUNT, SUB_SAMPLES, ShotState},
    stats::FrameStats,
    util::math::running_average,
};

const TCOR_WEIGHT: u32 = 35;
const RS_CS_WEIGHT: u32 = 25;
const HISTOGRAM_WEIGHT: u32 = 30;
const DC_WEIGHT: u32 = 10;
/// Average luma change that saturates the DC term.
const DC_SPAN: u32 = 64;

/// Largest average luma change between a flash's neighbours.
const FLASH_LUMA_TOLERANCE: i32 = 8;
/// Largest drift from the running luma average a repeated frame may show.
const REPEAT_LUMA_TOLERANCE: i32 = 2;

const TSC_LIMITS: [u32; 5] = [1, 2, 4, 8, 16];
const SC_LIMITS: [u32; 3] = [8, 24, 48];
/// Preferred P-distance by temporal class (rows) and spatial class (columns).
const PDIST_TABLE: [[u8; 4]; 6] = [
    [4, 4, 4, 4],
    [3, 4, 4, 4],
    [2, 3, 3, 4],
    [2, 2, 3, 3],
    [1, 2, 2, 3],
    [1, 1, 1, 2],
];

/// The four difference measures a shot decision is weighed from, each 0..=100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShotScore {
    pub tcor: u32,
    pub rs_cs: u32,
    pub histogram: u32,
    pub dc: u32,
}

impl ShotScore {
    #[must_use]
    pub fn measure(stats: &FrameStats) -> Self {
        if stats.first {
            return Self::default();
        }

        let tcor = (100 - i32::from(stats.mc_tcor)).clamp(0, 100) as u32;

        let spread = u64::from(stats.rs_val)
            + u64::from(stats.cs_val)
            + u64::from(stats.ref_rs_val)
            + u64::from(stats.ref_cs_val);
        let rs_cs = if spread == 0 {
            0
        } else {
            let delta = u64::from(stats.rs_diff) + u64::from(stats.cs_diff);
            (100 * delta / (spread * RSCS_BLOCK_COUNT as u64)).min(100) as u32
        };

        let outer = (stats.histogram[0] + stats.histogram[4]).max(0) as u64;
        let histogram = (100 * outer / SUB_SAMPLES as u64) as u32;

        let dc_delta = (i32::from(stats.avg_luma) - i32::from(stats.ref_avg_luma)).unsigned_abs();
        let dc = (100 * dc_delta / DC_SPAN).min(100);

        Self {
            tcor,
            rs_cs,
            histogram,
            dc,
        }
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        (TCOR_WEIGHT * self.tcor
            + RS_CS_WEIGHT * self.rs_cs
            + HISTOGRAM_WEIGHT * self.histogram
            + DC_WEIGHT * self.dc)
            / 100
    }
}

/// Raw, uncorrected classification of one frame.
#[must_use]
pub fn classify(stats: &FrameStats, level: ControlLevel) -> (bool, ShotScore) {
    let score = ShotScore::measure(stats);
    let boundary = !stats.first && score.total() >= level.shot_threshold();
    if boundary {
        debug!(
            frame = stats.frame_number,
            score = score.total(),
            threshold = level.shot_threshold(),
            tcor = score.tcor,
            rs_cs = score.rs_cs,
            histogram = score.histogram,
            dc = score.dc,
            "shot boundary detected"
        );
    }
    (boundary, score)
}

/// Whether two frames look like the same scene, for undoing a flash.
fn same_scene(a: &FrameStats, b: &FrameStats) -> bool {
    let luma = (i32::from(a.avg_luma) - i32::from(b.avg_luma)).abs();
    let sc_tolerance = (a.sc / 8).max(4);
    luma <= FLASH_LUMA_TOLERANCE && a.sc.abs_diff(b.sc) <= sc_tolerance
}

/// Preferred distance between P frames for the scene complexity at hand.
#[must_use]
pub fn pdist(stats: &FrameStats) -> u8 {
    if stats.first {
        return 0;
    }
    let tsc_class = TSC_LIMITS
        .iter()
        .position(|&limit| stats.tsc < limit)
        .unwrap_or(TSC_LIMITS.len());
    let sc_class = SC_LIMITS
        .iter()
        .position(|&limit| stats.sc < limit)
        .unwrap_or(SC_LIMITS.len());
    PDIST_TABLE[tsc_class][sc_class]
}

/// Running luma and SAD averages the advisories compare against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningAverages {
    pub luma: i32,
    pub sad: i32,
}

/// Derives the advisory flags of a frame and folds it into the averages.
pub fn advise(stats: &FrameStats, boundary: bool, averages: &mut RunningAverages) -> FrameAdvice {
    let mut advice = FrameAdvice::empty();

    if !stats.first {
        let var_delta = i64::from(stats.var) - i64::from(stats.ref_var);
        let luma_drift = (i32::from(stats.avg_luma) - averages.luma).abs();
        let repeated = stats.afd <= 1
            && luma_drift <= REPEAT_LUMA_TOLERANCE
            && i64::from(stats.tsc) * 16 <= i64::from(averages.sad)
            && var_delta.abs() * 64 <= i64::from(stats.ref_var) + 64;
        let mc_tcor = i32::from(stats.mc_tcor);

        advice.set(FrameAdvice::REPEATED, repeated);
        advice.set(
            FrameAdvice::DENOISE,
            mc_tcor >= 75 && stats.mcjtvar / 2 >= 9,
        );
        advice.set(
            FrameAdvice::FILTER,
            !boundary && !repeated && mc_tcor >= 60 && stats.mcjtvar / 2 >= 4 && stats.mv_diff <= 16,
        );
        advice.set(
            FrameAdvice::LTR_FRIENDLY,
            !boundary && mc_tcor >= 90 && 4 * stats.tsc <= stats.sc + 4,
        );
        advice.set(FrameAdvice::LAST_IN_SHOT, boundary);
    }

    if stats.first || boundary {
        averages.luma = i32::from(stats.avg_luma);
        averages.sad = stats.tsc as i32;
    } else {
        averages.luma = running_average(averages.luma, i32::from(stats.avg_luma));
        averages.sad = running_average(averages.sad, stats.tsc as i32);
    }

    advice
}

/// A boundary that survived the lookback window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedShot {
    pub frame_number: u32,
    /// P-distance advised for the frame when it was classified.
    pub pdist: u8,
}

#[derive(Debug, Clone, Copy)]
struct PendingDetection {
    frame_number: u32,
    offset: usize,
    /// Detection distance before this detection reset it.
    distance_before: u32,
}

/// Holds boundary classifications until a GoP's worth of later frames
/// either confirms them or a flash check retracts them.
#[derive(Debug, Clone)]
pub struct GopCorrector {
    ring: StatsRing,
    pending: SmallVec<[PendingDetection; 4]>,
    /// P-distance advice of pending detections, by intra-GoP offset.
    lookback: Vec<u8>,
    last_sc_detection_distance: u32,
    confirmed_now: Option<ConfirmedShot>,
    last_confirmed: Option<ConfirmedShot>,
    /// Confirmations made during the last GoP, with the frame that made them.
    recent: SmallVec<[(u32, ConfirmedShot); 4]>,
}

impl GopCorrector {
    pub fn new(gop_size: NonZeroUsize, origin: u32) -> Result<Self> {
        Ok(Self {
            ring: StatsRing::new(gop_size, origin)?,
            pending: SmallVec::new(),
            lookback: try_buffer(gop_size.get())?,
            last_sc_detection_distance: 0,
            confirmed_now: None,
            last_confirmed: None,
            recent: SmallVec::new(),
        })
    }

    /// Rebuilds the ring for a new GoP size. Pending detections are dropped.
    pub fn resize(&mut self, gop_size: NonZeroUsize, origin: u32) -> Result<()> {
        let lookback = try_buffer(gop_size.get())?;
        self.ring.rebuild(gop_size, origin)?;
        self.lookback = lookback;
        if !self.pending.is_empty() {
            debug!(
                dropped = self.pending.len(),
                "pending shot detections dropped by GoP resize"
            );
        }
        self.pending.clear();
        self.recent.clear();
        self.confirmed_now = None;
        Ok(())
    }

    #[must_use]
    pub fn gop_size(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn origin(&self) -> u32 {
        self.ring.origin()
    }

    /// Applies the flash rule to a raw classification.
    ///
    /// Returns `Pending` for a boundary that stands, `Discarded` when the
    /// frame undoes the pending boundary right before it, `None` otherwise.
    pub fn resolve(&mut self, stats: &FrameStats, boundary: bool) -> ShotState {
        if !boundary {
            return ShotState::None;
        }
        let frame = stats.frame_number;
        let (prev, before) = (frame.wrapping_sub(1), frame.wrapping_sub(2));
        let Some(idx) = self.pending.iter().position(|p| p.frame_number == prev) else {
            return ShotState::Pending;
        };
        if !self.ring.get(before).is_some_and(|b| same_scene(stats, b)) {
            return ShotState::Pending;
        }

        let flash = self.pending.remove(idx);
        self.lookback[flash.offset] = 0;
        // the commit of this frame adds the last step
        self.last_sc_detection_distance = flash.distance_before.saturating_add(1);
        if let Some(record) = self.ring.get_mut(prev) {
            record.shot = ShotState::Discarded;
        }
        debug!(frame = prev, "single-frame flash discarded");
        ShotState::Discarded
    }

    /// Records the finished frame, confirming whatever the lookback closes.
    pub fn commit(&mut self, stats: FrameStats) -> Option<ConfirmedShot> {
        self.confirmed_now = None;
        let frame = stats.frame_number;
        let horizon = self.ring.len() as u32;
        self.recent.retain(|(at, _)| frame.wrapping_sub(*at) < horizon);

        if stats.shot == ShotState::Pending {
            if let Some(offset) = self.ring.slot(frame) {
                self.lookback[offset] = stats.pdist;
                self.pending.push(PendingDetection {
                    frame_number: frame,
                    offset,
                    distance_before: self.last_sc_detection_distance,
                });
            }
            self.last_sc_detection_distance = 0;
        } else {
            self.last_sc_detection_distance = self.last_sc_detection_distance.saturating_add(1);
        }

        // corrections wait until the ring holds a full GoP
        if self.ring.is_primed() {
            self.reconcile(frame);
        }
        self.ring.insert(stats);
        self.confirmed_now
    }

    fn reconcile(&mut self, frame: u32) {
        let horizon = self.ring.len() as u32;
        while let Some(oldest) = self.pending.first().copied() {
            let age = frame.wrapping_sub(oldest.frame_number);
            if self.last_sc_detection_distance < horizon && age < horizon {
                break;
            }
            self.pending.remove(0);
            let shot = ConfirmedShot {
                frame_number: oldest.frame_number,
                pdist: std::mem::take(&mut self.lookback[oldest.offset]),
            };
            debug!(frame = shot.frame_number, age, "shot boundary confirmed");
            self.confirmed_now = Some(shot);
            self.last_confirmed = Some(shot);
            self.recent.push((frame, shot));
        }
    }

    /// The detection confirmed by the most recent commit, if any.
    #[must_use]
    pub fn confirmed_now(&self) -> Option<ConfirmedShot> {
        self.confirmed_now
    }

    #[must_use]
    pub fn last_confirmed(&self) -> Option<ConfirmedShot> {
        self.last_confirmed
    }

    #[must_use]
    pub fn last_sc_detection_distance(&self) -> u32 {
        self.last_sc_detection_distance
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Boundaries confirmed during the last GoP's worth of frames.
    #[must_use]
    pub fn confirmed_count(&self) -> usize {
        self.recent.len()
    }

    /// State of `frame_number` while it is still in the window, or while its
    /// confirmation is less than a GoP old.
    #[must_use]
    pub fn shot_state(&self, frame_number: u32) -> Option<ShotState> {
        if self
            .recent
            .iter()
            .any(|(_, shot)| shot.frame_number == frame_number)
        {
            return Some(ShotState::Confirmed);
        }
        self.ring.get(frame_number).map(|stats| stats.shot)
    }

    #[must_use]
    pub fn record(&self, frame_number: u32) -> Option<&FrameStats> {
        self.ring.get(frame_number)
    }
}
