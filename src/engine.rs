//! The per-session analysis engine.
//!
//! [`Asc`] owns two frame slots that trade places after every analyzed
//! frame, the history ring used to correct shot decisions, and the LTR
//! tracker. Frames are borrowed only for the duration of a call.

#[cfg(test)]
mod tests;

use std::{mem, num::NonZeroUsize};

use tracing::{debug, trace, warn};

use crate::{
    error::{AscError, Result, check_plane_len},
    image::{AnalyzedFrame, FrameRecord},
    kernels::{KernelTable, KernelTier},
    ltr::LtrTracker,
    params::{
        AscConfig, ControlLevel, FieldParity, FrameAdvice, LtrDecision, PictureStructure,
        SUB_HEIGHT, SUB_WIDTH, ShotState, validate_gop_size,
    },
    shot::{self, ConfirmedShot, GopCorrector, RunningAverages},
    stats::{self, FrameStats},
    subsample::Subsampler,
    surface::{SurfaceHandle, SurfaceResolver},
    util::CpuCaps,
};

/// Smallest picture edge [`Asc::calc_ra_ca_pic`] can measure.
const RA_CA_MIN_DIM: usize = 8;

/// Scene-change and complexity analyzer for a stream of luma frames.
///
/// Every call that needs a session fails with [`AscError::NotInitialized`]
/// until [`Asc::init`] succeeds. Advisory getters never fail: before init or
/// before the first frame they report "no boundary, no recommendation".
#[derive(Debug, Default)]
pub struct Asc {
    session: Option<Session>,
}

#[derive(Debug)]
struct Session {
    config: AscConfig,
    kernels: KernelTable,
    subsampler: Subsampler,
    hw_surface: bool,
    current: FrameRecord,
    reference: FrameRecord,
    has_reference: bool,
    /// Gain-corrected copy of the reference, rebuilt when brightness jumps.
    aux: AnalyzedFrame,
    control_level: ControlLevel,
    corrector: GopCorrector,
    averages: RunningAverages,
    ltr: LtrTracker,
    latest: Option<FrameStats>,
    frame_order: u32,
    last_processed: Option<u32>,
}

impl Asc {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a session with the default tunables.
    pub fn init(
        &mut self,
        width: usize,
        height: usize,
        pitch: usize,
        structure: PictureStructure,
        hw_surface: bool,
    ) -> Result<()> {
        self.init_with_config(
            width,
            height,
            pitch,
            structure,
            hw_surface,
            AscConfig::default(),
        )
    }

    /// Starts a session, replacing any previous one.
    ///
    /// On failure the engine is left uninitialized.
    pub fn init_with_config(
        &mut self,
        width: usize,
        height: usize,
        pitch: usize,
        structure: PictureStructure,
        hw_surface: bool,
        config: AscConfig,
    ) -> Result<()> {
        self.session = None;
        config.validate()?;

        let subsampler = Subsampler::new(width, height, pitch, structure)?;
        let kernels = KernelTable::new(CpuCaps::detect());
        let session = Session {
            kernels,
            subsampler,
            hw_surface,
            current: FrameRecord::try_new()?,
            reference: FrameRecord::try_new()?,
            has_reference: false,
            aux: AnalyzedFrame::try_new()?,
            control_level: config.control_level,
            corrector: GopCorrector::new(config.gop_size, 0)?,
            averages: RunningAverages::default(),
            ltr: LtrTracker::new(config.ltr_retention),
            latest: None,
            frame_order: 0,
            last_processed: None,
            config,
        };

        debug!(
            width,
            height,
            pitch,
            ?structure,
            hw_surface,
            tier = ?session.kernels.tier(),
            gop_size = session.config.gop_size.get(),
            "analysis session initialized"
        );
        self.session = Some(session);
        Ok(())
    }

    /// Releases every buffer. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(frames = session.frame_order, "analysis session closed");
        }
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(AscError::NotInitialized)
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(AscError::NotInitialized)
    }

    fn latest(&self) -> Option<&FrameStats> {
        self.session.as_ref()?.latest.as_ref()
    }

    /// Analyzes one frame. `parity` picks the field of interlaced sessions.
    pub fn run_frame(&mut self, pixels: &[u8], parity: FieldParity) -> Result<()> {
        let session = self.session_mut()?;
        session
            .subsampler
            .run(&session.kernels, pixels, parity, &mut session.current.frame)?;
        session.analyze();
        Ok(())
    }

    /// Analyzes one progressive frame laid out with `pitch`, whatever the
    /// session's picture structure.
    pub fn put_frame_progressive(&mut self, pixels: &[u8], pitch: usize) -> Result<()> {
        let session = self.session_mut()?;
        let pitch = NonZeroUsize::new(pitch).ok_or_else(|| {
            AscError::UnsupportedConfiguration("pitch must be positive".into())
        })?;
        session.subsampler.run_progressive(
            &session.kernels,
            pixels,
            pitch,
            &mut session.current.frame,
        )?;
        session.analyze();
        Ok(())
    }

    /// Changes shot-detection sensitivity. Levels above the maximum are clamped.
    pub fn set_control_level(&mut self, level: u8) -> Result<()> {
        let session = self.session_mut()?;
        let clamped = ControlLevel::saturating(level);
        if clamped.get() != level {
            warn!(
                requested = level,
                applied = clamped.get(),
                "control level out of range, clamped"
            );
        }
        session.control_level = clamped;
        debug!(level = clamped.get(), "control level changed");
        Ok(())
    }

    /// Resizes the history ring. Pending shot corrections are lost.
    pub fn set_gop_size(&mut self, gop_size: usize) -> Result<()> {
        let session = self.session_mut()?;
        session.resize_gop(validate_gop_size(gop_size)?)
    }

    /// Restores the GoP size the session was initialized with.
    pub fn reset_gop_size(&mut self) -> Result<()> {
        let session = self.session_mut()?;
        session.resize_gop(session.config.gop_size)
    }

    pub fn set_parity_tff(&mut self) -> Result<()> {
        self.set_structure(PictureStructure::TopFieldFirst)
    }

    pub fn set_parity_bff(&mut self) -> Result<()> {
        self.set_structure(PictureStructure::BottomFieldFirst)
    }

    pub fn set_progressive_op(&mut self) -> Result<()> {
        self.set_structure(PictureStructure::Progressive)
    }

    fn set_structure(&mut self, structure: PictureStructure) -> Result<()> {
        let session = self.session_mut()?;
        session.subsampler.set_structure(structure)?;
        debug!(?structure, "picture structure changed");
        Ok(())
    }

    pub fn set_ltr_retention(&mut self, retention: Option<NonZeroUsize>) -> Result<()> {
        self.session_mut()?.ltr.set_retention(retention);
        Ok(())
    }

    /// Spatial complexity of one picture, independent of the frame stream.
    pub fn calc_ra_ca_pic(
        &self,
        pic: &[u8],
        width: usize,
        height: usize,
        pitch: usize,
    ) -> Result<f64> {
        let session = self.session()?;
        if width < RA_CA_MIN_DIM || height < RA_CA_MIN_DIM {
            return Err(AscError::UnsupportedConfiguration(format!(
                "picture must be at least {RA_CA_MIN_DIM}x{RA_CA_MIN_DIM}, got {width}x{height}"
            )));
        }
        if pitch < width {
            return Err(AscError::UnsupportedConfiguration(format!(
                "pitch {pitch} is smaller than width {width}"
            )));
        }
        check_plane_len(pic.len(), width, height, pitch)?;

        let (Some(width), Some(height), Some(pitch)) = (
            NonZeroUsize::new(width),
            NonZeroUsize::new(height),
            NonZeroUsize::new(pitch),
        ) else {
            return Err(AscError::UnsupportedConfiguration(
                "picture dimensions must be positive".into(),
            ));
        };
        Ok(session.kernels.ra_ca_pic(pic, width, height, pitch))
    }

    /// [`Asc::calc_ra_ca_pic`] on a hardware surface resolved by `resolver`.
    pub fn calc_ra_ca_surf<R: SurfaceResolver + ?Sized>(
        &self,
        resolver: &mut R,
        surface: SurfaceHandle,
    ) -> Result<f64> {
        if !self.session()?.hw_surface {
            return Err(AscError::UnsupportedConfiguration(
                "session was initialized without hardware surface support".into(),
            ));
        }
        let picture = resolver.resolve(surface)?;
        self.calc_ra_ca_pic(
            &picture.data,
            picture.width.get(),
            picture.height.get(),
            picture.pitch.get(),
        )
    }

    /// Whether the most recent frame was classified as a shot boundary.
    ///
    /// This is the immediate decision; the lookback may still retract it.
    #[must_use]
    pub fn frame_shot_decision(&self) -> bool {
        self.latest().is_some_and(|s| s.scene_change)
    }

    /// Whether the most recent frame confirmed an earlier boundary.
    #[must_use]
    pub fn gop_corrected_frame_shot_decision(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.corrector.confirmed_now().is_some())
    }

    /// The boundary confirmed most recently, if any.
    #[must_use]
    pub fn last_confirmed_shot(&self) -> Option<ConfirmedShot> {
        self.session.as_ref()?.corrector.last_confirmed()
    }

    #[must_use]
    pub fn frame_spatial_complexity(&self) -> u32 {
        self.latest().map_or(0, |s| s.sc)
    }

    #[must_use]
    pub fn frame_temporal_complexity(&self) -> u32 {
        self.latest().map_or(0, |s| s.tsc)
    }

    #[must_use]
    pub fn intra_frame_denoise_recommendation(&self) -> bool {
        self.frame_advice().contains(FrameAdvice::DENOISE)
    }

    /// Preferred distance to the next P frame; 0 when there is no advice.
    #[must_use]
    pub fn pdist_advice(&self) -> u8 {
        self.latest().map_or(0, |s| s.pdist)
    }

    /// Whether the most recent frame is a good long-term reference candidate.
    #[must_use]
    pub fn ltr_advice(&self) -> bool {
        self.frame_advice().contains(FrameAdvice::LTR_FRIENDLY)
    }

    #[must_use]
    pub fn repeated_frame_advice(&self) -> bool {
        self.frame_advice().contains(FrameAdvice::REPEATED)
    }

    #[must_use]
    pub fn filter_advice(&self) -> bool {
        self.frame_advice().contains(FrameAdvice::FILTER)
    }

    /// Every advisory of the most recent frame.
    #[must_use]
    pub fn frame_advice(&self) -> FrameAdvice {
        self.latest().map_or(FrameAdvice::empty(), |s| s.advice)
    }

    /// True when the frame before the most recent one closed its shot.
    #[must_use]
    pub fn frame_last_in_scene(&self) -> bool {
        self.frame_advice().contains(FrameAdvice::LAST_IN_SHOT)
    }

    /// Full record of the most recent frame.
    #[must_use]
    pub fn frame_stats(&self) -> Option<FrameStats> {
        self.latest().copied()
    }

    /// Record of an earlier frame that is still inside the history window.
    #[must_use]
    pub fn frame_stats_at(&self, frame_number: u32) -> Option<FrameStats> {
        self.session.as_ref()?.corrector.record(frame_number).copied()
    }

    /// Where `frame_number` stands in the shot correction, while it is still
    /// inside the history window.
    #[must_use]
    pub fn shot_state(&self, frame_number: u32) -> Option<ShotState> {
        self.session.as_ref()?.corrector.shot_state(frame_number)
    }

    #[must_use]
    pub fn pending_shot_count(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, |s| s.corrector.pending_count())
    }

    #[must_use]
    pub fn confirmed_shot_count(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, |s| s.corrector.confirmed_count())
    }

    /// The LTR state machine's current decision.
    pub fn ltr_op_hint(&self) -> Result<LtrDecision> {
        Ok(self.session()?.ltr.decision())
    }

    /// Re-runs the LTR transition with explicit limits.
    pub fn continue_ltr_mode(&mut self, good_limit: u16, bad_limit: u16) -> Result<LtrDecision> {
        Ok(self
            .session_mut()?
            .ltr
            .continue_ltr_mode(good_limit, bad_limit))
    }

    /// Whether `frame_order` is the frame analyzed last.
    #[must_use]
    pub fn check_last_frame_processed(&self, frame_order: u32) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.last_processed == Some(frame_order))
    }

    /// Clears the last-processed marker together with the LTR history.
    pub fn reset_last_frame_processed(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.last_processed = None;
            session.ltr.reset();
        }
    }

    /// A frame has been analyzed since init.
    #[must_use]
    pub fn has_frame_data(&self) -> bool {
        self.latest().is_some()
    }

    /// Number of the most recently analyzed frame.
    #[must_use]
    pub fn frame_number(&self) -> Option<u32> {
        self.latest().map(|s| s.frame_number)
    }

    /// First frame of the current history window.
    #[must_use]
    pub fn starting_frame_number(&self) -> u32 {
        self.session.as_ref().map_or(0, |s| s.corrector.origin())
    }

    #[must_use]
    pub fn subsampling_width(&self) -> usize {
        SUB_WIDTH
    }

    #[must_use]
    pub fn subsampling_height(&self) -> usize {
        SUB_HEIGHT
    }

    #[must_use]
    pub fn gop_size(&self) -> Option<usize> {
        Some(self.session.as_ref()?.corrector.gop_size())
    }

    #[must_use]
    pub fn control_level(&self) -> Option<u8> {
        Some(self.session.as_ref()?.control_level.get())
    }

    #[must_use]
    pub fn picture_structure(&self) -> Option<PictureStructure> {
        Some(self.session.as_ref()?.subsampler.structure())
    }

    /// The field an interlaced host should hand to [`Asc::run_frame`] first.
    #[must_use]
    pub fn first_field(&self) -> Option<FieldParity> {
        self.picture_structure().map(PictureStructure::first_field)
    }

    #[must_use]
    pub fn kernel_tier(&self) -> Option<KernelTier> {
        Some(self.session.as_ref()?.kernels.tier())
    }
}

impl Session {
    /// Measures `current`, decides on it, then rotates the slots.
    fn analyze(&mut self) {
        let frame_number = self.frame_order;
        self.current.frame_number = frame_number;
        self.current.forward_reference = self.has_reference.then_some(self.reference.frame_number);
        self.current.backward_reference = None;

        let reference = self.has_reference.then_some(&self.reference.frame);
        let mut stats = stats::compute(
            &self.kernels,
            &self.config,
            &mut self.current.frame,
            reference,
            &mut self.aux,
        );
        stats.frame_number = frame_number;

        let (boundary, score) = shot::classify(&stats, self.control_level);
        stats.score = score.total();
        stats.shot = self.corrector.resolve(&stats, boundary);
        stats.scene_change = stats.shot == ShotState::Pending;
        stats.pdist = shot::pdist(&stats);
        stats.advice = shot::advise(&stats, stats.scene_change, &mut self.averages);

        self.ltr
            .record(frame_number, stats.advice.contains(FrameAdvice::LTR_FRIENDLY));
        self.ltr
            .continue_ltr_mode(self.config.ltr_good_limit, self.config.ltr_bad_limit);

        trace!(
            frame = frame_number,
            forward = ?self.current.forward_reference,
            backward = ?self.current.backward_reference,
            sc = stats.sc,
            tsc = stats.tsc,
            afd = stats.afd,
            dc_residual = stats.dc_residual,
            tcor = stats.tcor,
            mc_tcor = stats.mc_tcor,
            score = stats.score,
            since_cut = self.corrector.last_sc_detection_distance(),
            ltr_history = self.ltr.history_len(),
            "frame analyzed"
        );

        self.corrector.commit(stats);
        self.latest = Some(stats);
        self.last_processed = Some(frame_number);
        self.frame_order = self.frame_order.wrapping_add(1);

        mem::swap(&mut self.current, &mut self.reference);
        self.has_reference = true;
    }

    fn resize_gop(&mut self, gop_size: NonZeroUsize) -> Result<()> {
        self.corrector.resize(gop_size, self.frame_order)?;
        debug!(
            gop_size = gop_size.get(),
            origin = self.frame_order,
            "history ring resized"
        );
        Ok(())
    }
}
