
use std::num::NonZeroUsize;

use crate::{
    error::{AscError, Result, check_plane_len, required_len},
    image::AnalyzedFrame,
    kernels::KernelTable,
    params::{FieldParity, PictureStructure, SUB_HEIGHT_NZ, SUB_WIDTH_NZ},
};

const TWO: NonZeroUsize = NonZeroUsize::MIN.saturating_add(1);

#[derive(Debug, Clone, Copy)]
struct FieldLayout {
    offset: usize,
    rows: NonZeroUsize,
    pitch: NonZeroUsize,
    needed: usize,
}

/// Reduces full-resolution luma to the analysis plane.
///
/// Progressive input is point-sampled over the whole picture. Interlaced
/// input is sampled from one field: every second row starting at the
/// field's parity, so the two fields of a frame never mix.
#[derive(Debug, Clone, Copy)]
pub struct Subsampler {
    width: NonZeroUsize,
    height: NonZeroUsize,
    pitch: NonZeroUsize,
    structure: PictureStructure,
}

impl Subsampler {
    pub fn new(
        width: usize,
        height: usize,
        pitch: usize,
        structure: PictureStructure,
    ) -> Result<Self> {
        let (Some(width), Some(height), Some(pitch)) = (
            NonZeroUsize::new(width),
            NonZeroUsize::new(height),
            NonZeroUsize::new(pitch),
        ) else {
            return Err(AscError::Initialization(format!(
                "dimensions must be positive, got {width}x{height} with pitch {pitch}"
            )));
        };
        if pitch < width {
            return Err(AscError::Initialization(format!(
                "pitch {pitch} is smaller than width {width}"
            )));
        }
        if required_len(width.get(), height.get(), pitch.get()).is_none() {
            return Err(AscError::Initialization(format!(
                "{width}x{height} picture with pitch {pitch} does not fit in memory"
            )));
        }

        let subsampler = Self {
            width,
            height,
            pitch,
            structure,
        };
        if let Some(reason) = subsampler.field_problem(structure) {
            return Err(AscError::Initialization(reason));
        }
        Ok(subsampler)
    }

    #[must_use]
    pub fn structure(&self) -> PictureStructure {
        self.structure
    }

    pub fn set_structure(&mut self, structure: PictureStructure) -> Result<()> {
        if let Some(reason) = self.field_problem(structure) {
            return Err(AscError::UnsupportedConfiguration(reason));
        }
        self.structure = structure;
        Ok(())
    }

    /// Why the picture cannot be sampled as `structure`, if it cannot.
    fn field_problem(&self, structure: PictureStructure) -> Option<String> {
        if !structure.is_interlaced() {
            return None;
        }
        if self.height.get() < 2 {
            return Some("interlaced pictures need at least two rows".into());
        }
        if self.field_layout(FieldParity::Bottom).is_none() {
            return Some(format!(
                "fields of a {}x{} picture with pitch {} do not fit in memory",
                self.width, self.height, self.pitch
            ));
        }
        None
    }

    /// Start offset, row count, row pitch and required length of one field.
    fn field_layout(&self, parity: FieldParity) -> Option<FieldLayout> {
        let rows = NonZeroUsize::new(self.height.get() / 2)?;
        let pitch = self.pitch.checked_mul(TWO)?;
        let offset = parity.row_offset() * self.pitch.get();
        let needed = offset.checked_add(required_len(self.width.get(), rows.get(), pitch.get())?)?;
        Some(FieldLayout {
            offset,
            rows,
            pitch,
            needed,
        })
    }

    /// Subsamples `src` into `frame.plane` and stores its average luma.
    ///
    /// `parity` selects the field for interlaced sessions and is ignored
    /// for progressive ones.
    pub fn run(
        &self,
        kernels: &KernelTable,
        src: &[u8],
        parity: FieldParity,
        frame: &mut AnalyzedFrame,
    ) -> Result<()> {
        if self.structure.is_interlaced() {
            self.run_field(kernels, src, parity, frame)
        } else {
            self.run_progressive(kernels, src, self.pitch, frame)
        }
    }

    /// Point-samples the whole picture, using `pitch` instead of the session's.
    pub fn run_progressive(
        &self,
        kernels: &KernelTable,
        src: &[u8],
        pitch: NonZeroUsize,
        frame: &mut AnalyzedFrame,
    ) -> Result<()> {
        if pitch < self.width {
            return Err(AscError::UnsupportedConfiguration(format!(
                "pitch {pitch} is smaller than width {}",
                self.width
            )));
        }
        check_plane_len(src.len(), self.width.get(), self.height.get(), pitch.get())?;
        self.sample(kernels, src, self.height, pitch, frame);
        Ok(())
    }

    fn run_field(
        &self,
        kernels: &KernelTable,
        src: &[u8],
        parity: FieldParity,
        frame: &mut AnalyzedFrame,
    ) -> Result<()> {
        let Some(field) = self.field_layout(parity) else {
            return Err(AscError::UnsupportedConfiguration(
                "picture too small to split into fields".into(),
            ));
        };
        if src.len() < field.needed {
            return Err(AscError::BufferTooSmall {
                needed: field.needed,
                available: src.len(),
            });
        }

        self.sample(kernels, &src[field.offset..], field.rows, field.pitch, frame);
        Ok(())
    }

    fn sample(
        &self,
        kernels: &KernelTable,
        src: &[u8],
        height: NonZeroUsize,
        pitch: NonZeroUsize,
        frame: &mut AnalyzedFrame,
    ) {
        kernels.subsample(
            src,
            self.width,
            height,
            pitch,
            &mut frame.plane,
            SUB_WIDTH_NZ,
            SUB_HEIGHT_NZ,
            SUB_WIDTH_NZ,
            &mut frame.line_sums,
        );
        frame.avg_luma = kernels.avg_luma(&frame.line_sums, SUB_WIDTH_NZ);
    }
}
