use crate::{
    error::{AscError, Result},
    params::{ME_BLOCK_COUNT, RSCS_BLOCK_COUNT, SUB_HEIGHT, SUB_SAMPLES},
};

/// Displacement of one motion block, in analysis-plane pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotionVector {
    pub x: i32,
    pub y: i32,
}

impl MotionVector {
    #[must_use]
    pub fn magnitude_sq(self) -> u32 {
        (self.x * self.x + self.y * self.y) as u32
    }

    #[must_use]
    pub fn distance_sq(self, other: Self) -> u32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy) as u32
    }
}

/// One frame reduced to the analysis resolution, together with every
/// per-block and per-frame measurement taken on it.
///
/// The buffers are allocated once per session and overwritten in place.
#[derive(Debug, Clone)]
pub struct AnalyzedFrame {
    pub plane: Vec<u8>,
    pub line_sums: Vec<u32>,
    pub mvs: Vec<MotionVector>,
    pub rs: Vec<u16>,
    pub cs: Vec<u16>,
    pub rs_cs: Vec<u16>,
    pub sad: Vec<u16>,
    pub var: i32,
    pub jtvar: i32,
    pub mcjtvar: i32,
    pub tcor: i16,
    pub mc_tcor: i16,
    pub rs_val: u32,
    pub cs_val: u32,
    pub avg_luma: i16,
}

impl AnalyzedFrame {
    pub fn try_new() -> Result<Self> {
        Ok(Self {
            plane: try_buffer(SUB_SAMPLES)?,
            line_sums: try_buffer(SUB_HEIGHT)?,
            mvs: try_buffer(ME_BLOCK_COUNT)?,
            rs: try_buffer(RSCS_BLOCK_COUNT)?,
            cs: try_buffer(RSCS_BLOCK_COUNT)?,
            rs_cs: try_buffer(RSCS_BLOCK_COUNT)?,
            sad: try_buffer(ME_BLOCK_COUNT)?,
            var: 0,
            jtvar: 0,
            mcjtvar: 0,
            tcor: 100,
            mc_tcor: 100,
            rs_val: 0,
            cs_val: 0,
            avg_luma: 0,
        })
    }

    /// Resets every measurement taken against a reference frame.
    pub fn clear_temporal(&mut self) {
        self.mvs.fill(MotionVector::default());
        self.sad.fill(0);
        self.jtvar = 0;
        self.mcjtvar = 0;
        self.tcor = 100;
        self.mc_tcor = 100;
    }
}

/// A video buffer slot: the analyzed frame plus where it sits in the stream.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    pub frame: AnalyzedFrame,
    pub frame_number: u32,
    pub forward_reference: Option<u32>,
    /// Frames are analyzed in arrival order against the previous one, so no
    /// later frame is ever available as a reference and this stays `None`.
    pub backward_reference: Option<u32>,
}

impl FrameRecord {
    pub fn try_new() -> Result<Self> {
        Ok(Self {
            frame: AnalyzedFrame::try_new()?,
            frame_number: 0,
            forward_reference: None,
            backward_reference: None,
        })
    }
}

/// Allocates a zeroed buffer, reporting allocation failure instead of aborting.
pub(crate) fn try_buffer<T: Clone + Default>(len: usize) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|e| {
        AscError::Initialization(format!("cannot allocate {len} analysis samples: {e}"))
    })?;
    buf.resize(len, T::default());
    Ok(buf)
}
