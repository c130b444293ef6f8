use bitflags::bitflags;
use std::num::NonZeroUsize;

use crate::error::{AscError, Result};

/// Width of the low-resolution analysis plane.
pub const SUB_WIDTH: usize = 128;
/// Height of the low-resolution analysis plane.
pub const SUB_HEIGHT: usize = 64;
/// Samples in one analysis plane.
pub const SUB_SAMPLES: usize = SUB_WIDTH * SUB_HEIGHT;
pub const SUB_WIDTH_NZ: NonZeroUsize = non_zero(SUB_WIDTH);
pub const SUB_HEIGHT_NZ: NonZeroUsize = non_zero(SUB_HEIGHT);

/// Edge length of the blocks Rs/Cs are measured on.
pub const RSCS_BLOCK: usize = 4;
pub const RSCS_BLOCKS_X: usize = SUB_WIDTH / RSCS_BLOCK;
pub const RSCS_BLOCKS_Y: usize = SUB_HEIGHT / RSCS_BLOCK;
pub const RSCS_BLOCK_COUNT: usize = RSCS_BLOCKS_X * RSCS_BLOCKS_Y;

/// Edge length of the motion search blocks.
pub const ME_BLOCK: usize = 8;
pub const ME_BLOCKS_X: usize = SUB_WIDTH / ME_BLOCK;
pub const ME_BLOCKS_Y: usize = SUB_HEIGHT / ME_BLOCK;
pub const ME_BLOCK_COUNT: usize = ME_BLOCKS_X * ME_BLOCKS_Y;

pub const RSCS_BLOCKS_X_NZ: NonZeroUsize = non_zero(RSCS_BLOCKS_X);
pub const RSCS_BLOCKS_Y_NZ: NonZeroUsize = non_zero(RSCS_BLOCKS_Y);

const fn non_zero(value: usize) -> NonZeroUsize {
    match NonZeroUsize::new(value) {
        Some(value) => value,
        None => panic!("analysis dimensions are non-zero"),
    }
}

pub const DEFAULT_GOP_SIZE: usize = 30;
pub const MAX_GOP_SIZE: usize = 256;

pub const DEFAULT_LTR_GOOD_LIMIT: u16 = 30;
pub const DEFAULT_LTR_BAD_LIMIT: u16 = 5;

/// Picture structure of the incoming frames, using the host's integer codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PictureStructure {
    #[default]
    Progressive = 0,
    TopFieldFirst = 1,
    BottomFieldFirst = 2,
}

impl TryFrom<u32> for PictureStructure {
    type Error = AscError;

    fn try_from(val: u32) -> Result<Self> {
        Ok(match val {
            0 => Self::Progressive,
            1 => Self::TopFieldFirst,
            2 => Self::BottomFieldFirst,
            _ => {
                return Err(AscError::UnsupportedConfiguration(format!(
                    "invalid picture structure, must be 0-2, got {val}"
                )));
            }
        })
    }
}

impl PictureStructure {
    #[must_use]
    pub fn is_interlaced(self) -> bool {
        self != Self::Progressive
    }

    /// The field analyzed first for this structure.
    #[must_use]
    pub fn first_field(self) -> FieldParity {
        match self {
            Self::BottomFieldFirst => FieldParity::Bottom,
            _ => FieldParity::Top,
        }
    }
}

/// Which field of an interlaced frame is analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldParity {
    #[default]
    Top = 0,
    Bottom = 1,
}

impl TryFrom<u32> for FieldParity {
    type Error = AscError;

    fn try_from(val: u32) -> Result<Self> {
        Ok(match val {
            0 => Self::Top,
            1 => Self::Bottom,
            _ => {
                return Err(AscError::UnsupportedConfiguration(format!(
                    "invalid field parity, must be 0 or 1, got {val}"
                )));
            }
        })
    }
}

impl FieldParity {
    /// Index of the first source row belonging to this field.
    #[must_use]
    pub fn row_offset(self) -> usize {
        self as usize
    }
}

/// Shot-detection sensitivity. Higher levels lower the decision threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ControlLevel(u8);

impl ControlLevel {
    pub const MAX: u8 = 10;

    /// Builds a level, saturating at [`ControlLevel::MAX`].
    #[must_use]
    pub fn saturating(level: u8) -> Self {
        Self(level.min(Self::MAX))
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Score a frame must reach to be classified as a shot boundary.
    #[must_use]
    pub fn shot_threshold(self) -> u32 {
        60 - 4 * u32::from(self.0)
    }
}

impl Default for ControlLevel {
    fn default() -> Self {
        Self(5)
    }
}

impl TryFrom<u8> for ControlLevel {
    type Error = AscError;

    fn try_from(val: u8) -> Result<Self> {
        if val > Self::MAX {
            return Err(AscError::UnsupportedConfiguration(format!(
                "invalid control level, must be 0-{}, got {val}",
                Self::MAX
            )));
        }
        Ok(Self(val))
    }
}

/// Outcome of the long-term-reference state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LtrDecision {
    #[default]
    Stop,
    Continue,
}

/// Where a frame's shot-boundary classification stands in the GoP correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShotState {
    #[default]
    None,
    /// Classified as a boundary, still inside the lookback window.
    Pending,
    /// Survived the lookback window. Never changes afterwards.
    Confirmed,
    /// Retracted by the lookback (single-frame flash).
    Discarded,
}

bitflags! {
    /// Per-frame advisory bits handed to the encoder.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FrameAdvice: u8 {
        const REPEATED = 0x01;
        const DENOISE = 0x02;
        const FILTER = 0x04;
        const LTR_FRIENDLY = 0x08;
        const LAST_IN_SHOT = 0x10;
    }
}

/// Motion search radius in analysis-plane pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRange {
    pub x: usize,
    pub y: usize,
}

/// Tunables of an analysis session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AscConfig {
    pub control_level: ControlLevel,
    pub gop_size: NonZeroUsize,
    /// Consecutive LTR-friendly frames needed to keep recommending LTR.
    pub ltr_good_limit: u16,
    /// Consecutive unfriendly frames that stop the LTR recommendation.
    pub ltr_bad_limit: u16,
    /// Keep at most this many LTR observations. `None` keeps all of them.
    pub ltr_retention: Option<NonZeroUsize>,
    pub search_range: SearchRange,
    /// Range used to search again for blocks whose first match was poor.
    pub wide_search_range: SearchRange,
}

impl Default for AscConfig {
    fn default() -> Self {
        Self {
            control_level: ControlLevel::default(),
            gop_size: NonZeroUsize::new(DEFAULT_GOP_SIZE).unwrap_or(NonZeroUsize::MIN),
            ltr_good_limit: DEFAULT_LTR_GOOD_LIMIT,
            ltr_bad_limit: DEFAULT_LTR_BAD_LIMIT,
            ltr_retention: None,
            search_range: SearchRange { x: 16, y: 8 },
            wide_search_range: SearchRange { x: 32, y: 16 },
        }
    }
}

impl AscConfig {
    pub fn validate(&self) -> Result<()> {
        validate_gop_size(self.gop_size.get())?;
        if self.ltr_good_limit == 0 || self.ltr_bad_limit == 0 {
            return Err(AscError::UnsupportedConfiguration(
                "LTR good and bad limits must be positive".into(),
            ));
        }
        if self.search_range.x >= SUB_WIDTH || self.search_range.y >= SUB_HEIGHT {
            return Err(AscError::UnsupportedConfiguration(format!(
                "search range must stay below the analysis resolution {SUB_WIDTH}x{SUB_HEIGHT}"
            )));
        }
        if self.wide_search_range.x < self.search_range.x
            || self.wide_search_range.y < self.search_range.y
        {
            return Err(AscError::UnsupportedConfiguration(
                "wide search range must cover the regular search range".into(),
            ));
        }
        Ok(())
    }
}

/// Rejects GoP sizes the history ring cannot be built for.
pub fn validate_gop_size(gop_size: usize) -> Result<NonZeroUsize> {
    match NonZeroUsize::new(gop_size) {
        Some(size) if size.get() <= MAX_GOP_SIZE => Ok(size),
        _ => Err(AscError::UnsupportedConfiguration(format!(
            "GoP size must be 1-{MAX_GOP_SIZE}, got {gop_size}"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "allow in test files")]
mod tests {
    use super::*;

    #[test]
    fn picture_structure_codes() {
        assert_eq!(
            PictureStructure::try_from(0).unwrap(),
            PictureStructure::Progressive
        );
        assert_eq!(
            PictureStructure::try_from(2).unwrap().first_field(),
            FieldParity::Bottom
        );
        assert!(PictureStructure::try_from(1).unwrap().is_interlaced());
        assert!(PictureStructure::try_from(3).is_err());
    }

    #[test]
    fn control_level_thresholds_fall_with_sensitivity() {
        assert_eq!(ControlLevel::try_from(0).unwrap().shot_threshold(), 60);
        assert_eq!(ControlLevel::default().shot_threshold(), 40);
        assert_eq!(ControlLevel::saturating(200).shot_threshold(), 20);
        assert!(ControlLevel::try_from(11).is_err());
    }

    #[test]
    fn gop_size_bounds() {
        assert!(validate_gop_size(0).is_err());
        assert!(validate_gop_size(MAX_GOP_SIZE + 1).is_err());
        assert_eq!(validate_gop_size(15).unwrap().get(), 15);
    }

    #[test]
    fn default_config_is_valid() {
        AscConfig::default().validate().unwrap();
    }

    #[test]
    fn config_rejects_narrow_wide_range() {
        let config = AscConfig {
            wide_search_range: SearchRange { x: 4, y: 4 },
            ..AscConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
