use thiserror::Error;

/// Errors surfaced by the analysis engine.
///
/// Per-frame numeric edge cases never produce an error: a missing reference
/// or a flat picture degrades to neutral statistics instead.
#[derive(Error, Debug)]
pub enum AscError {
    /// Bad dimensions or a failed allocation while setting up the engine.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// An analysis call was made before a successful `init`.
    #[error("engine is not initialized")]
    NotInitialized,

    /// A parameter outside what the engine can operate with.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// A caller-supplied pixel buffer does not cover the declared geometry.
    #[error("buffer too small: need {needed} samples, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// The external surface resolver failed to hand back a plane.
    #[error("surface access failed: {0:#}")]
    Surface(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AscError>;

/// Number of samples a plane of `rows` rows needs to hold `width` visible
/// samples per row at the given pitch, or `None` if that overflows `usize`.
#[must_use]
pub(crate) const fn required_len(width: usize, rows: usize, pitch: usize) -> Option<usize> {
    if rows == 0 {
        return Some(0);
    }
    match pitch.checked_mul(rows - 1) {
        Some(body) => body.checked_add(width),
        None => None,
    }
}

/// Checks that `available` samples are enough for the plane geometry.
pub(crate) fn check_plane_len(
    available: usize,
    width: usize,
    rows: usize,
    pitch: usize,
) -> Result<()> {
    let Some(needed) = required_len(width, rows, pitch) else {
        return Err(AscError::UnsupportedConfiguration(format!(
            "{width}x{rows} plane with pitch {pitch} does not fit in memory"
        )));
    };
    if available < needed {
        return Err(AscError::BufferTooSmall { needed, available });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "allow in test files")]
mod tests {
    use super::*;

    #[test]
    fn required_len_excludes_trailing_padding() {
        assert_eq!(required_len(10, 3, 16), Some(16 * 2 + 10));
        assert_eq!(required_len(10, 1, 16), Some(10));
        assert_eq!(required_len(10, 0, 16), Some(0));
    }

    #[test]
    fn required_len_detects_overflow() {
        let huge = usize::MAX / 2;
        assert_eq!(required_len(huge, 3, huge), None);
        assert_eq!(required_len(usize::MAX, 1, usize::MAX), Some(usize::MAX));
        assert!(matches!(
            check_plane_len(1024, huge, 3, huge),
            Err(AscError::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn check_plane_len_reports_shortfall() {
        let err = check_plane_len(20, 10, 3, 16).unwrap_err();
        match err {
            AscError::BufferTooSmall { needed, available } => {
                assert_eq!(needed, 42);
                assert_eq!(available, 20);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(check_plane_len(42, 10, 3, 16).is_ok());
    }
}
