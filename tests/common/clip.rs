use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro128StarStar;

/// Geometry of a synthetic luma plane.
#[derive(Debug, Clone, Copy)]
pub struct TestClip {
    pub width: usize,
    pub height: usize,
    pub pitch: usize,
}

impl TestClip {
    pub const CIF: Self = Self {
        width: 352,
        height: 288,
        pitch: 352,
    };

    #[must_use]
    pub fn with_pitch(self, pitch: usize) -> Self {
        Self { pitch, ..self }
    }

    /// Renders `content` into a buffer of exactly `pitch * height` samples.
    ///
    /// Padding bytes past `width` are filled with 0xEE so that reads outside
    /// the visible area show up in the statistics.
    #[must_use]
    pub fn render(&self, content: &ClipContent) -> Vec<u8> {
        let mut buf = vec![0xEE; self.pitch * self.height];
        let mut rng = match content {
            ClipContent::Noise { seed } => Some(Xoshiro128StarStar::from_seed(*seed)),
            _ => None,
        };
        for y in 0..self.height {
            let row = &mut buf[y * self.pitch..][..self.width];
            for (x, pix) in row.iter_mut().enumerate() {
                *pix = match content {
                    ClipContent::Flat(value) => *value,
                    ClipContent::Noise { .. } => rng.as_mut().map_or(0, |rng| rng.random()),
                    ClipContent::Fields { top, bottom } => {
                        if y % 2 == 0 {
                            *top
                        } else {
                            *bottom
                        }
                    }
                    ClipContent::Ramp => ((x + y) % 256) as u8,
                };
            }
        }
        buf
    }
}

#[derive(Debug, Clone)]
pub enum ClipContent {
    Flat(u8),
    /// Uniform full-range noise, reproducible per seed.
    Noise { seed: [u8; 16] },
    /// Even rows at `top`, odd rows at `bottom`.
    Fields { top: u8, bottom: u8 },
    Ramp,
}
