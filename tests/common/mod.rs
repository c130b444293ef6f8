#![allow(dead_code)]

pub mod clip;

pub use clip::{ClipContent, TestClip};

use anyhow::Result;
use scene_advisor::{Asc, FieldParity, PictureStructure};

/// Opens a progressive session sized for `clip`.
pub fn open_session(clip: &TestClip) -> Result<Asc> {
    let mut asc = Asc::new();
    asc.init(
        clip.width,
        clip.height,
        clip.pitch,
        PictureStructure::Progressive,
        false,
    )?;
    Ok(asc)
}

/// Feeds `count` copies of `content` and returns the frame number of the last one.
pub fn feed(asc: &mut Asc, clip: &TestClip, content: &ClipContent, count: usize) -> Result<u32> {
    let picture = clip.render(content);
    for _ in 0..count {
        asc.run_frame(&picture, FieldParity::Top)?;
    }
    Ok(asc.frame_number().unwrap_or_default())
}
