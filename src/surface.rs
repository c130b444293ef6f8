use std::num::NonZeroUsize;

/// Opaque handle pair naming a hardware-resident frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle {
    pub memory_id: u64,
    pub handle: u64,
}

/// A surface copied into system memory: an 8-bit luma plane with its pitch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPicture {
    pub data: Vec<u8>,
    pub width: NonZeroUsize,
    pub height: NonZeroUsize,
    pub pitch: NonZeroUsize,
}

/// Turns surface handles into readable pictures.
///
/// Implemented by whoever owns the device; the engine never touches GPU memory.
pub trait SurfaceResolver {
    fn resolve(&mut self, surface: SurfaceHandle) -> anyhow::Result<ResolvedPicture>;
}

impl<F> SurfaceResolver for F
where
    F: FnMut(SurfaceHandle) -> anyhow::Result<ResolvedPicture>,
{
    fn resolve(&mut self, surface: SurfaceHandle) -> anyhow::Result<ResolvedPicture> {
        self(surface)
    }
}
