use std::num::NonZeroUsize;

use crate::{error::Result, image::try_buffer, stats::FrameStats};

/// Fixed-length ring of per-frame records, addressed by frame number.
///
/// Slots are located by distance from the next expected frame, so the ring
/// keeps working when the `u32` frame counter wraps. The frame due next maps
/// to the slot of the oldest record it will replace.
#[derive(Debug, Clone)]
pub struct StatsRing {
    slots: Vec<Option<FrameStats>>,
    origin: u32,
    next: u32,
    cursor: usize,
    written: usize,
}

impl StatsRing {
    pub fn new(len: NonZeroUsize, origin: u32) -> Result<Self> {
        Ok(Self {
            slots: try_buffer(len.get())?,
            origin,
            next: origin,
            cursor: 0,
            written: 0,
        })
    }

    /// Reallocates to `len` slots and forgets every record.
    pub fn rebuild(&mut self, len: NonZeroUsize, origin: u32) -> Result<()> {
        *self = Self::new(len, origin)?;
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn origin(&self) -> u32 {
        self.origin
    }

    /// Every slot holds a record, so the next insert overwrites one.
    #[must_use]
    pub fn is_primed(&self) -> bool {
        self.written >= self.slots.len()
    }

    /// Ring slot for `frame_number`: the frame due next or one of the last
    /// `len` inserted. `None` for frames before the origin or not yet due.
    #[must_use]
    pub fn slot(&self, frame_number: u32) -> Option<usize> {
        let len = self.slots.len();
        let back = self.next.wrapping_sub(frame_number) as usize;
        if back > len.min(self.written) {
            return None;
        }
        Some((self.cursor + len - back) % len)
    }

    #[must_use]
    pub fn get(&self, frame_number: u32) -> Option<&FrameStats> {
        let slot = self.slot(frame_number)?;
        self.slots[slot]
            .as_ref()
            .filter(|stats| stats.frame_number == frame_number)
    }

    pub fn get_mut(&mut self, frame_number: u32) -> Option<&mut FrameStats> {
        let slot = self.slot(frame_number)?;
        self.slots[slot]
            .as_mut()
            .filter(|stats| stats.frame_number == frame_number)
    }

    /// Stores `stats` in its slot. Storing the frame due next evicts the
    /// oldest record and advances the ring.
    pub fn insert(&mut self, stats: FrameStats) {
        let frame_number = stats.frame_number;
        let Some(slot) = self.slot(frame_number) else {
            return;
        };
        self.slots[slot] = Some(stats);
        if frame_number == self.next {
            self.next = self.next.wrapping_add(1);
            self.cursor = (self.cursor + 1) % self.slots.len();
            self.written += 1;
        }
    }
}
