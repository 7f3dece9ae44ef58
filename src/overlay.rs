//! Detection overlay accumulators.
//!
//! Two RGB frames accumulate marker hits across the session: every nonzero
//! mask pixel paints pure red or pure green into its accumulator, and the
//! trails persist until an explicit reset (the 'c' key in preview mode).
//! `composite()` merges both accumulators into the frame shown in the
//! "threshed" window.

use anyhow::{anyhow, Result};

use crate::frame::Frame;
use crate::track::MarkerMasks;

const RED: [u8; 3] = [255, 0, 0];
const GREEN: [u8; 3] = [0, 255, 0];

pub struct OverlayAccumulator {
    red: Frame,
    green: Frame,
}

impl OverlayAccumulator {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            red: Frame::black(width, height),
            green: Frame::black(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.red.width()
    }

    pub fn height(&self) -> u32 {
        self.red.height()
    }

    /// Paint one frame's masks into the accumulators.
    pub fn paint(&mut self, masks: &MarkerMasks) -> Result<()> {
        if masks.red.width() != self.width() || masks.red.height() != self.height() {
            return Err(anyhow!(
                "mask dimensions {}x{} do not match overlay {}x{}",
                masks.red.width(),
                masks.red.height(),
                self.width(),
                self.height()
            ));
        }
        if !masks.red.same_dims(&masks.green) {
            return Err(anyhow!("red and green mask dimensions differ"));
        }
        for y in 0..self.height() {
            for x in 0..self.width() {
                if masks.red.get(x, y) > 0 {
                    self.red.set_rgb(x, y, RED);
                }
                if masks.green.get(x, y) > 0 {
                    self.green.set_rgb(x, y, GREEN);
                }
            }
        }
        Ok(())
    }

    /// Saturating per-channel sum of both accumulators.
    pub fn composite(&self) -> Frame {
        let mut out = self.red.clone();
        for (o, &g) in out.data_mut().iter_mut().zip(self.green.data()) {
            *o = o.saturating_add(g);
        }
        out
    }

    /// Zero both accumulators.
    pub fn reset(&mut self) {
        self.red.clear();
        self.green.clear();
    }
}
