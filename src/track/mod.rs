//! Per-frame marker tracking.
//!
//! `MarkerTracker` runs the rig's fixed filter chain over one RGB frame and
//! extracts the red and green marker centroids:
//!
//! 1. Gaussian blur over the frame
//! 2. Channel split plus Rec.601 luma
//! 3. Threshold-to-zero on the red and green planes
//! 4. Brightness gating against the thresholded luma
//! 5. 3x3 dilation of both planes
//! 6. Mutual suppression (red first, then green)
//! 7. Intensity-weighted centroid of each mask
//!
//! The chain is branch-free and stateless; the only persistent state in the
//! pipeline is the pair of overlay accumulators, which live elsewhere.

mod centroid;
mod filter;

pub use centroid::{center_of_mass, Centroid};
pub use filter::{
    apply_gate, dilate, gaussian_blur, luma, split_rgb, suppress_weaker, threshold_to_zero,
};

use anyhow::{anyhow, Result};

use crate::frame::{Frame, Plane};
use crate::Ticks;

/// Filter-chain parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackerParams {
    /// Gaussian kernel side length. Must be odd.
    pub blur_kernel: u32,
    /// Threshold-to-zero level for the red and green channel planes.
    pub channel_threshold: u8,
    /// Threshold-to-zero level for the luma gate.
    pub brightness_threshold: u8,
    /// 3x3 dilation passes applied to each mask.
    pub dilate_iterations: u32,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            blur_kernel: 11,
            channel_threshold: 100,
            brightness_threshold: 50,
            dilate_iterations: 3,
        }
    }
}

impl TrackerParams {
    pub fn validate(&self) -> Result<()> {
        if self.blur_kernel == 0 || self.blur_kernel % 2 == 0 {
            return Err(anyhow!(
                "blur_kernel must be odd, got {}",
                self.blur_kernel
            ));
        }
        Ok(())
    }
}

/// Final marker masks for one frame, after dilation and suppression.
#[derive(Clone, Debug)]
pub struct MarkerMasks {
    pub red: Plane,
    pub green: Plane,
}

/// Per-frame tracking result.
///
/// A `None` centroid means the corresponding mask was empty (a dropout);
/// the logging boundary substitutes `(0, 0)`.
#[derive(Clone, Copy, Debug)]
pub struct TrackSample {
    pub ticks: Ticks,
    pub red: Option<Centroid>,
    pub green: Option<Centroid>,
}

/// Runs the fixed filter chain over frames.
pub struct MarkerTracker {
    params: TrackerParams,
}

impl MarkerTracker {
    pub fn new(params: TrackerParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &TrackerParams {
        &self.params
    }

    /// Run the chain over one frame, pairing the result with the frame's
    /// timestamp ticks.
    pub fn process(&self, frame: &Frame, ticks: Ticks) -> Result<(TrackSample, MarkerMasks)> {
        let blurred = gaussian_blur(frame, self.params.blur_kernel)?;

        let (mut red, mut green, _blue) = split_rgb(&blurred);
        let mut bright = luma(&blurred);

        threshold_to_zero(&mut red, self.params.channel_threshold);
        threshold_to_zero(&mut green, self.params.channel_threshold);
        threshold_to_zero(&mut bright, self.params.brightness_threshold);

        apply_gate(&mut red, &bright)?;
        apply_gate(&mut green, &bright)?;

        let mut red = dilate(&red, self.params.dilate_iterations);
        let mut green = dilate(&green, self.params.dilate_iterations);

        suppress_weaker(&mut red, &mut green)?;

        let sample = TrackSample {
            ticks,
            red: center_of_mass(&red),
            green: center_of_mass(&green),
        };
        Ok((sample, MarkerMasks { red, green }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Paint a filled disk of the given color onto a frame.
    fn paint_disk(frame: &mut Frame, cx: i64, cy: i64, radius: i64, rgb: [u8; 3]) {
        for y in (cy - radius).max(0)..=(cy + radius).min(frame.height() as i64 - 1) {
            for x in (cx - radius).max(0)..=(cx + radius).min(frame.width() as i64 - 1) {
                let dx = x - cx;
                let dy = y - cy;
                if dx * dx + dy * dy <= radius * radius {
                    frame.set_rgb(x as u32, y as u32, rgb);
                }
            }
        }
    }

    #[test]
    fn default_params_are_valid() {
        assert!(TrackerParams::default().validate().is_ok());
    }

    #[test]
    fn even_blur_kernel_is_rejected() {
        let params = TrackerParams {
            blur_kernel: 8,
            ..TrackerParams::default()
        };
        assert!(MarkerTracker::new(params).is_err());
    }

    #[test]
    fn dark_frame_yields_dropouts() -> Result<()> {
        let tracker = MarkerTracker::new(TrackerParams::default())?;
        let frame = Frame::black(64, 48);
        let (sample, masks) = tracker.process(&frame, 100)?;
        assert_eq!(sample.ticks, 100);
        assert!(sample.red.is_none());
        assert!(sample.green.is_none());
        assert!(masks.red.is_blank());
        assert!(masks.green.is_blank());
        Ok(())
    }

    #[test]
    fn tracks_painted_markers_near_their_centers() -> Result<()> {
        let tracker = MarkerTracker::new(TrackerParams::default())?;
        let mut frame = Frame::black(160, 120);
        paint_disk(&mut frame, 40, 60, 8, [220, 30, 30]);
        paint_disk(&mut frame, 120, 30, 8, [30, 220, 30]);

        let (sample, _masks) = tracker.process(&frame, 0)?;
        let red = sample.red.expect("red marker tracked");
        let green = sample.green.expect("green marker tracked");

        // Blur and dilation are symmetric, so the centroid stays close to
        // the disk center.
        assert!((red.x - 40.0).abs() < 1.5, "red.x = {}", red.x);
        assert!((red.y - 60.0).abs() < 1.5, "red.y = {}", red.y);
        assert!((green.x - 120.0).abs() < 1.5, "green.x = {}", green.x);
        assert!((green.y - 30.0).abs() < 1.5, "green.y = {}", green.y);
        Ok(())
    }

    #[test]
    fn masks_are_disjoint_after_suppression() -> Result<()> {
        let tracker = MarkerTracker::new(TrackerParams::default())?;
        let mut frame = Frame::black(96, 96);
        // Overlapping disks: suppression decides pixel by pixel.
        paint_disk(&mut frame, 44, 48, 10, [220, 30, 30]);
        paint_disk(&mut frame, 52, 48, 10, [30, 220, 30]);

        let (_sample, masks) = tracker.process(&frame, 0)?;
        for (r, g) in masks.red.data().iter().zip(masks.green.data()) {
            assert!(
                !(*r > 0 && *g > 0 && r != g),
                "pixel claimed by both masks with unequal intensity"
            );
        }
        Ok(())
    }
}
