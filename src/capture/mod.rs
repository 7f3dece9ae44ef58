//! Camera frame sources.
//!
//! This module provides the sources the daemon can acquire from:
//! - Local V4L2 devices (feature: capture-v4l2)
//! - Synthetic stub source (tests, bench runs)
//!
//! All sources produce RGB24 `Frame`s. The capture layer is responsible
//! for:
//! - Opening and configuring the device (resolution, frame rate, autofocus,
//!   manual exposure)
//! - Normalizing device pixel formats to RGB24
//!
//! Frame timestamps do NOT come from the capture layer; every frame is
//! stamped by the external timestamp service (see `clock`).

#[cfg(feature = "capture-v4l2")]
mod normalize;
#[cfg(feature = "capture-v4l2")]
pub mod v4l2;

use anyhow::Result;
#[cfg(not(feature = "capture-v4l2"))]
use anyhow::anyhow;

use crate::frame::Frame;

#[cfg(feature = "capture-v4l2")]
use v4l2::DeviceCameraSource;

/// Configuration for a camera source.
///
/// Defaults match the acquisition rig: 1280x720 at 30 fps, autofocus off,
/// short manual exposure.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0") or "stub://" for the synthetic source.
    pub device: String,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Requested frame rate (frames per second).
    pub fps: u32,
    /// Leave autofocus enabled. The rig disables it so marker blobs stay
    /// stable between frames.
    pub autofocus: bool,
    /// Manual exposure in V4L2 absolute units (100 us). `None` leaves the
    /// device's exposure mode untouched.
    pub exposure: Option<i32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 1280,
            height: 720,
            fps: 30,
            autofocus: false,
            exposure: Some(10),
        }
    }
}

/// Camera frame source.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCameraSource),
    #[cfg(feature = "capture-v4l2")]
    Device(DeviceCameraSource),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.device.starts_with("stub://") {
            Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCameraSource::new(config)),
            })
        } else {
            #[cfg(feature = "capture-v4l2")]
            {
                Ok(Self {
                    backend: CameraBackend::Device(DeviceCameraSource::new(config)?),
                })
            }
            #[cfg(not(feature = "capture-v4l2"))]
            {
                Err(anyhow!(
                    "device capture requires the capture-v4l2 feature (device: {})",
                    config.device
                ))
            }
        }
    }

    /// Open and configure the device.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "capture-v4l2")]
            CameraBackend::Device(source) => source.connect(),
        }
    }

    /// Blocking read of the next frame, normalized to RGB24.
    pub fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "capture-v4l2")]
            CameraBackend::Device(source) => source.next_frame(),
        }
    }

    /// Check if the source is healthy.
    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "capture-v4l2")]
            CameraBackend::Device(source) => source.is_healthy(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "capture-v4l2")]
            CameraBackend::Device(source) => source.stats(),
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub device: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

/// Synthetic camera that paints a red and a green marker disk sweeping
/// horizontally across a black scene. Deterministic per frame count, so
/// tests can predict where the markers are.
struct SyntheticCameraSource {
    config: CameraConfig,
    frame_count: u64,
}

/// Marker colors bright enough to pass the default channel and brightness
/// thresholds after blurring.
const SYNTHETIC_RED: [u8; 3] = [220, 30, 30];
const SYNTHETIC_GREEN: [u8; 3] = [30, 220, 30];

impl SyntheticCameraSource {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!(
            "CameraSource: connected to {} (synthetic, {}x{})",
            self.config.device,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let frame = self.generate_frame();
        self.frame_count += 1;
        Ok(frame)
    }

    /// Marker positions for the current frame count.
    fn marker_positions(&self) -> ((i64, i64), (i64, i64)) {
        let w = self.config.width as i64;
        let h = self.config.height as i64;
        // Triangle-wave sweep over the middle half of the frame.
        let span = (w / 2).max(2);
        let phase = (self.frame_count as i64) % (2 * span);
        let offset = if phase < span { phase } else { 2 * span - phase };
        let red = (w / 4 + offset / 2, h / 3);
        let green = (w / 4 + offset / 2, 2 * h / 3);
        (red, green)
    }

    fn generate_frame(&self) -> Frame {
        let mut frame = Frame::black(self.config.width, self.config.height);
        let radius = (self.config.width as i64 / 40).max(3);
        let (red, green) = self.marker_positions();
        paint_disk(&mut frame, red.0, red.1, radius, SYNTHETIC_RED);
        paint_disk(&mut frame, green.0, green.1, radius, SYNTHETIC_GREEN);
        frame
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
        }
    }
}

fn paint_disk(frame: &mut Frame, cx: i64, cy: i64, radius: i64, rgb: [u8; 3]) {
    let w = frame.width() as i64;
    let h = frame.height() as i64;
    for y in (cy - radius).max(0)..=(cy + radius).min(h - 1) {
        for x in (cx - radius).max(0)..=(cx + radius).min(w - 1) {
            let dx = x - cx;
            let dy = y - cy;
            if dx * dx + dy * dy <= radius * radius {
                frame.set_rgb(x as u32, y as u32, rgb);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
