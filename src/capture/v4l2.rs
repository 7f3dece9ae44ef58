//! V4L2 camera source.
//!
//! `DeviceCameraSource` captures from a local V4L2 device node and applies
//! the rig's camera setup at connect time:
//! - Preferred resolution and a pixel format the tracker can consume
//!   (RGB3, YUYV, or MJPG, tried in that order)
//! - Requested frame rate
//! - Autofocus off and manual exposure, where the driver allows it
//!
//! Settings the driver refuses are logged and skipped; the device's active
//! format always wins.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;
use std::time::{Duration, Instant};

use v4l::control::{Control, Value};

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::{CameraConfig, CameraStats};
use crate::frame::Frame;

// V4L2 control ids (uapi/linux/v4l2-controls.h).
const CID_EXPOSURE_AUTO: u32 = 0x009a_0901;
const CID_EXPOSURE_ABSOLUTE: u32 = 0x009a_0902;
const CID_FOCUS_AUTO: u32 = 0x009a_090c;

/// V4L2_EXPOSURE_MANUAL
const EXPOSURE_MANUAL: i64 = 1;

/// Pixel formats the tracker can consume, in preference order.
const FOURCC_PREFERENCE: [&[u8; 4]; 3] = [b"RGB3", b"YUYV", b"MJPG"];

pub struct DeviceCameraSource {
    config: CameraConfig,
    state: Option<DeviceCameraState>,
    pixel_format: PixelFormat,
    active_width: u32,
    active_height: u32,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
}

#[self_referencing]
struct DeviceCameraState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl DeviceCameraSource {
    pub(crate) fn new(config: CameraConfig) -> Result<Self> {
        Ok(Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            pixel_format: PixelFormat::Rgb24,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        })
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;

        let format = self.negotiate_format(&mut device)?;
        self.pixel_format = pixel_format_for(&format.fourcc).ok_or_else(|| {
            anyhow!(
                "device {} offers unsupported pixel format {}",
                self.config.device,
                format.fourcc
            )
        })?;
        self.active_width = format.width;
        self.active_height = format.height;

        if self.config.fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "CameraSource: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.apply_controls(&device);
        self.last_error = None;

        let state = DeviceCameraStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);

        log::info!(
            "CameraSource: connected to {} ({}x{} {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.pixel_format
        );
        Ok(())
    }

    fn negotiate_format(&self, device: &mut v4l::Device) -> Result<v4l::Format> {
        use v4l::video::Capture;

        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;

        for fourcc in FOURCC_PREFERENCE {
            format.fourcc = v4l::FourCC::new(fourcc);
            match device.set_format(&format) {
                Ok(active) if active.fourcc == format.fourcc => return Ok(active),
                Ok(_) => continue,
                Err(err) => {
                    log::warn!(
                        "CameraSource: failed to set format {} on {}: {}",
                        format.fourcc,
                        self.config.device,
                        err
                    );
                }
            }
        }

        // None of the preferred formats stuck; take whatever the device has.
        device
            .format()
            .context("read v4l2 format after negotiation")
    }

    fn apply_controls(&self, device: &v4l::Device) {
        if !self.config.autofocus {
            if let Err(err) = device.set_control(Control {
                id: CID_FOCUS_AUTO,
                value: Value::Boolean(false),
            }) {
                log::warn!(
                    "CameraSource: failed to disable autofocus on {}: {}",
                    self.config.device,
                    err
                );
            }
        }
        if let Some(exposure) = self.config.exposure {
            if let Err(err) = device.set_control(Control {
                id: CID_EXPOSURE_AUTO,
                value: Value::Integer(EXPOSURE_MANUAL),
            }) {
                log::warn!(
                    "CameraSource: failed to set manual exposure mode on {}: {}",
                    self.config.device,
                    err
                );
            }
            if let Err(err) = device.set_control(Control {
                id: CID_EXPOSURE_ABSOLUTE,
                value: Value::Integer(exposure as i64),
            }) {
                log::warn!(
                    "CameraSource: failed to set exposure on {}: {}",
                    self.config.device,
                    err
                );
            }
        }
    }

    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let (buf, _meta) = state
            .with_mut(|fields| fields.stream.next())
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                anyhow::Error::new(err).context("capture v4l2 frame")
            })?;

        let (pixels, width, height) = normalize_to_rgb(
            buf,
            self.active_width,
            self.active_height,
            self.pixel_format,
        )?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());

        Frame::new(pixels, width, height)
    }

    pub(crate) fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    pub(crate) fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
        }
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.fps == 0 {
            2_000
        } else {
            (1000 / self.config.fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

fn pixel_format_for(fourcc: &v4l::FourCC) -> Option<PixelFormat> {
    match &fourcc.repr {
        b"RGB3" => Some(PixelFormat::Rgb24),
        b"YUYV" => Some(PixelFormat::Yuyv),
        b"MJPG" => Some(PixelFormat::Mjpeg),
        _ => None,
    }
}
