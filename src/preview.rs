//! Optional on-screen preview.
//!
//! The rig shows two windows: "raw video" (the captured frame) and
//! "threshed" (the overlay composite). Key handling per displayed frame:
//! 'c' resets the overlay accumulators, 'q' or ESC requests shutdown.
//!
//! The windows come from the `preview-highgui` feature; the default build
//! compiles a headless sink that drops frames and never reports a key.

use anyhow::Result;
#[cfg(not(feature = "preview-highgui"))]
use anyhow::anyhow;

use crate::frame::Frame;

/// Key event reported by the preview for one displayed frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewKey {
    None,
    ResetOverlay,
    Quit,
}

pub enum PreviewSink {
    Headless,
    #[cfg(feature = "preview-highgui")]
    Windows(windows::WindowPreview),
}

impl PreviewSink {
    pub fn new(enabled: bool) -> Result<Self> {
        if !enabled {
            return Ok(Self::Headless);
        }
        #[cfg(feature = "preview-highgui")]
        {
            Ok(Self::Windows(windows::WindowPreview::new()?))
        }
        #[cfg(not(feature = "preview-highgui"))]
        {
            Err(anyhow!(
                "preview requested but this build lacks the preview-highgui feature"
            ))
        }
    }

    /// Display one frame pair and poll for a key.
    pub fn show(&mut self, raw: &Frame, composite: &Frame) -> Result<PreviewKey> {
        match self {
            Self::Headless => {
                let _ = (raw, composite);
                Ok(PreviewKey::None)
            }
            #[cfg(feature = "preview-highgui")]
            Self::Windows(preview) => preview.show(raw, composite),
        }
    }
}

#[cfg(feature = "preview-highgui")]
mod windows {
    use anyhow::{anyhow, Result};
    use opencv::{
        core::{self, Mat},
        highgui, imgproc,
        prelude::*,
    };

    use super::PreviewKey;
    use crate::frame::Frame;

    const RAW_WINDOW: &str = "raw video";
    const MASK_WINDOW: &str = "threshed";

    const KEY_RESET: i32 = 99; // 'c'
    const KEY_QUIT: i32 = 113; // 'q'
    const KEY_ESC: i32 = 27;

    pub struct WindowPreview {
        _private: (),
    }

    impl WindowPreview {
        pub fn new() -> Result<Self> {
            highgui::named_window(RAW_WINDOW, highgui::WINDOW_AUTOSIZE)
                .map_err(|e| anyhow!("create '{}' window: {:?}", RAW_WINDOW, e))?;
            highgui::named_window(MASK_WINDOW, highgui::WINDOW_AUTOSIZE)
                .map_err(|e| anyhow!("create '{}' window: {:?}", MASK_WINDOW, e))?;
            Ok(Self { _private: () })
        }

        pub fn show(&mut self, raw: &Frame, composite: &Frame) -> Result<PreviewKey> {
            let raw_mat = frame_to_bgr_mat(raw)?;
            let mask_mat = frame_to_bgr_mat(composite)?;
            highgui::imshow(RAW_WINDOW, &raw_mat)
                .map_err(|e| anyhow!("show '{}' window: {:?}", RAW_WINDOW, e))?;
            highgui::imshow(MASK_WINDOW, &mask_mat)
                .map_err(|e| anyhow!("show '{}' window: {:?}", MASK_WINDOW, e))?;

            let key = highgui::wait_key(1).map_err(|e| anyhow!("poll preview key: {:?}", e))?;
            Ok(match key {
                KEY_RESET => PreviewKey::ResetOverlay,
                KEY_QUIT | KEY_ESC => PreviewKey::Quit,
                _ => PreviewKey::None,
            })
        }
    }

    fn frame_to_bgr_mat(frame: &Frame) -> Result<Mat> {
        let rgb = unsafe {
            Mat::new_rows_cols_with_data(
                frame.height() as i32,
                frame.width() as i32,
                core::CV_8UC3,
                frame.data().as_ptr() as *mut core::c_void,
                core::Mat_AUTO_STEP,
            )
            .map_err(|e| anyhow!("wrap frame as Mat: {:?}", e))?
        };
        let mut bgr = Mat::default();
        imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)
            .map_err(|e| anyhow!("convert RGB to BGR: {:?}", e))?;
        Ok(bgr)
    }
}
