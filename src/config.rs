use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::CameraConfig;
use crate::clock::ClockConfig;
use crate::track::TrackerParams;
use crate::DEFAULT_TICKS_PER_SECOND;

const DEFAULT_DEVICE: &str = "/dev/video0";
const DEFAULT_WIDTH: u32 = 1280;
const DEFAULT_HEIGHT: u32 = 720;
const DEFAULT_FPS: u32 = 30;
const DEFAULT_EXPOSURE: i32 = 10;
const DEFAULT_CLOCK_ENDPOINT: &str = "tcp://127.0.0.1:5556";
const DEFAULT_CLOCK_TIMEOUT_SECS: u64 = 5;
const DEFAULT_LOG_PATH: &str = "session.csv";

#[derive(Debug, Deserialize, Default)]
struct TrackdConfigFile {
    camera: Option<CameraConfigFile>,
    clock: Option<ClockConfigFile>,
    log: Option<LogConfigFile>,
    tracker: Option<TrackerConfigFile>,
    preview: Option<PreviewConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
    autofocus: Option<bool>,
    exposure: Option<i32>,
}

#[derive(Debug, Deserialize, Default)]
struct ClockConfigFile {
    endpoint: Option<String>,
    ticks_per_second: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct LogConfigFile {
    path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TrackerConfigFile {
    blur_kernel: Option<u32>,
    channel_threshold: Option<u8>,
    brightness_threshold: Option<u8>,
    dilate_iterations: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct PreviewConfigFile {
    enabled: Option<bool>,
}

/// Resolved daemon configuration.
#[derive(Clone, Debug)]
pub struct TrackdConfig {
    pub camera: CameraConfig,
    pub clock: ClockConfig,
    pub log_path: PathBuf,
    pub tracker: TrackerParams,
    pub preview: bool,
}

impl TrackdConfig {
    /// Defaults, overridden by the TOML file named by `TRACKD_CONFIG`,
    /// overridden by `TRACKD_*` environment variables, then validated.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TRACKD_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TrackdConfigFile) -> Self {
        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraConfig {
            device: camera_file
                .device
                .unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            width: camera_file.width.unwrap_or(DEFAULT_WIDTH),
            height: camera_file.height.unwrap_or(DEFAULT_HEIGHT),
            fps: camera_file.fps.unwrap_or(DEFAULT_FPS),
            autofocus: camera_file.autofocus.unwrap_or(false),
            exposure: Some(camera_file.exposure.unwrap_or(DEFAULT_EXPOSURE)),
        };

        let clock_file = file.clock.unwrap_or_default();
        let clock = ClockConfig {
            endpoint: clock_file
                .endpoint
                .unwrap_or_else(|| DEFAULT_CLOCK_ENDPOINT.to_string()),
            ticks_per_second: clock_file
                .ticks_per_second
                .unwrap_or(DEFAULT_TICKS_PER_SECOND),
            timeout: Duration::from_secs(
                clock_file.timeout_secs.unwrap_or(DEFAULT_CLOCK_TIMEOUT_SECS),
            ),
        };

        let log_path = PathBuf::from(
            file.log
                .and_then(|log| log.path)
                .unwrap_or_else(|| DEFAULT_LOG_PATH.to_string()),
        );

        let tracker_file = file.tracker.unwrap_or_default();
        let defaults = TrackerParams::default();
        let tracker = TrackerParams {
            blur_kernel: tracker_file.blur_kernel.unwrap_or(defaults.blur_kernel),
            channel_threshold: tracker_file
                .channel_threshold
                .unwrap_or(defaults.channel_threshold),
            brightness_threshold: tracker_file
                .brightness_threshold
                .unwrap_or(defaults.brightness_threshold),
            dilate_iterations: tracker_file
                .dilate_iterations
                .unwrap_or(defaults.dilate_iterations),
        };

        let preview = file
            .preview
            .and_then(|preview| preview.enabled)
            .unwrap_or(false);

        Self {
            camera,
            clock,
            log_path,
            tracker,
            preview,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("TRACKD_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(endpoint) = std::env::var("TRACKD_CLOCK_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.clock.endpoint = endpoint;
            }
        }
        if let Ok(path) = std::env::var("TRACKD_LOG_PATH") {
            if !path.trim().is_empty() {
                self.log_path = PathBuf::from(path);
            }
        }
        if let Ok(ticks) = std::env::var("TRACKD_TICKS_PER_SECOND") {
            let ticks: u32 = ticks
                .parse()
                .map_err(|_| anyhow!("TRACKD_TICKS_PER_SECOND must be an integer tick rate"))?;
            self.clock.ticks_per_second = ticks;
        }
        if let Ok(preview) = std::env::var("TRACKD_PREVIEW") {
            self.preview = matches!(preview.trim(), "1" | "true" | "yes");
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!(
                "camera resolution must be nonzero, got {}x{}",
                self.camera.width,
                self.camera.height
            ));
        }
        if self.clock.ticks_per_second == 0 {
            return Err(anyhow!("clock ticks_per_second must be greater than zero"));
        }
        if self.clock.timeout.as_secs() == 0 {
            return Err(anyhow!("clock timeout must be greater than zero"));
        }
        if self.log_path.as_os_str().is_empty() {
            return Err(anyhow!("session log path must not be empty"));
        }
        self.tracker.validate()?;
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<TrackdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    let cfg = toml::from_str(&raw)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(cfg)
}
