//! Synchronized dual-marker centroid tracking.
//!
//! This crate implements the acquisition pipeline behind `trackd`: live
//! video capture, per-frame timestamping against an external clock
//! service, red/green marker centroid extraction, detection overlays, and
//! a CSV session log.
//!
//! # Pipeline
//!
//! Each loop iteration is a straight line:
//!
//! 1. Capture one frame (`capture`)
//! 2. One request/reply round-trip to the timestamp service (`clock`)
//! 3. Fixed filter chain and centroid extraction (`track`)
//! 4. Append one session log row (`output`)
//! 5. Paint the detection overlays (`overlay`)
//! 6. Optionally display both windows (`preview`)
//!
//! # Module Structure
//!
//! - `frame`: pixel containers (`Frame`, `Plane`)
//! - `capture`: camera sources (V4L2, synthetic stub)
//! - `clock`: timestamp service client and rate estimation
//! - `track`: filter chain and centroids
//! - `overlay`: accumulating detection overlays
//! - `output`: CSV session log
//! - `preview`: optional display windows
//! - `config`: file + environment configuration

pub mod capture;
pub mod clock;
pub mod config;
pub mod frame;
pub mod output;
pub mod overlay;
pub mod preview;
pub mod track;

pub use capture::{CameraConfig, CameraSource, CameraStats};
pub use clock::{ClockClient, ClockConfig, ClockStats, RateEstimator};
pub use config::TrackdConfig;
pub use frame::{Frame, Plane};
pub use output::{
    summarize, SessionLogReader, SessionLogWriter, SessionSummary, TrackRecord,
    SESSION_LOG_HEADER,
};
pub use overlay::OverlayAccumulator;
pub use preview::{PreviewKey, PreviewSink};
pub use track::{Centroid, MarkerMasks, MarkerTracker, TrackSample, TrackerParams};

/// Timestamp-service tick count.
pub type Ticks = i64;

/// Tick rate of the rig's timestamp counter.
pub const DEFAULT_TICKS_PER_SECOND: u32 = 33_000;
