//! trackd - marker acquisition daemon
//!
//! This daemon:
//! 1. Captures frames from the configured camera source
//! 2. Stamps each frame via a request/reply round-trip to the timestamp service
//! 3. Runs the fixed filter chain and extracts the red/green marker centroids
//! 4. Appends one row per frame to the CSV session log
//! 5. Accumulates the detection overlays (and optionally displays them)

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use marker_track::{
    CameraSource, ClockClient, MarkerTracker, OverlayAccumulator, PreviewKey, PreviewSink,
    RateEstimator, SessionLogWriter, TrackRecord, TrackdConfig,
};

fn main() -> Result<()> {
    // Initialize logging (simple stderr)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = TrackdConfig::load()?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("install ctrl-c handler")?;
    }

    let mut camera = CameraSource::new(cfg.camera.clone())?;
    camera.connect()?;

    let mut clock = ClockClient::new(cfg.clock.clone())?;
    clock.connect()?;

    let tracker = MarkerTracker::new(cfg.tracker.clone())?;
    let mut writer = SessionLogWriter::create(&cfg.log_path)?;
    let mut preview = PreviewSink::new(cfg.preview)?;
    let mut rate = RateEstimator::new(cfg.clock.ticks_per_second);

    // Sized from the first captured frame; the active format can differ
    // from the requested one.
    let mut overlay: Option<OverlayAccumulator> = None;

    log::info!("trackd running. writing to {}", cfg.log_path.display());
    log::info!(
        "camera={} ({}x{} @ {} fps), clock={} ({} ticks/s)",
        cfg.camera.device,
        cfg.camera.width,
        cfg.camera.height,
        cfg.camera.fps,
        cfg.clock.endpoint,
        cfg.clock.ticks_per_second
    );

    let mut last_health_log = Instant::now();

    while running.load(Ordering::SeqCst) {
        let frame = camera.next_frame()?;
        let ticks = clock.request_timestamp()?;
        rate.observe(ticks);

        let (sample, masks) = tracker.process(&frame, ticks)?;
        writer.append(&TrackRecord::from_sample(&sample))?;

        let overlay = overlay
            .get_or_insert_with(|| OverlayAccumulator::new(frame.width(), frame.height()));
        overlay.paint(&masks)?;

        match preview.show(&frame, &overlay.composite())? {
            PreviewKey::ResetOverlay => {
                log::info!("overlay accumulators reset");
                overlay.reset();
            }
            PreviewKey::Quit => {
                log::info!("preview quit requested");
                break;
            }
            PreviewKey::None => {}
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let camera_stats = camera.stats();
            let clock_stats = clock.stats();
            let fps = rate
                .avg_fps()
                .map(|fps| format!("{:.2}", fps))
                .unwrap_or_else(|| "n/a".to_string());
            log::info!(
                "avg {} fps; camera health={} frames={}; clock health={} requests={}",
                fps,
                camera.is_healthy(),
                camera_stats.frames_captured,
                clock.is_healthy(),
                clock_stats.requests
            );
            last_health_log = Instant::now();
        }
    }

    writer.flush()?;
    log::info!(
        "session log written to {} ({} rows)",
        writer.path().display(),
        writer.rows()
    );
    Ok(())
}
