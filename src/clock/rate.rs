//! Frame-rate estimation from timestamp deltas.

use crate::Ticks;

/// Running average frame rate computed from consecutive service
/// timestamps, the way the rig reports it: each interval contributes
/// `(t_b - t_a) / ticks_per_second` seconds, and the average rate is the
/// reciprocal of the mean interval.
#[derive(Clone, Debug)]
pub struct RateEstimator {
    ticks_per_second: u32,
    last: Option<Ticks>,
    intervals: u64,
    elapsed_sum: f64,
}

impl RateEstimator {
    pub fn new(ticks_per_second: u32) -> Self {
        Self {
            ticks_per_second,
            last: None,
            intervals: 0,
            elapsed_sum: 0.0,
        }
    }

    /// Fold in the next frame's timestamp.
    pub fn observe(&mut self, ticks: Ticks) {
        if let Some(last) = self.last {
            let elapsed = (ticks - last) as f64 / self.ticks_per_second as f64;
            self.elapsed_sum += elapsed;
            self.intervals += 1;
        }
        self.last = Some(ticks);
    }

    /// Number of intervals folded in so far (frames minus one).
    pub fn intervals(&self) -> u64 {
        self.intervals
    }

    /// Average frame rate, or `None` before the second frame (or when the
    /// accumulated elapsed time is not positive).
    pub fn avg_fps(&self) -> Option<f64> {
        if self.intervals == 0 || self.elapsed_sum <= 0.0 {
            return None;
        }
        let avg_interval = self.elapsed_sum / self.intervals as f64;
        Some(1.0 / avg_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_rate_before_two_frames() {
        let mut rate = RateEstimator::new(33_000);
        assert!(rate.avg_fps().is_none());
        rate.observe(1000);
        assert!(rate.avg_fps().is_none());
    }

    #[test]
    fn steady_intervals_give_the_nominal_rate() {
        let mut rate = RateEstimator::new(33_000);
        // 1100 ticks at 33 kHz is 1/30 s.
        for i in 0..10 {
            rate.observe(i * 1100);
        }
        let fps = rate.avg_fps().unwrap();
        assert!((fps - 30.0).abs() < 1e-9, "fps = {}", fps);
        assert_eq!(rate.intervals(), 9);
    }

    #[test]
    fn mixed_intervals_average_out() {
        let mut rate = RateEstimator::new(1000);
        rate.observe(0);
        rate.observe(500); // 0.5 s
        rate.observe(2000); // 1.5 s
        // Mean interval 1.0 s -> 1 fps.
        let fps = rate.avg_fps().unwrap();
        assert!((fps - 1.0).abs() < 1e-9);
    }

    #[test]
    fn stalled_counter_yields_no_rate() {
        let mut rate = RateEstimator::new(1000);
        rate.observe(42);
        rate.observe(42);
        assert!(rate.avg_fps().is_none());
    }
}
