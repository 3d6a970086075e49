use std::time::{Duration, Instant};

/// Sleep-to-deadline rate limiter for a loop running at `fps`.
pub struct Pacer {
    interval: Duration,
    cycle_start: Instant,
}

impl Pacer {
    pub fn new(fps: f64) -> Self {
        let interval = if fps > 0.0 {
            Duration::from_secs_f64(1.0 / fps)
        } else {
            Duration::ZERO
        };
        Self { interval, cycle_start: Instant::now() }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Mark the start of a cycle.
    pub fn begin(&mut self) {
        self.cycle_start = Instant::now();
    }

    /// Sleep for whatever is left of the current cycle.
    pub fn wait(&self) {
        let elapsed = self.cycle_start.elapsed();
        if let Some(remaining) = self.interval.checked_sub(elapsed) {
            std::thread::sleep(remaining);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_from_rate() {
        assert_eq!(Pacer::new(4.0).interval(), Duration::from_millis(250));
        assert_eq!(Pacer::new(0.0).interval(), Duration::ZERO);
    }

    #[test]
    fn wait_fills_the_cycle() {
        let mut pacer = Pacer::new(20.0);
        let start = Instant::now();
        pacer.begin();
        pacer.wait();
        assert!(start.elapsed() >= Duration::from_millis(45));
    }
}
