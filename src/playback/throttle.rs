/// Minimum-interval gate for time-update samples
use std::time::{Duration, Instant};

/// Lets a sample through at most once per `min_interval`; anything in between
/// is dropped, never queued
#[derive(Debug, Clone)]
pub struct Throttle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// Whether a sample at `now` should be processed; records it if so
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) <= self.min_interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_samples_inside_interval() {
        let mut throttle = Throttle::new(Duration::from_millis(500));
        let t0 = Instant::now();

        assert!(throttle.ready(t0));
        assert!(!throttle.ready(t0 + Duration::from_millis(200)));
        assert!(!throttle.ready(t0 + Duration::from_millis(500)));
        assert!(throttle.ready(t0 + Duration::from_millis(501)));
        assert!(!throttle.ready(t0 + Duration::from_millis(900)));
    }

    #[test]
    fn test_reset_lets_next_sample_through() {
        let mut throttle = Throttle::new(Duration::from_secs(10));
        let t0 = Instant::now();
        assert!(throttle.ready(t0));
        throttle.reset();
        assert!(throttle.ready(t0));
    }
}
