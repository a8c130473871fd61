//! Exponential reconnect backoff.

use std::time::Duration;

/// Delay sequence `min(initial * factor^n, max)`, reset to `initial` after
/// a successful connection.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    factor: f64,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, factor: f64, max: Duration) -> Self {
        Self { initial, factor, max, current: initial }
    }

    /// Returns the delay for the next retry and advances the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let grown = self.current.mul_f64(self.factor);
        self.current = grown.min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_non_decreasing_and_capped() {
        let mut backoff = Backoff::new(
            Duration::from_millis(500),
            2.0,
            Duration::from_secs(8),
        );
        let delays: Vec<_> = (0..8).map(|_| backoff.next_delay()).collect();
        assert_eq!(delays[0], Duration::from_millis(500));
        assert_eq!(delays[1], Duration::from_secs(1));
        assert_eq!(delays[2], Duration::from_secs(2));
        assert_eq!(delays[4], Duration::from_secs(8));
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert!(delays.iter().all(|d| *d <= Duration::from_secs(8)));
    }

    #[test]
    fn reset_returns_to_initial_delay() {
        let mut backoff = Backoff::new(
            Duration::from_secs(1),
            3.0,
            Duration::from_secs(60),
        );
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn factor_one_stays_at_initial() {
        let mut backoff = Backoff::new(
            Duration::from_secs(2),
            1.0,
            Duration::from_secs(60),
        );
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
    }
}
