use std::time::Duration;

/// Bounded exponential backoff for job status polling.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Total status reads allowed per flow before it is marked timed out.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(3),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_attempts: 40,
        }
    }
}

impl PollPolicy {
    /// Delay before the next poll after `error_streak` consecutive failures.
    ///
    /// A streak of zero always yields `base_delay`. The result never exceeds
    /// `max_delay`, however long the streak.
    pub fn delay_for(&self, error_streak: u32) -> Duration {
        if error_streak == 0 {
            return self.base_delay.min(self.max_delay);
        }
        let exponent = i32::try_from(error_streak).unwrap_or(i32::MAX);
        let factor = self.multiplier.max(1.0).powi(exponent);
        let secs = self.base_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }
}
