use std::time::Duration;

/// Circuit breaker thresholds and timing.
///
/// Defaults are explicit and overridable, never hidden: 5 consecutive
/// failures open the breaker, 2 consecutive half-open successes close it,
/// and an open breaker waits 30 seconds before permitting a trial.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures (while closed) that open the breaker.
    pub failure_threshold: u32,
    /// Consecutive half-open successes that close the breaker.
    pub success_threshold_to_close: u32,
    /// How long an open breaker rejects before allowing a trial.
    pub open_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold_to_close: 2,
            open_timeout: Duration::from_secs(30),
        }
    }
}

impl BreakerConfig {
    /// Returns a config with the given failure threshold.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Returns a config with the given success threshold.
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold_to_close = threshold;
        self
    }

    /// Returns a config with the given open timeout.
    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }
}
