use std::time::{Duration, Instant};

use seriallink_frame::FrameConfig;
use seriallink_transport::PortSettings;

/// Default capacity of each input buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1000;

/// Default pause between failed open attempts.
pub const DEFAULT_CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Default pause after a failed transport read.
pub const DEFAULT_READ_ERROR_PAUSE: Duration = Duration::from_millis(200);

/// Default poll interval for wait combinators.
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_millis(100);

/// Smallest poll interval a wait combinator will sleep for.
pub const MIN_POLL_DELAY: Duration = Duration::from_millis(1);

/// Configuration for a serial link.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Port identifier, baud rate and port timeouts.
    pub port: PortSettings,
    /// Framing sigils and inbound line limits.
    pub frame: FrameConfig,
    /// Capacity of the string buffer and of the packet buffer.
    pub buffer_capacity: usize,
    /// Pause between open attempts while connecting.
    pub connect_retry_interval: Duration,
    /// Give up connecting after this long. `None` retries forever.
    pub connect_timeout: Option<Duration>,
    /// Pause after a failed transport read before retrying.
    pub read_error_pause: Duration,
}

impl LinkConfig {
    /// Defaults for `port`.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: PortSettings::new(port),
            frame: FrameConfig::default(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            connect_retry_interval: DEFAULT_CONNECT_RETRY_INTERVAL,
            connect_timeout: None,
            read_error_pause: DEFAULT_READ_ERROR_PAUSE,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.port.baud_rate = baud_rate;
        self
    }

    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// What a matching wait does with items that do not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Remove only the matching item; everything else stays queued in order.
    #[default]
    Retain,
    /// Pop items oldest-first and drop the ones that do not match.
    Discard,
}

/// Polling behaviour of the wait combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Sleep between poll attempts. Clamped to at least [`MIN_POLL_DELAY`].
    pub delay: Duration,
    /// Give up after this long. `None` waits forever.
    pub timeout: Option<Duration>,
    pub policy: MatchPolicy,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            delay: DEFAULT_POLL_DELAY,
            timeout: None,
            policy: MatchPolicy::Retain,
        }
    }
}

impl WaitOptions {
    /// Wait forever with the default poll delay.
    pub fn forever() -> Self {
        Self::default()
    }

    /// Wait at most `timeout` with the default poll delay.
    pub fn timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub(crate) fn poll_delay(&self) -> Duration {
        self.delay.max(MIN_POLL_DELAY)
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.timeout.map(|timeout| Instant::now() + timeout)
    }
}
