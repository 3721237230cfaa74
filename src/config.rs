use std::time::Duration;

pub const DEFAULT_TERMINATOR: u8 = b'\r';
pub const DEFAULT_STORE_MARKER: u8 = 0;
pub const DEFAULT_MAX_LINE_LEN: usize = 80;
pub const DEFAULT_BYTE_CHANNEL_CAPACITY: usize = DEFAULT_MAX_LINE_LEN + 1;
pub const DEFAULT_RECORD_CHANNEL_CAPACITY: usize = 4;
/// Both channels allocate their whole capacity up front.
pub const MAX_CHANNEL_CAPACITY: usize = 64 * 1024;
pub const DEFAULT_DISPLAY_LABEL: &str = "EEPROM: ";

pub const DEFAULT_EEPROM_ADDR: u8 = 0x50;
pub const DEFAULT_EEPROM_PAGE_LEN: usize = 64;
pub const DEFAULT_EEPROM_CAPACITY: u32 = 32 * 1024;
pub const DEFAULT_READY_POLL_LIMIT: u32 = 1_000;

/// The EEPROM takes a 15 bit memory address.
pub const MAX_EEPROM_CAPACITY: u32 = 0x8000;

const DEFAULT_CAPTURE_PRIORITY: u8 = 5;
const DEFAULT_PLAYBACK_PRIORITY: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("byte channel capacity must be at least 1")]
    ZeroByteChannelCapacity,
    #[error("record channel capacity must be at least 1")]
    ZeroRecordChannelCapacity,
    #[error("channel capacity {capacity} above the limit of {max}")]
    ChannelTooLarge { capacity: usize, max: usize },
    #[error("maximum line length must be at least 1")]
    ZeroMaxLineLen,
    #[error("a {max_line_len} byte line does not fit a byte channel of {capacity} bytes")]
    LineLongerThanChannel { max_line_len: usize, capacity: usize },
    #[error("terminator and store marker must differ")]
    TerminatorIsMarker,
    #[error("retry policy needs at least one attempt")]
    ZeroAttempts,
    #[error("page size {page_size} must be a power of two dividing the capacity {capacity}")]
    InvalidPageSize { page_size: usize, capacity: u32 },
    #[error("store capacity {capacity} outside 1..={max}")]
    InvalidCapacity { capacity: u32, max: u32 },
    #[error("ready poll limit must be at least 1")]
    ZeroPollLimit,
    #[error("store of {capacity} bytes cannot hold a single {needed} byte line")]
    StoreTooSmall { capacity: u32, needed: usize },
    #[error("capture priority {capture} must be above playback priority {playback}")]
    PriorityInversion { capture: u8, playback: u8 },
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            attempts,
            initial_backoff,
            max_backoff,
        }
    }

    /// Time to wait after the failed attempt number `attempt` (starting at 0).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |delay| delay.min(self.max_backoff))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPriorities {
    pub capture: u8,
    pub playback: u8,
}

impl Default for WorkerPriorities {
    fn default() -> Self {
        Self {
            capture: DEFAULT_CAPTURE_PRIORITY,
            playback: DEFAULT_PLAYBACK_PRIORITY,
        }
    }
}

/// Geometry and timing of a 24xx-series I2C EEPROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EepromConfig {
    pub i2c_address: u8,
    pub page_size: usize,
    pub capacity: u32,
    pub ready_poll_limit: u32,
}

impl EepromConfig {
    pub fn new() -> Self {
        Self {
            i2c_address: DEFAULT_EEPROM_ADDR,
            page_size: DEFAULT_EEPROM_PAGE_LEN,
            capacity: DEFAULT_EEPROM_CAPACITY,
            ready_poll_limit: DEFAULT_READY_POLL_LIMIT,
        }
    }

    pub fn i2c_address(mut self, i2c_address: u8) -> Self {
        self.i2c_address = i2c_address;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn ready_poll_limit(mut self, ready_poll_limit: u32) -> Self {
        self.ready_poll_limit = ready_poll_limit;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 || self.capacity > MAX_EEPROM_CAPACITY {
            return Err(ConfigError::InvalidCapacity {
                capacity: self.capacity,
                max: MAX_EEPROM_CAPACITY,
            });
        }
        if !self.page_size.is_power_of_two() || self.capacity as usize % self.page_size != 0 {
            return Err(ConfigError::InvalidPageSize {
                page_size: self.page_size,
                capacity: self.capacity,
            });
        }
        if self.ready_poll_limit == 0 {
            return Err(ConfigError::ZeroPollLimit);
        }
        Ok(())
    }
}

impl Default for EepromConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings of the capture and playback pipeline. Values not set keep the `DEFAULT_*` constants.
///
/// ```
/// use eeprom_logger::config::PipelineConfig;
///
/// let config = PipelineConfig::new().terminator(b'\n').record_channel_capacity(8);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub terminator: u8,
    pub store_marker: u8,
    pub max_line_len: usize,
    pub byte_channel_capacity: usize,
    pub record_channel_capacity: usize,
    pub display_label: String,
    pub publish_retry: RetryPolicy,
    pub read_retry: RetryPolicy,
    pub priorities: WorkerPriorities,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self {
            terminator: DEFAULT_TERMINATOR,
            store_marker: DEFAULT_STORE_MARKER,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            byte_channel_capacity: DEFAULT_BYTE_CHANNEL_CAPACITY,
            record_channel_capacity: DEFAULT_RECORD_CHANNEL_CAPACITY,
            display_label: DEFAULT_DISPLAY_LABEL.to_string(),
            publish_retry: RetryPolicy::new(5, Duration::from_millis(2), Duration::from_millis(50)),
            read_retry: RetryPolicy::new(3, Duration::from_millis(5), Duration::from_millis(20)),
            priorities: WorkerPriorities::default(),
        }
    }

    pub fn terminator(mut self, terminator: u8) -> Self {
        self.terminator = terminator;
        self
    }

    pub fn store_marker(mut self, store_marker: u8) -> Self {
        self.store_marker = store_marker;
        self
    }

    pub fn max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    pub fn byte_channel_capacity(mut self, capacity: usize) -> Self {
        self.byte_channel_capacity = capacity;
        self
    }

    pub fn record_channel_capacity(mut self, capacity: usize) -> Self {
        self.record_channel_capacity = capacity;
        self
    }

    pub fn display_label(mut self, label: &str) -> Self {
        self.display_label = label.to_string();
        self
    }

    pub fn publish_retry(mut self, retry: RetryPolicy) -> Self {
        self.publish_retry = retry;
        self
    }

    pub fn read_retry(mut self, retry: RetryPolicy) -> Self {
        self.read_retry = retry;
        self
    }

    pub fn priorities(mut self, priorities: WorkerPriorities) -> Self {
        self.priorities = priorities;
        self
    }

    /// Bytes a maximum length line takes in the store, marker included.
    pub fn max_stored_line_len(&self) -> usize {
        self.max_line_len + 1
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.byte_channel_capacity == 0 {
            return Err(ConfigError::ZeroByteChannelCapacity);
        }
        if self.record_channel_capacity == 0 {
            return Err(ConfigError::ZeroRecordChannelCapacity);
        }
        for capacity in [self.byte_channel_capacity, self.record_channel_capacity] {
            if capacity > MAX_CHANNEL_CAPACITY {
                return Err(ConfigError::ChannelTooLarge {
                    capacity,
                    max: MAX_CHANNEL_CAPACITY,
                });
            }
        }
        if self.max_line_len == 0 {
            return Err(ConfigError::ZeroMaxLineLen);
        }
        // A line is only drained once its terminator arrived, so all of it must fit at once.
        if self.max_line_len > self.byte_channel_capacity {
            return Err(ConfigError::LineLongerThanChannel {
                max_line_len: self.max_line_len,
                capacity: self.byte_channel_capacity,
            });
        }
        if self.terminator == self.store_marker {
            return Err(ConfigError::TerminatorIsMarker);
        }
        if self.priorities.capture <= self.priorities.playback {
            return Err(ConfigError::PriorityInversion {
                capture: self.priorities.capture,
                playback: self.priorities.playback,
            });
        }
        self.publish_retry.validate()?;
        self.read_retry.validate()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test0_defaults_are_valid() {
        assert_eq!(PipelineConfig::default().validate(), Ok(()));
        assert_eq!(EepromConfig::default().validate(), Ok(()));
        assert_eq!(PipelineConfig::new().byte_channel_capacity, 81);
    }

    #[test]
    fn test1_zero_capacities_are_rejected() {
        let config = PipelineConfig::new().byte_channel_capacity(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroByteChannelCapacity));
        let config = PipelineConfig::new().record_channel_capacity(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroRecordChannelCapacity));
    }

    #[test]
    fn test2_line_must_fit_the_byte_channel() {
        let config = PipelineConfig::new().max_line_len(40).byte_channel_capacity(16);
        assert_eq!(
            config.validate(),
            Err(ConfigError::LineLongerThanChannel { max_line_len: 40, capacity: 16 })
        );
    }

    #[test]
    fn test3_terminator_cannot_be_the_marker() {
        let config = PipelineConfig::new().terminator(0);
        assert_eq!(config.validate(), Err(ConfigError::TerminatorIsMarker));
    }

    #[test]
    fn test4_backoff_doubles_until_the_cap() {
        let retry = RetryPolicy::new(6, Duration::from_millis(2), Duration::from_millis(10));
        assert_eq!(retry.backoff(0), Duration::from_millis(2));
        assert_eq!(retry.backoff(1), Duration::from_millis(4));
        assert_eq!(retry.backoff(2), Duration::from_millis(8));
        assert_eq!(retry.backoff(3), Duration::from_millis(10));
        assert_eq!(retry.backoff(40), Duration::from_millis(10));
    }

    #[test]
    fn test5_eeprom_geometry_is_checked() {
        let config = EepromConfig::new().page_size(48);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPageSize { .. })));
        let config = EepromConfig::new().capacity(0x10000);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidCapacity { .. })));
        let config = EepromConfig::new().ready_poll_limit(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroPollLimit));
    }

    #[test]
    fn test6_priorities_keep_capture_above_playback() {
        let config = PipelineConfig::new().priorities(WorkerPriorities { capture: 3, playback: 3 });
        assert_eq!(
            config.validate(),
            Err(ConfigError::PriorityInversion { capture: 3, playback: 3 })
        );
    }

    #[test]
    fn test7_oversized_channels_are_rejected() {
        let config = PipelineConfig::new().byte_channel_capacity(usize::MAX);
        assert_eq!(
            config.validate(),
            Err(ConfigError::ChannelTooLarge { capacity: usize::MAX, max: MAX_CHANNEL_CAPACITY })
        );
        let config = PipelineConfig::new().record_channel_capacity(MAX_CHANNEL_CAPACITY + 1);
        assert!(matches!(config.validate(), Err(ConfigError::ChannelTooLarge { .. })));
        let config = PipelineConfig::new().byte_channel_capacity(MAX_CHANNEL_CAPACITY);
        assert_eq!(config.validate(), Ok(()));
    }
}
