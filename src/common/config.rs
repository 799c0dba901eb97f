//! Configuration constants and the buffer pool configuration.

use std::time::Duration;

/// Default size of a page in bytes (4KB).
///
/// Matches the OS page size on most systems. Every heap file opened against a
/// pool must use the same page size as the pool.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Payload width of a `String` field in bytes.
///
/// On disk a string occupies a 4-byte length prefix followed by exactly this
/// many bytes, zero padded.
pub const STRING_LEN: usize = 128;

/// Default number of frames in a buffer pool.
pub const DEFAULT_POOL_PAGES: usize = 50;

/// How long `BufferPool` keeps retrying a denied lock before giving up.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Sleep between two attempts to acquire a denied lock.
pub const DEFAULT_LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// Settings for a [`BufferPool`](crate::buffer::BufferPool).
///
/// # Example
/// ```
/// use heapdb::BufferPoolConfig;
///
/// let config = BufferPoolConfig::new(16).with_page_size(1024);
/// assert_eq!(config.capacity, 16);
/// assert_eq!(config.page_size, 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Number of frames (resident pages) in the pool.
    pub capacity: usize,

    /// Page size in bytes used by the pool and every registered heap file.
    ///
    /// Changing it invalidates files written with another size. Meant for
    /// tests that want tiny pages.
    pub page_size: usize,

    /// Give up on a denied lock after this long. `None` waits forever.
    pub lock_timeout: Option<Duration>,

    /// Sleep between lock attempts.
    pub lock_retry_interval: Duration,
}

impl BufferPoolConfig {
    /// Config with `capacity` frames and default everything else.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Override the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Override the lock timeout (`None` disables it).
    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Override the retry interval.
    pub fn with_lock_retry_interval(mut self, interval: Duration) -> Self {
        self.lock_retry_interval = interval;
        self
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_PAGES,
            page_size: DEFAULT_PAGE_SIZE,
            lock_timeout: Some(DEFAULT_LOCK_TIMEOUT),
            lock_retry_interval: DEFAULT_LOCK_RETRY_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(DEFAULT_PAGE_SIZE.is_power_of_two());
        assert_eq!(DEFAULT_PAGE_SIZE, 4096);
    }

    #[test]
    fn test_default_config() {
        let config = BufferPoolConfig::default();
        assert_eq!(config.capacity, DEFAULT_POOL_PAGES);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.lock_timeout, Some(DEFAULT_LOCK_TIMEOUT));
    }

    #[test]
    fn test_builder_overrides() {
        let config = BufferPoolConfig::new(3)
            .with_page_size(512)
            .with_lock_timeout(None)
            .with_lock_retry_interval(Duration::from_millis(5));

        assert_eq!(config.capacity, 3);
        assert_eq!(config.page_size, 512);
        assert_eq!(config.lock_timeout, None);
        assert_eq!(config.lock_retry_interval, Duration::from_millis(5));
    }
}
