// Transport tuning shared by every device connection.
//
// The client reads these once at construction; nothing here touches the
// network.

use std::time::Duration;

/// Largest frame accepted from a device, in bytes.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// Connection and framing settings for a [`VentClient`](crate::VentClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Upper bound on one full exchange, including connecting if needed.
    pub timeout: Duration,
    /// Maximum length of a single newline-delimited frame.
    pub max_frame_len: usize,
    /// Keep the TCP connection open between exchanges.
    ///
    /// When `false` the connection is closed after every reply and reopened
    /// on the next call.
    pub keep_alive: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            keep_alive: true,
        }
    }
}

impl TransportConfig {
    /// Override the exchange timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Open a fresh connection for every exchange.
    pub fn without_keep_alive(mut self) -> Self {
        self.keep_alive = false;
        self
    }
}
