//! Compile-time tunables for the logger.

/// Baud rate of the GPS receiver UART.
pub const GPS_BAUD: u32 = 9600;

/// How often the status page is redrawn.
pub const REFRESH_INTERVAL_MS: u32 = 1000;

/// How often a CSV row is appended to the log.
pub const LOG_INTERVAL_MS: u32 = 20_000;

/// Fields older than this are shown as missing on the status page.
pub const STALE_AFTER_MS: u32 = 10_000;

/// After this much uptime, fewer than [`NO_DATA_MIN_CHARS`] received
/// characters means the receiver is probably not wired up.
pub const NO_DATA_TIMEOUT_MS: u32 = 5000;
pub const NO_DATA_MIN_CHARS: u32 = 10;

/// UART receive channel between the interrupt and the decoder task.
pub const UART_RX_BUFSIZE: usize = 256;

/// USB transmit channel for CSV rows.
pub const USB_BUFSIZE: usize = 64;

/// Capacity of one formatted CSV row.
pub const CSV_ROW_CAPACITY: usize = 192;
