//! Units formatting and conversion utilities
//!
//! Reports carry latencies in microseconds and data volumes in bytes; these
//! helpers turn them into the figures printed in text reports.

const KIB: f64 = 1024.0;
const MIB: f64 = KIB * 1024.0;
const GIB: f64 = MIB * 1024.0;

/// Format a byte count with binary units
///
/// # Examples
/// ```
/// use kvorb::util::units::format_bytes;
///
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1536), "1.5 KiB");
/// assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    let size = bytes as f64;
    match size {
        s if s >= GIB => format!("{:.1} GiB", s / GIB),
        s if s >= MIB => format!("{:.1} MiB", s / MIB),
        s if s >= KIB => format!("{:.1} KiB", s / KIB),
        _ => format!("{} B", bytes),
    }
}

/// Data rate in MiB/s for `bytes` moved during `micros` of measured time.
/// `None` when nothing moved or no time was measured.
///
/// # Examples
/// ```
/// use kvorb::util::units::mib_per_sec;
///
/// assert_eq!(mib_per_sec(1_048_576, 1_000_000.0), Some(1.0));
/// assert_eq!(mib_per_sec(0, 10.0), None);
/// ```
pub fn mib_per_sec(bytes: u64, micros: f64) -> Option<f64> {
    if bytes == 0 || micros <= 0.0 {
        return None;
    }
    Some(bytes as f64 / MIB / (micros / 1_000_000.0))
}

/// Format a MiB/s rate, switching to GiB/s above 1024
pub fn format_mib_rate(rate: f64) -> String {
    if rate >= 1024.0 {
        format!("{:.2} GiB/s", rate / 1024.0)
    } else {
        format!("{:.2} MiB/s", rate)
    }
}

/// Format a latency given in microseconds
///
/// # Examples
/// ```
/// use kvorb::util::units::format_latency;
///
/// assert_eq!(format_latency(12.5), "12.50µs");
/// assert_eq!(format_latency(5000.0), "5.00ms");
/// assert_eq!(format_latency(2_500_000.0), "2.50s");
/// ```
pub fn format_latency(micros: f64) -> String {
    if micros >= 1_000_000.0 {
        format!("{:.2}s", micros / 1_000_000.0)
    } else if micros >= 1000.0 {
        format!("{:.2}ms", micros / 1000.0)
    } else {
        format!("{:.2}µs", micros)
    }
}
