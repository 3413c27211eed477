use std::fmt;
use std::time::Duration;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Summary of one profiled run
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerformanceMetrics {
    total_time_ms: u64,
    memory_used_bytes: i64,
    items_processed: u64,
    throughput: f64,
}

impl PerformanceMetrics {
    /// Derive throughput from raw measurements at millisecond resolution.
    /// Throughput is 0 when nothing was counted or under 1 ms elapsed.
    pub fn from_measurements(elapsed: Duration, memory_used_bytes: i64, items_processed: u64) -> Self {
        let total_time_ms = elapsed.as_millis().min(u64::MAX as u128) as u64;
        let throughput = if items_processed == 0 || total_time_ms == 0 {
            0.0
        } else {
            items_processed as f64 / (total_time_ms as f64 / 1000.0)
        };

        Self {
            total_time_ms,
            memory_used_bytes,
            items_processed,
            throughput,
        }
    }

    pub fn total_time_ms(&self) -> u64 {
        self.total_time_ms
    }

    pub fn total_time_seconds(&self) -> f64 {
        self.total_time_ms as f64 / 1000.0
    }

    /// Process memory delta across the run; negative if memory was released
    pub fn memory_used_bytes(&self) -> i64 {
        self.memory_used_bytes
    }

    pub fn memory_used_mb(&self) -> f64 {
        self.memory_used_bytes as f64 / BYTES_PER_MB
    }

    pub fn items_processed(&self) -> u64 {
        self.items_processed
    }

    /// Items per second
    pub fn throughput(&self) -> f64 {
        self.throughput
    }
}

impl fmt::Display for PerformanceMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}ms ({:.2}s), memory {:+.2} MB, {} items, {:.2} items/s",
            self.total_time_ms,
            self.total_time_seconds(),
            self.memory_used_mb(),
            self.items_processed,
            self.throughput
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput_from_measurements() {
        let metrics = PerformanceMetrics::from_measurements(Duration::from_millis(2000), 0, 10);
        assert_eq!(metrics.total_time_ms(), 2000);
        assert!((metrics.throughput() - 5.0).abs() < f64::EPSILON);
        assert!((metrics.total_time_seconds() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_items_or_zero_time_gives_zero_throughput() {
        assert_eq!(PerformanceMetrics::from_measurements(Duration::from_secs(1), 0, 0).throughput(), 0.0);
        assert_eq!(PerformanceMetrics::from_measurements(Duration::ZERO, 0, 100).throughput(), 0.0);
    }

    #[test]
    fn test_sub_millisecond_run_reports_zero_throughput() {
        let metrics = PerformanceMetrics::from_measurements(Duration::from_micros(500), 0, 5);
        assert_eq!(metrics.total_time_ms(), 0);
        assert_eq!(metrics.throughput(), 0.0);
    }

    #[test]
    fn test_throughput_uses_whole_milliseconds() {
        // 1999.9 ms truncates to 1999 ms
        let metrics = PerformanceMetrics::from_measurements(Duration::from_micros(1_999_900), 0, 1999);
        assert_eq!(metrics.total_time_ms(), 1999);
        assert!((metrics.throughput() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_memory_delta() {
        let metrics = PerformanceMetrics::from_measurements(Duration::from_secs(1), -2 * 1024 * 1024, 1);
        assert_eq!(metrics.memory_used_bytes(), -2 * 1024 * 1024);
        assert!((metrics.memory_used_mb() + 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_display_summary() {
        let metrics = PerformanceMetrics::from_measurements(Duration::from_millis(1500), 1024 * 1024, 3);
        assert_eq!(metrics.to_string(), "1500ms (1.50s), memory +1.00 MB, 3 items, 2.00 items/s");
    }
}
