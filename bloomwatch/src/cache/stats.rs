//! Cache statistics tracking and reporting.

use serde::Serialize;

/// Counters for one cache instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    /// Entries dropped to make room (LRU)
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed
    pub expirations: u64,
    /// Entries removed by explicit invalidation or flush
    pub invalidations: u64,
    /// Live entries at snapshot time
    pub entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_insertion(&mut self) {
        self.insertions += 1;
    }

    pub fn record_eviction(&mut self, count: u64) {
        self.evictions += count;
    }

    pub fn record_expiration(&mut self, count: u64) {
        self.expirations += count;
    }

    pub fn record_invalidation(&mut self, count: u64) {
        self.invalidations += count;
    }

    /// One-line summary for logs and the CLI.
    pub fn summary(&self) -> String {
        format!(
            "{} entries, {} hits / {} misses ({:.1}% hit rate), {} evicted, {} expired, {} invalidated",
            self.entries,
            self.hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.evictions,
            self.expirations,
            self.invalidations
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_empty() {
        assert_eq!(CacheStats::new().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert!((stats.hit_rate() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_summary_mentions_counts() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_eviction(2);
        let text = stats.summary();
        assert!(text.contains("1 hits"));
        assert!(text.contains("2 evicted"));
    }
}
