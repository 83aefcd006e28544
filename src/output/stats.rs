//! Per-run statistics
//!
//! Counters are gathered by the coordinator while a pipeline runs and
//! printed once it finishes.

use std::time::Duration;

/// Crawl statistics summary for one pipeline run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlStatistics {
    /// Pipeline name
    pub pipeline: String,

    /// Requests that took a fetch slot
    pub pages_dispatched: u64,

    /// Requests that ended in a successful fetch
    pub pages_fetched: u64,

    /// Requests abandoned after a permanent failure or exhausted retries
    pub pages_abandoned: u64,

    /// Retry attempts across all requests
    pub retries: u64,

    /// Records kept in the final dataset
    pub records: u64,

    /// Records dropped by the dedupe consumer
    pub duplicates: u64,

    /// Discovered URLs dropped because they were already queued or fetched
    pub urls_already_seen: u64,

    /// Followed links dropped by the allowed-domain filter
    pub urls_off_domain: u64,

    pub elapsed: Duration,
}

impl CrawlStatistics {
    /// Fetched pages per second over the whole run
    pub fn pages_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.pages_fetched as f64 / secs
        } else {
            0.0
        }
    }

    /// One-line summary logged at the end of every run
    pub fn summary_line(&self) -> String {
        format!(
            "Scraped {} records in {:.2} seconds",
            self.records,
            self.elapsed.as_secs_f64()
        )
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics: {} ===\n", stats.pipeline);

    println!("Overview:");
    println!("  Records scraped: {}", stats.records);
    println!("  Elapsed: {:.2}s", stats.elapsed.as_secs_f64());
    println!("  Throughput: {:.2} pages/sec", stats.pages_per_second());
    println!();

    println!("Fetches:");
    println!("  Dispatched: {}", stats.pages_dispatched);
    println!(
        "  Fetched: {} ({:.1}%)",
        stats.pages_fetched,
        percentage(stats.pages_fetched, stats.pages_dispatched)
    );
    println!(
        "  Abandoned: {} ({:.1}%)",
        stats.pages_abandoned,
        percentage(stats.pages_abandoned, stats.pages_dispatched)
    );
    println!("  Retries: {}", stats.retries);
    println!();

    if stats.duplicates > 0 || stats.urls_already_seen > 0 || stats.urls_off_domain > 0 {
        println!("Skipped:");
        if stats.duplicates > 0 {
            println!("  Duplicate records: {}", stats.duplicates);
        }
        if stats.urls_already_seen > 0 {
            println!("  Already seen URLs: {}", stats.urls_already_seen);
        }
        if stats.urls_off_domain > 0 {
            println!("  Off-domain URLs: {}", stats.urls_off_domain);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line_even_for_zero_records() {
        let stats = CrawlStatistics {
            elapsed: Duration::from_millis(1_234),
            ..CrawlStatistics::default()
        };
        assert_eq!(stats.summary_line(), "Scraped 0 records in 1.23 seconds");
    }

    #[test]
    fn test_pages_per_second() {
        let stats = CrawlStatistics {
            pages_fetched: 10,
            elapsed: Duration::from_secs(4),
            ..CrawlStatistics::default()
        };
        assert!((stats.pages_per_second() - 2.5).abs() < f64::EPSILON);
        assert_eq!(CrawlStatistics::default().pages_per_second(), 0.0);
    }

    #[test]
    fn test_percentage_of_zero_total() {
        assert_eq!(percentage(3, 0), 0.0);
        assert!((percentage(1, 4) - 25.0).abs() < f64::EPSILON);
    }
}
