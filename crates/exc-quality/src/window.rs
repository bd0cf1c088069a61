use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;

use crate::config::EqmConfig;
use crate::quality::QualityBucket;
use crate::record::ExecutionRecord;

/// Summary statistics over a slice of samples: min/max/avg plus the
/// percentiles and standard deviation used to classify execution quality.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub p5: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub stddev: f64,
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = rank - lower as f64;
        sorted[lower] + weight * (sorted[upper] - sorted[lower])
    }
}

#[must_use]
pub fn compute_stats(values: &[f64]) -> Stats {
    if values.is_empty() {
        return Stats::default();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let count = sorted.len();
    let sum: f64 = sorted.iter().sum();
    let avg = sum / count as f64;
    let variance = sorted.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / count as f64;

    Stats {
        count,
        min: sorted[0],
        max: sorted[count - 1],
        avg,
        p5: percentile(&sorted, 0.05),
        p50: percentile(&sorted, 0.50),
        p95: percentile(&sorted, 0.95),
        p99: percentile(&sorted, 0.99),
        stddev: variance.sqrt(),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QualityDistribution {
    pub excellent: u32,
    pub good: u32,
    pub average: u32,
    pub poor: u32,
    pub critical: u32,
}

impl QualityDistribution {
    fn record(&mut self, bucket: QualityBucket) {
        match bucket {
            QualityBucket::Excellent => self.excellent += 1,
            QualityBucket::Good => self.good += 1,
            QualityBucket::Average => self.average += 1,
            QualityBucket::Poor => self.poor += 1,
            QualityBucket::Critical => self.critical += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SignDistribution {
    pub positive: u32,
    pub negative: u32,
    pub zero: u32,
}

impl SignDistribution {
    fn record(&mut self, slippage: f64) {
        if slippage > 0.0 {
            self.positive += 1;
        } else if slippage < 0.0 {
            self.negative += 1;
        } else {
            self.zero += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FillRateSummary {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

/// Full aggregation over one window's records.
#[derive(Debug, Clone, Default)]
pub struct AggregateSnapshot {
    pub slippage: Stats,
    pub execution_time: Stats,
    pub fill_rate: FillRateSummary,
    pub quality_distribution: QualityDistribution,
    pub sign_distribution: SignDistribution,
}

#[must_use]
pub fn aggregate(records: &[&ExecutionRecord]) -> AggregateSnapshot {
    if records.is_empty() {
        return AggregateSnapshot::default();
    }

    let slippage_values: Vec<f64> = records.iter().map(|r| r.slippage.to_f64().unwrap_or(0.0)).collect();
    let time_values: Vec<f64> = records.iter().map(|r| r.execution_time_ms as f64).collect();
    let fill_rates: Vec<f64> = records.iter().map(|r| r.fill_rate.to_f64().unwrap_or(0.0)).collect();

    let mut quality_distribution = QualityDistribution::default();
    let mut sign_distribution = SignDistribution::default();
    for (record, slip) in records.iter().zip(&slippage_values) {
        quality_distribution.record(record.quality);
        sign_distribution.record(*slip);
    }

    let fill_rate = FillRateSummary {
        min: fill_rates.iter().cloned().fold(f64::INFINITY, f64::min),
        avg: fill_rates.iter().sum::<f64>() / fill_rates.len() as f64,
        max: fill_rates.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    };

    AggregateSnapshot {
        slippage: compute_stats(&slippage_values),
        execution_time: compute_stats(&time_values),
        fill_rate,
        quality_distribution,
        sign_distribution,
    }
}

/// A window's three views of the same underlying history: 1 hour, 24 hour,
/// and lifetime (count-bounded, independent of age).
#[derive(Debug, Default)]
pub struct RollingWindow {
    /// Age-bounded to `rolling_window_time` (default 24h); the short-term
    /// window is a filtered slice of this same buffer.
    history: VecDeque<ExecutionRecord>,
    /// Count-bounded to `statistics_window_size`, never age-evicted.
    lifetime: VecDeque<ExecutionRecord>,
}

impl RollingWindow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ExecutionRecord, config: &EqmConfig, now: DateTime<Utc>) {
        self.history.push_back(record.clone());
        self.evict_aged_out(config, now);

        self.lifetime.push_back(record);
        while self.lifetime.len() > config.statistics_window_size {
            self.lifetime.pop_front();
        }
    }

    fn evict_aged_out(&mut self, config: &EqmConfig, now: DateTime<Utc>) {
        let cutoff = now - config.rolling_window();
        while let Some(front) = self.history.front() {
            if front.end_time < cutoff {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    #[must_use]
    pub fn short_term(&self, config: &EqmConfig, now: DateTime<Utc>) -> AggregateSnapshot {
        let cutoff = now - config.short_term_window();
        let records: Vec<&ExecutionRecord> = self.history.iter().filter(|r| r.end_time >= cutoff).collect();
        aggregate(&records)
    }

    #[must_use]
    pub fn daily(&self) -> AggregateSnapshot {
        let records: Vec<&ExecutionRecord> = self.history.iter().collect();
        aggregate(&records)
    }

    #[must_use]
    pub fn lifetime(&self) -> AggregateSnapshot {
        let records: Vec<&ExecutionRecord> = self.lifetime.iter().collect();
        aggregate(&records)
    }

    #[must_use]
    pub fn recent_slippage(&self, n: usize) -> Vec<f64> {
        self.lifetime.iter().rev().take(n).map(|r| r.slippage.to_f64().unwrap_or(0.0)).collect()
    }

    #[must_use]
    pub fn lifetime_len(&self) -> usize {
        self.lifetime.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exc_core::{AccountId, Amount, EndpointId, Price, Side, Symbol};
    use rust_decimal_macros::dec;

    fn record(slippage: rust_decimal::Decimal, execution_time_ms: u64, end_time: DateTime<Utc>) -> ExecutionRecord {
        ExecutionRecord {
            symbol: Symbol::from("BTC/USDT"),
            side: Side::Buy,
            endpoint_id: EndpointId::from("binance"),
            account_id: AccountId::from("acct-1"),
            start_time: end_time,
            end_time,
            expected_price: Price::new(dec!(50000)),
            avg_fill_price: Price::new(dec!(50000)),
            amount: Amount::new(dec!(1)),
            filled_amount: Amount::new(dec!(1)),
            slippage,
            execution_time_ms,
            fill_rate: dec!(1),
            time_to_first_fill_ms: Some(10),
            final_status: crate::record::FinalStatus::Filled,
            quality: crate::quality::QualityBucket::Good,
        }
    }

    #[test]
    fn percentile_of_sorted_values() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 1.0), 5.0);
        assert_eq!(percentile(&values, 0.5), 3.0);
    }

    #[test]
    fn lifetime_buffer_evicts_oldest_beyond_capacity() {
        let config = EqmConfig { statistics_window_size: 2, ..EqmConfig::default() };
        let mut window = RollingWindow::new();
        let now = Utc::now();
        window.push(record(dec!(0.001), 100, now), &config, now);
        window.push(record(dec!(0.002), 100, now), &config, now);
        window.push(record(dec!(0.003), 100, now), &config, now);

        assert_eq!(window.lifetime_len(), 2);
        let snapshot = window.lifetime();
        assert_eq!(snapshot.slippage.count, 2);
    }

    #[test]
    fn history_ages_out_beyond_rolling_window() {
        let config = EqmConfig { rolling_window_time_ms: 1000, ..EqmConfig::default() };
        let mut window = RollingWindow::new();
        let old_time = Utc::now() - chrono::Duration::milliseconds(5000);
        window.push(record(dec!(0.001), 100, old_time), &config, old_time);

        let now = Utc::now();
        window.push(record(dec!(0.002), 100, now), &config, now);

        let snapshot = window.daily();
        assert_eq!(snapshot.slippage.count, 1);
    }

    #[test]
    fn aggregate_of_empty_records_has_zero_count() {
        let snapshot = aggregate(&[]);
        assert_eq!(snapshot.slippage.count, 0);
    }
}
