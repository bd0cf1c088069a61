use rust_decimal::prelude::ToPrimitive;

use crate::config::EqmConfig;
use crate::record::ExecutionRecord;
use crate::window::{compute_stats, RollingWindow};

/// Minimum sample count before statistical (z-score) detection kicks in;
/// below this the sample stddev is too noisy to trust.
const MIN_SAMPLES_FOR_ZSCORE: usize = 30;

/// Number of most recent records the z-score baseline is computed over.
const ZSCORE_BASELINE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyKind {
    ThresholdSlippage,
    ThresholdExecutionTime,
    ThresholdFillRate,
    StatisticalSlippage,
}

#[derive(Debug, Clone, Copy)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub zscore: Option<f64>,
}

/// Flag an anomaly if the record breaches an anomaly-grade threshold, or if
/// its slippage is an outlier (`|z| >= anomaly_sensitivity`) against the
/// trailing baseline once enough history exists.
#[must_use]
pub fn detect(record: &ExecutionRecord, window: &RollingWindow, config: &EqmConfig) -> Option<Anomaly> {
    if record.slippage.abs() >= config.slippage_anomaly_threshold {
        return Some(Anomaly { kind: AnomalyKind::ThresholdSlippage, zscore: None });
    }
    if record.execution_time_ms >= config.execution_time_anomaly_ms {
        return Some(Anomaly { kind: AnomalyKind::ThresholdExecutionTime, zscore: None });
    }
    if record.fill_rate < config.fill_rate_critical {
        return Some(Anomaly { kind: AnomalyKind::ThresholdFillRate, zscore: None });
    }

    if !config.enable_anomaly_detection {
        return None;
    }

    let baseline = window.recent_slippage(ZSCORE_BASELINE_SIZE);
    if baseline.len() < MIN_SAMPLES_FOR_ZSCORE {
        return None;
    }

    let stats = compute_stats(&baseline);
    if stats.stddev == 0.0 {
        return None;
    }

    let sample = record.slippage.to_f64().unwrap_or(0.0);
    let zscore = (sample - stats.avg) / stats.stddev;
    if zscore.abs() >= config.anomaly_sensitivity {
        Some(Anomaly { kind: AnomalyKind::StatisticalSlippage, zscore: Some(zscore) })
    } else {
        None
    }
}
