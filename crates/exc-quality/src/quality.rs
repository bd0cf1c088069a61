use rust_decimal::Decimal;

use crate::config::EqmConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QualityBucket {
    Excellent,
    Good,
    Average,
    Poor,
    Critical,
}

impl QualityBucket {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Average => "average",
            Self::Poor => "poor",
            Self::Critical => "critical",
        }
    }
}

/// Classify an execution from worst to best: `Critical` short-circuits on
/// any anomaly-grade breach, `Poor` on critical-grade slippage/time, then
/// `Average` at the warning thresholds, `Excellent` when comfortably inside
/// half the warning band on every dimension, `Good` otherwise.
#[must_use]
pub fn classify(slippage: Decimal, execution_time_ms: u64, fill_rate: Decimal, config: &EqmConfig) -> QualityBucket {
    let abs_slippage = slippage.abs();

    if abs_slippage >= config.slippage_anomaly_threshold
        || execution_time_ms >= config.execution_time_anomaly_ms
        || fill_rate < config.fill_rate_critical
    {
        return QualityBucket::Critical;
    }

    if abs_slippage >= config.slippage_critical_threshold || execution_time_ms >= config.execution_time_critical_ms {
        return QualityBucket::Poor;
    }

    if abs_slippage >= config.slippage_warning_threshold
        || execution_time_ms >= config.execution_time_warning_ms
        || fill_rate < config.fill_rate_warning
    {
        return QualityBucket::Average;
    }

    let half_warn_slippage = config.slippage_warning_threshold / Decimal::from(2);
    let half_warn_time = config.execution_time_warning_ms / 2;
    if abs_slippage < half_warn_slippage && execution_time_ms < half_warn_time && fill_rate > Decimal::from(95) / Decimal::from(100) {
        return QualityBucket::Excellent;
    }

    QualityBucket::Good
}
