use chrono::{DateTime, Utc};
use exc_core::{AccountId, Amount, EndpointId, Price, Side, Symbol};
use rust_decimal::Decimal;

use crate::config::EqmConfig;
use crate::quality::{classify, QualityBucket};
use crate::tracking::TrackedExecution;

/// Final status the caller reports at `complete_tracking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalStatus {
    Filled,
    PartiallyFilled,
    Canceled,
    Rejected,
    Failed,
}

/// The computed quality summary for one completed order.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub symbol: Symbol,
    pub side: Side,
    pub endpoint_id: EndpointId,
    pub account_id: AccountId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub expected_price: Price,
    pub avg_fill_price: Price,
    pub amount: Amount,
    pub filled_amount: Amount,
    pub slippage: Decimal,
    pub execution_time_ms: u64,
    pub fill_rate: Decimal,
    pub time_to_first_fill_ms: Option<u64>,
    pub final_status: FinalStatus,
    pub quality: QualityBucket,
}

/// Signed slippage relative to the expected price: positive is unfavorable
/// for both sides.
#[must_use]
pub fn slippage(side: Side, expected: Price, realized: Price) -> Decimal {
    if expected.is_zero() {
        return Decimal::ZERO;
    }
    match side {
        Side::Buy => (realized.inner() - expected.inner()) / expected.inner(),
        Side::Sell => (expected.inner() - realized.inner()) / expected.inner(),
    }
}

#[must_use]
pub fn finalize(execution: &TrackedExecution, final_status: FinalStatus, end_time: DateTime<Utc>, config: &EqmConfig) -> ExecutionRecord {
    let avg_fill_price = execution.avg_fill_price();
    let slip = slippage(execution.side, execution.expected_price, avg_fill_price);
    let execution_time_ms = (end_time - execution.start_time).num_milliseconds().max(0) as u64;
    let fill_rate = if execution.amount.is_zero() {
        Decimal::ZERO
    } else {
        execution.filled_amount.inner() / execution.amount.inner()
    };
    let quality = classify(slip, execution_time_ms, fill_rate, config);

    ExecutionRecord {
        symbol: execution.symbol.clone(),
        side: execution.side,
        endpoint_id: execution.endpoint_id.clone(),
        account_id: execution.account_id.clone(),
        start_time: execution.start_time,
        end_time,
        expected_price: execution.expected_price,
        avg_fill_price,
        amount: execution.amount,
        filled_amount: execution.filled_amount,
        slippage: slip,
        execution_time_ms,
        fill_rate,
        time_to_first_fill_ms: execution.time_to_first_fill_ms(),
        final_status,
        quality,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn buy_above_expected_is_unfavorable() {
        let slip = slippage(Side::Buy, Price::new(dec!(100)), Price::new(dec!(101)));
        assert_eq!(slip, dec!(0.01));
    }

    #[test]
    fn sell_below_expected_is_unfavorable() {
        let slip = slippage(Side::Sell, Price::new(dec!(100)), Price::new(dec!(99)));
        assert_eq!(slip, dec!(0.01));
    }

    #[test]
    fn sell_above_expected_is_favorable() {
        let slip = slippage(Side::Sell, Price::new(dec!(100)), Price::new(dec!(101)));
        assert_eq!(slip, dec!(-0.01));
    }

    #[test]
    fn finalize_computes_fill_rate_and_quality() {
        let mut exec = TrackedExecution::new(
            Symbol::from("BTC/USDT"),
            Side::Buy,
            EndpointId::from("binance"),
            AccountId::from("acct-1"),
            Price::new(dec!(50000)),
            Amount::new(dec!(1)),
            Utc::now(),
        );
        exec.record_fill(Price::new(dec!(50000)), Amount::new(dec!(1)), Price::ZERO, Utc::now());

        let record = finalize(&exec, FinalStatus::Filled, Utc::now(), &EqmConfig::default());
        assert_eq!(record.fill_rate, dec!(1));
        assert_eq!(record.quality, QualityBucket::Excellent);
    }
}
