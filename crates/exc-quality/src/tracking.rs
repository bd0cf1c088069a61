use chrono::{DateTime, Utc};
use exc_core::{AccountId, Amount, EndpointId, Price, Side, Symbol};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fraction of requested amount that counts as fully filled, matching
/// `Order::dust_tolerance_met`'s treatment of near-complete fills.
const FULL_FILL_THRESHOLD: Decimal = dec!(0.9999);

#[derive(Debug, Clone)]
pub struct FillRecord {
    pub price: Price,
    pub amount: Amount,
    pub timestamp: DateTime<Utc>,
    pub fee: Price,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingStatus {
    Tracking,
    PartiallyFilled,
    Filled,
}

/// Live state for one order between `start_tracking` and `complete_tracking`.
#[derive(Debug, Clone)]
pub struct TrackedExecution {
    pub symbol: Symbol,
    pub side: Side,
    pub endpoint_id: EndpointId,
    pub account_id: AccountId,
    pub expected_price: Price,
    pub amount: Amount,
    pub start_time: DateTime<Utc>,
    pub fills: Vec<FillRecord>,
    pub filled_amount: Amount,
    pub filled_value: Decimal,
    pub status: TrackingStatus,
}

impl TrackedExecution {
    #[must_use]
    pub fn new(
        symbol: Symbol,
        side: Side,
        endpoint_id: EndpointId,
        account_id: AccountId,
        expected_price: Price,
        amount: Amount,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol,
            side,
            endpoint_id,
            account_id,
            expected_price,
            amount,
            start_time,
            fills: Vec::new(),
            filled_amount: Amount::ZERO,
            filled_value: Decimal::ZERO,
            status: TrackingStatus::Tracking,
        }
    }

    /// Append a fill, update cumulative filled amount/value, and transition
    /// `status` to `PartiallyFilled` or `Filled` once the fill clears
    /// `FULL_FILL_THRESHOLD` of the requested amount.
    pub fn record_fill(&mut self, price: Price, amount: Amount, fee: Price, now: DateTime<Utc>) {
        let latency_ms = (now - self.start_time).num_milliseconds().max(0) as u64;
        self.fills.push(FillRecord { price, amount, timestamp: now, fee, latency_ms });
        self.filled_amount = Amount::new(self.filled_amount.inner() + amount.inner());
        self.filled_value += amount.inner() * price.inner();

        self.status = if !self.amount.is_zero() && self.filled_amount.inner() >= self.amount.inner() * FULL_FILL_THRESHOLD {
            TrackingStatus::Filled
        } else {
            TrackingStatus::PartiallyFilled
        };
    }

    #[must_use]
    pub fn avg_fill_price(&self) -> Price {
        if self.filled_amount.is_zero() {
            Price::ZERO
        } else {
            Price::new(self.filled_value / self.filled_amount.inner())
        }
    }

    #[must_use]
    pub fn time_to_first_fill_ms(&self) -> Option<u64> {
        self.fills.first().map(|f| f.latency_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TrackedExecution {
        TrackedExecution::new(
            Symbol::from("BTC/USDT"),
            Side::Buy,
            EndpointId::from("binance"),
            AccountId::from("acct-1"),
            Price::new(dec!(50000)),
            Amount::new(dec!(1)),
            Utc::now(),
        )
    }

    #[test]
    fn partial_fill_does_not_transition_to_filled() {
        let mut exec = sample();
        exec.record_fill(Price::new(dec!(50000)), Amount::new(dec!(0.5)), Price::ZERO, Utc::now());
        assert_eq!(exec.status, TrackingStatus::PartiallyFilled);
    }

    #[test]
    fn near_complete_fill_counts_as_filled() {
        let mut exec = sample();
        exec.record_fill(Price::new(dec!(50000)), Amount::new(dec!(0.99995)), Price::ZERO, Utc::now());
        assert_eq!(exec.status, TrackingStatus::Filled);
    }

    #[test]
    fn avg_fill_price_is_value_weighted() {
        let mut exec = sample();
        exec.record_fill(Price::new(dec!(50000)), Amount::new(dec!(0.5)), Price::ZERO, Utc::now());
        exec.record_fill(Price::new(dec!(50100)), Amount::new(dec!(0.5)), Price::ZERO, Utc::now());
        assert_eq!(exec.avg_fill_price(), Price::new(dec!(50050)));
    }

    #[test]
    fn time_to_first_fill_is_none_before_any_fill() {
        assert_eq!(sample().time_to_first_fill_ms(), None);
    }
}
