//! Order domain type and lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{AccountId, Amount, ClientId, EndpointId, Price, RemoteId, Symbol};

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    #[must_use]
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// +1 for buy, -1 for sell. Used for slippage sign.
    #[must_use]
    pub fn sign(&self) -> i32 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderType {
    Market,
    Limit,
    PostOnly,
    Ioc,
    Fok,
}

impl OrderType {
    /// Limit-family order types go through the stall-monitor / reprice path;
    /// market orders fill-or-fail immediately and skip it.
    #[must_use]
    pub fn has_stall_monitor(&self) -> bool {
        !matches!(self, Self::Market)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Market => "market",
            Self::Limit => "limit",
            Self::PostOnly => "postOnly",
            Self::Ioc => "ioc",
            Self::Fok => "fok",
        };
        write!(f, "{s}")
    }
}

/// Order-level behavior flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderFlags {
    pub reduce_only: bool,
    pub post_only: bool,
}

/// Order lifecycle state.
///
/// Transitions are monotone toward a terminal state:
/// `Pending -> Submitted -> {PartiallyFilled -> Submitted | terminal}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderState {
    Pending,
    Submitted,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
    Failed,
}

impl OrderState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Canceled | Self::Rejected | Self::Expired | Self::Failed
        )
    }

    /// Whether `next` is a legal transition from `self`. Transitions are
    /// monotone toward a terminal state; once terminal, an order never
    /// leaves it.
    #[must_use]
    pub fn can_transition_to(&self, next: OrderState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match self {
            Self::Pending => true, // anything, including direct terminal (e.g. Rejected)
            Self::Submitted => true,
            Self::PartiallyFilled => !matches!(next, Self::Pending),
            _ => false,
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// An order owned exclusively by the Smart Order Executor's in-flight table
/// until it reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub client_id: ClientId,
    pub remote_id: Option<RemoteId>,
    pub endpoint_id: EndpointId,
    pub account_id: AccountId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub requested_amount: Amount,
    pub remaining_amount: Amount,
    pub filled_amount: Amount,
    pub original_price: Price,
    pub current_price: Price,
    pub avg_fill_price: Price,
    pub flags: OrderFlags,
    pub state: OrderState,
    pub resubmit_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl Order {
    #[must_use]
    pub fn new(
        endpoint_id: EndpointId,
        account_id: AccountId,
        symbol: Symbol,
        side: Side,
        order_type: OrderType,
        amount: Amount,
        price: Price,
        flags: OrderFlags,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            client_id: ClientId::new(),
            remote_id: None,
            endpoint_id,
            account_id,
            symbol,
            side,
            order_type,
            requested_amount: amount,
            remaining_amount: amount,
            filled_amount: Amount::ZERO,
            original_price: price,
            current_price: price,
            avg_fill_price: Price::ZERO,
            flags,
            state: OrderState::Pending,
            resubmit_count: 0,
            created_at: now,
            updated_at: now,
            last_error: None,
        }
    }

    /// Apply a fill update, maintaining `filled + remaining == requested`.
    pub fn apply_fill(&mut self, filled_amount: Amount, avg_fill_price: Price, now: DateTime<Utc>) {
        self.filled_amount = filled_amount;
        self.remaining_amount = Amount::new(
            (self.requested_amount.inner() - filled_amount.inner()).max(rust_decimal::Decimal::ZERO),
        );
        self.avg_fill_price = avg_fill_price;
        self.updated_at = now;
    }

    pub fn transition(&mut self, next: OrderState, now: DateTime<Utc>) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        self.updated_at = now;
        true
    }

    #[must_use]
    pub fn dust_tolerance_met(&self, dust_fraction: rust_decimal::Decimal) -> bool {
        !self.filled_amount.is_zero()
            && self.remaining_amount.inner() < self.requested_amount.inner() * dust_fraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> Order {
        Order::new(
            EndpointId::from("binance"),
            AccountId::from("acct-1"),
            Symbol::from("BTC/USDT"),
            Side::Buy,
            OrderType::Limit,
            Amount::new(dec!(0.1)),
            Price::new(dec!(50000)),
            OrderFlags::default(),
            Utc::now(),
        )
    }

    #[test]
    fn invariant_filled_plus_remaining_equals_requested() {
        let mut order = sample();
        order.apply_fill(Amount::new(dec!(0.04)), Price::new(dec!(50010)), Utc::now());
        assert_eq!(
            order.filled_amount + order.remaining_amount,
            order.requested_amount
        );
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        let mut order = sample();
        assert!(order.transition(OrderState::Submitted, Utc::now()));
        assert!(order.transition(OrderState::Filled, Utc::now()));
        assert!(!order.transition(OrderState::Canceled, Utc::now()));
        assert_eq!(order.state, OrderState::Filled);
    }

    #[test]
    fn partially_filled_cannot_revert_to_pending() {
        let mut order = sample();
        order.transition(OrderState::Submitted, Utc::now());
        order.transition(OrderState::PartiallyFilled, Utc::now());
        assert!(!order.transition(OrderState::Pending, Utc::now()));
    }

    #[test]
    fn dust_tolerance() {
        let mut order = sample();
        order.apply_fill(Amount::new(dec!(0.0991)), Price::new(dec!(50000)), Utc::now());
        // remaining = 0.0009, requested*1% = 0.001 -> within dust tolerance
        assert!(order.dust_tolerance_met(dec!(0.01)));
    }
}
