use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use exc_core::{
    AdapterCapabilities, AdapterError, Amount, BalanceSnapshot, CreateOrderParams, Currency,
    ExchangeAdapter, OpenOrder, OrderAck, OrderStatusSnapshot, PositionSnapshot, RemoteId,
    RemoteOrderStatus, Side, Symbol, Ticker, TradeFill,
};
use rust_decimal_macros::dec;

/// In-memory deterministic adapter for local runs and integration tests.
/// Every order fills immediately at the requested price; there is no
/// network, no latency, and no rejection path beyond what the caller asks
/// for via `fail_next`.
pub struct SimulatedAdapter {
    next_remote_id: AtomicU64,
    orders: DashMap<RemoteId, OpenOrder>,
    balances: DashMap<Currency, BalanceSnapshot>,
    fail_next: std::sync::atomic::AtomicBool,
}

impl SimulatedAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_remote_id: AtomicU64::new(1),
            orders: DashMap::new(),
            balances: DashMap::new(),
            fail_next: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn seed_balance(&self, currency: Currency, total: Amount) {
        self.balances.insert(currency.clone(), BalanceSnapshot { currency, total, free: total, used: Amount::ZERO });
    }

    /// The next `create_order` call returns a rejected error instead of
    /// filling, then resets.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl Default for SimulatedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeAdapter for SimulatedAdapter {
    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::default()
    }

    async fn create_order(&self, params: CreateOrderParams) -> Result<OrderAck, AdapterError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AdapterError::new("simulated rejection"));
        }

        let remote_id = RemoteId(format!("sim-{}", self.next_remote_id.fetch_add(1, Ordering::SeqCst)));
        let price = params.price.unwrap_or(exc_core::Price::ZERO);
        let flags = exc_core::OrderFlags { reduce_only: params.reduce_only, post_only: params.post_only };
        let order = OpenOrder {
            remote_id: remote_id.clone(),
            symbol: params.symbol,
            side: params.side,
            price,
            amount: params.amount,
            filled: params.amount,
            remaining: Amount::ZERO,
            status: RemoteOrderStatus::Closed,
            flags,
        };
        self.orders.insert(remote_id.clone(), order);

        Ok(OrderAck {
            remote_id,
            filled: params.amount,
            remaining: Amount::ZERO,
            average: Some(price),
            status: RemoteOrderStatus::Closed,
            fee: Some(exc_core::Price::new(dec!(0))),
        })
    }

    async fn cancel_order(&self, remote_id: &RemoteId, _symbol: &Symbol) -> Result<(), AdapterError> {
        self.orders.remove(remote_id);
        Ok(())
    }

    async fn fetch_order(&self, remote_id: &RemoteId, _symbol: &Symbol) -> Result<OrderStatusSnapshot, AdapterError> {
        self.orders
            .get(remote_id)
            .map(|o| OrderStatusSnapshot { remote_id: o.remote_id.clone(), status: o.status, filled: o.filled, amount: o.amount, average: Some(o.price) })
            .ok_or_else(|| AdapterError::new("unknown order"))
    }

    async fn fetch_open_orders(&self, symbol: Option<&Symbol>) -> Result<Vec<OpenOrder>, AdapterError> {
        Ok(self
            .orders
            .iter()
            .filter(|e| symbol.map_or(true, |s| &e.value().symbol == s))
            .filter(|e| e.value().status != RemoteOrderStatus::Closed)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn fetch_positions(&self) -> Result<Vec<PositionSnapshot>, AdapterError> {
        Ok(Vec::new())
    }

    async fn fetch_balance(&self) -> Result<Vec<BalanceSnapshot>, AdapterError> {
        Ok(self.balances.iter().map(|e| e.value().clone()).collect())
    }

    async fn fetch_ticker(&self, _symbol: &Symbol) -> Result<Ticker, AdapterError> {
        let price = exc_core::Price::new(dec!(50000));
        Ok(Ticker { bid: price, ask: price, last: price })
    }

    async fn fetch_time(&self) -> Result<DateTime<Utc>, AdapterError> {
        Ok(Utc::now())
    }

    async fn fetch_my_trades(&self, _symbol: Option<&Symbol>) -> Result<Vec<TradeFill>, AdapterError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exc_core::{CreateOrderParams, OrderFlags, OrderType};

    fn params() -> CreateOrderParams {
        CreateOrderParams {
            symbol: Symbol::from("BTC/USDT"),
            order_type: OrderType::Limit,
            side: Side::Buy,
            amount: Amount::new(dec!(1)),
            price: Some(exc_core::Price::new(dec!(50000))),
            client_order_id: "cid-1".to_string(),
            post_only: false,
            reduce_only: false,
            time_in_force: None,
        }
    }

    #[tokio::test]
    async fn create_order_fills_immediately() {
        let adapter = SimulatedAdapter::new();
        let ack = adapter.create_order(params()).await.unwrap();
        assert_eq!(ack.status, RemoteOrderStatus::Closed);
        assert_eq!(ack.filled, Amount::new(dec!(1)));
    }

    #[tokio::test]
    async fn fail_next_rejects_exactly_one_order() {
        let adapter = SimulatedAdapter::new();
        adapter.fail_next();
        assert!(adapter.create_order(params()).await.is_err());
        assert!(adapter.create_order(params()).await.is_ok());
    }

    #[tokio::test]
    async fn seeded_balance_is_returned_by_fetch_balance() {
        let adapter = SimulatedAdapter::new();
        adapter.seed_balance(Currency::from("USDT"), Amount::new(dec!(10000)));
        let balances = adapter.fetch_balance().await.unwrap();
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].total, Amount::new(dec!(10000)));
    }
}
