//! Exchange adapter capability set.
//!
//! An adapter is an opaque, endpoint-specific handle responsible for
//! authentication, signing, and the concrete wire protocol. The execution
//! core never speaks HTTP/WebSocket directly — it only calls through this
//! trait, which is why every concurrency-relevant method is `async`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::order::{OrderFlags, OrderType, Side};
use crate::types::{Amount, Currency, Price, RemoteId, Symbol};

/// Vendor-neutral order submission parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderParams {
    pub symbol: Symbol,
    pub order_type: OrderType,
    pub side: Side,
    pub amount: Amount,
    pub price: Option<Price>,
    pub client_order_id: String,
    pub post_only: bool,
    pub reduce_only: bool,
    /// `"PO"` for post-only, `"IOC"`/`"FOK"` as applicable; `None` otherwise.
    pub time_in_force: Option<String>,
}

/// Response from `createOrder`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    pub remote_id: RemoteId,
    pub filled: Amount,
    pub remaining: Amount,
    pub average: Option<Price>,
    pub status: RemoteOrderStatus,
    pub fee: Option<Price>,
}

/// Vendor-neutral remote order status, as returned by `createOrder`/`fetchOrder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteOrderStatus {
    Open,
    Closed,
    Canceled,
    Rejected,
    Expired,
}

/// Response from `fetchOrder`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusSnapshot {
    pub remote_id: RemoteId,
    pub status: RemoteOrderStatus,
    pub filled: Amount,
    pub amount: Amount,
    pub average: Option<Price>,
}

/// Response from `fetchTicker`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ticker {
    pub bid: Price,
    pub ask: Price,
    pub last: Price,
}

/// Response element from `fetchPositions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: Symbol,
    pub side: Side,
    pub size: Amount,
    pub entry_price: Price,
    pub mark_price: Price,
    pub unrealized_pnl: Price,
}

/// Response element from `fetchBalance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub currency: Currency,
    pub total: Amount,
    pub free: Amount,
    pub used: Amount,
}

/// Response element from `fetchMyTrades`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeFill {
    pub remote_id: RemoteId,
    pub symbol: Symbol,
    pub price: Price,
    pub amount: Amount,
    pub fee: Price,
    pub timestamp: DateTime<Utc>,
}

/// Response element from `fetchOpenOrders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenOrder {
    pub remote_id: RemoteId,
    pub symbol: Symbol,
    pub side: Side,
    pub price: Price,
    pub amount: Amount,
    pub filled: Amount,
    pub remaining: Amount,
    pub status: RemoteOrderStatus,
    pub flags: OrderFlags,
}

/// Per-capability presence booleans. `ExchangeAdapter` implementations
/// report which optional capabilities they actually support so the failover
/// controller's probe selection and the reconciler's fill-backfill decision
/// can adapt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdapterCapabilities {
    pub create_order: bool,
    pub cancel_order: bool,
    pub fetch_order: bool,
    pub fetch_open_orders: bool,
    pub fetch_positions: bool,
    pub fetch_balance: bool,
    pub fetch_ticker: bool,
    pub fetch_time: bool,
    pub fetch_my_trades: bool,
}

impl Default for AdapterCapabilities {
    /// Adapters implementing the full mandatory capability set default to
    /// fully capable; adapters with gaps override explicitly.
    fn default() -> Self {
        Self {
            create_order: true,
            cancel_order: true,
            fetch_order: true,
            fetch_open_orders: true,
            fetch_positions: true,
            fetch_balance: true,
            fetch_ticker: true,
            fetch_time: true,
            fetch_my_trades: true,
        }
    }
}

/// Capability-typed handle to a single exchange endpoint.
///
/// Every method is a suspension point: the runtime may interleave other
/// work on this task while any call is in flight. Implementations are
/// responsible for authentication, signing, and idempotent `cancel_order`/
/// `fetch_order` semantics — the execution core assumes, but does not
/// enforce, that a canceled or already-fetched order is safe to re-request.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::default()
    }

    async fn create_order(&self, params: CreateOrderParams) -> Result<OrderAck, AdapterError>;

    async fn cancel_order(&self, remote_id: &RemoteId, symbol: &Symbol) -> Result<(), AdapterError>;

    async fn fetch_order(
        &self,
        remote_id: &RemoteId,
        symbol: &Symbol,
    ) -> Result<OrderStatusSnapshot, AdapterError>;

    async fn fetch_open_orders(
        &self,
        symbol: Option<&Symbol>,
    ) -> Result<Vec<OpenOrder>, AdapterError>;

    async fn fetch_positions(&self) -> Result<Vec<PositionSnapshot>, AdapterError>;

    async fn fetch_balance(&self) -> Result<Vec<BalanceSnapshot>, AdapterError>;

    async fn fetch_ticker(&self, symbol: &Symbol) -> Result<Ticker, AdapterError>;

    async fn fetch_time(&self) -> Result<DateTime<Utc>, AdapterError>;

    async fn fetch_my_trades(&self, symbol: Option<&Symbol>) -> Result<Vec<TradeFill>, AdapterError>;
}
