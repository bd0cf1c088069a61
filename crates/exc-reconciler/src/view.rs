use chrono::{DateTime, Utc};
use exc_core::{Amount, Currency, Price, RemoteId, RemoteOrderStatus, Side, Symbol};

#[derive(Debug, Clone)]
pub struct OrderView {
    pub symbol: Symbol,
    pub side: Side,
    pub price: Price,
    pub amount: Amount,
    pub filled: Amount,
    pub remaining: Amount,
    pub status: RemoteOrderStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PositionView {
    pub side: Side,
    pub size: Amount,
    pub entry_price: Price,
    pub mark_price: Price,
    pub unrealized_pnl: Price,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BalanceView {
    pub total: Amount,
    pub free: Amount,
    pub used: Amount,
    pub updated_at: DateTime<Utc>,
}

/// One side (local or remote) of the reconciler's keyed state. Local is
/// mutated by the executor as orders progress; remote is overwritten wholly
/// on each sync from adapter responses.
#[derive(Debug, Default)]
pub struct Ledger {
    pub orders: dashmap::DashMap<RemoteId, OrderView>,
    pub positions: dashmap::DashMap<Symbol, PositionView>,
    pub balances: dashmap::DashMap<Currency, BalanceView>,
    /// Only meaningful on the remote side: when the last full/quick sync
    /// against the adapter completed.
    pub last_sync_at: parking_lot::Mutex<Option<DateTime<Utc>>>,
}

impl Ledger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_synced(&self, at: DateTime<Utc>) {
        *self.last_sync_at.lock() = Some(at);
    }

    pub fn replace_orders(&self, orders: impl IntoIterator<Item = (RemoteId, OrderView)>) {
        self.orders.clear();
        for (id, view) in orders {
            self.orders.insert(id, view);
        }
    }

    pub fn replace_positions(&self, positions: impl IntoIterator<Item = (Symbol, PositionView)>) {
        self.positions.clear();
        for (symbol, view) in positions {
            self.positions.insert(symbol, view);
        }
    }

    pub fn replace_balances(&self, balances: impl IntoIterator<Item = (Currency, BalanceView)>) {
        self.balances.clear();
        for (currency, view) in balances {
            self.balances.insert(currency, view);
        }
    }
}
