use exc_core::{Currency, RemoteId, RemoteOrderStatus, Symbol};
use rust_decimal::Decimal;

use crate::view::Ledger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone)]
pub enum Inconsistency {
    OrderMissing { remote_id: RemoteId },
    OrderExtra { remote_id: RemoteId },
    OrderStatusDiff {
        remote_id: RemoteId,
        local_status: RemoteOrderStatus,
        remote_status: RemoteOrderStatus,
        local_filled: Decimal,
        remote_filled: Decimal,
    },
    PositionMissing { symbol: Symbol },
    PositionExtra { symbol: Symbol },
    PositionSizeDiff { symbol: Symbol, local: Decimal, remote: Decimal },
    BalanceMismatch { currency: Currency, local: Decimal, remote: Decimal },
}

impl Inconsistency {
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::OrderMissing { .. } => Severity::High,
            Self::OrderExtra { .. } | Self::OrderStatusDiff { .. } => Severity::Medium,
            Self::PositionMissing { .. } | Self::PositionExtra { .. } | Self::PositionSizeDiff { .. } => {
                Severity::Critical
            }
            Self::BalanceMismatch { .. } => Severity::Medium,
        }
    }
}

fn relative_exceeds(delta: Decimal, local: Decimal, remote: Decimal, tolerance: Decimal) -> bool {
    let base = local.abs().max(remote.abs());
    delta.abs() > base * tolerance
}

/// Local present but remote absent => `OrderMissing`. Remote present but
/// local absent => `OrderExtra`. Both present with differing status or a
/// fill delta beyond tolerance => `OrderStatusDiff`.
#[must_use]
pub fn diff_orders(local: &Ledger, remote: &Ledger, position_size_tolerance: Decimal) -> Vec<Inconsistency> {
    let mut out = Vec::new();

    for entry in local.orders.iter() {
        let remote_id = entry.key().clone();
        match remote.orders.get(&remote_id) {
            None => out.push(Inconsistency::OrderMissing { remote_id }),
            Some(remote_order) => {
                let local_order = entry.value();
                let local_filled = local_order.filled.0;
                let remote_filled = remote_order.filled.0;
                let amount = local_order.amount.0.abs().max(remote_order.amount.0.abs());
                let fill_delta = (local_filled - remote_filled).abs();
                let status_differs = local_order.status != remote_order.status;
                let fill_differs = fill_delta > amount * position_size_tolerance;
                if status_differs || fill_differs {
                    out.push(Inconsistency::OrderStatusDiff {
                        remote_id,
                        local_status: local_order.status,
                        remote_status: remote_order.status,
                        local_filled,
                        remote_filled,
                    });
                }
            }
        }
    }

    for entry in remote.orders.iter() {
        if !local.orders.contains_key(entry.key()) {
            out.push(Inconsistency::OrderExtra { remote_id: entry.key().clone() });
        }
    }

    out
}

/// Missing/extra by presence; `PositionSizeDiff` when `|Δsize| >
/// max(|local|,|remote|) * tolerance`.
#[must_use]
pub fn diff_positions(local: &Ledger, remote: &Ledger, tolerance: Decimal) -> Vec<Inconsistency> {
    let mut out = Vec::new();

    for entry in local.positions.iter() {
        let symbol = entry.key().clone();
        match remote.positions.get(&symbol) {
            None => out.push(Inconsistency::PositionMissing { symbol }),
            Some(remote_pos) => {
                let local_size = entry.value().size.0;
                let remote_size = remote_pos.size.0;
                if relative_exceeds(local_size - remote_size, local_size, remote_size, tolerance) {
                    out.push(Inconsistency::PositionSizeDiff { symbol, local: local_size, remote: remote_size });
                }
            }
        }
    }

    for entry in remote.positions.iter() {
        if !local.positions.contains_key(entry.key()) {
            out.push(Inconsistency::PositionExtra { symbol: entry.key().clone() });
        }
    }

    out
}

/// `BalanceMismatch` when `|Δtotal| > max(|local|,|remote|) * tolerance`.
#[must_use]
pub fn diff_balances(local: &Ledger, remote: &Ledger, tolerance: Decimal) -> Vec<Inconsistency> {
    let mut out = Vec::new();

    for entry in local.balances.iter() {
        let currency = entry.key().clone();
        if let Some(remote_bal) = remote.balances.get(&currency) {
            let local_total = entry.value().total.0;
            let remote_total = remote_bal.total.0;
            if relative_exceeds(local_total - remote_total, local_total, remote_total, tolerance) {
                out.push(Inconsistency::BalanceMismatch { currency, local: local_total, remote: remote_total });
            }
        }
    }

    out
}
