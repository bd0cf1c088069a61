use exc_core::{Price, Side};
use rust_decimal::Decimal;

/// Simulated fill price for dry-run mode: `currentPrice * (1 +/- slippage)`,
/// unfavorable to the taker direction so dry-run behaves like a real fill
/// against the spread.
#[must_use]
pub fn simulated_fill_price(current_price: Price, side: Side, slippage: Decimal) -> Price {
    let factor = match side {
        Side::Buy => Decimal::ONE + slippage,
        Side::Sell => Decimal::ONE - slippage,
    };
    current_price * factor
}

/// Synthetic remote id for a dry-run fill, tagged so observers can tell it
/// apart from a real vendor id if they inspect it directly (the executor
/// itself treats it identically to a real one).
#[must_use]
pub fn synthetic_remote_id(client_id: &exc_core::ClientId) -> exc_core::RemoteId {
    exc_core::RemoteId(format!("dryrun-{client_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn buy_slippage_is_unfavorable_upward() {
        let price = simulated_fill_price(Price::new(dec!(50000)), Side::Buy, dec!(0.0001));
        assert_eq!(price, Price::new(dec!(50005.0000)));
    }

    #[test]
    fn sell_slippage_is_unfavorable_downward() {
        let price = simulated_fill_price(Price::new(dec!(50000)), Side::Sell, dec!(0.0001));
        assert_eq!(price, Price::new(dec!(49995.0000)));
    }
}
