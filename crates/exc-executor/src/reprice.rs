use exc_core::{Price, Side, Ticker};
use rust_decimal::Decimal;

/// New price after a stall-triggered cancel, per side/post-only quadrant.
#[must_use]
pub fn reprice_from_ticker(side: Side, post_only: bool, ticker: Ticker, maker_offset: Decimal) -> Price {
    match (side, post_only) {
        (Side::Buy, true) => ticker.bid * (Decimal::ONE + maker_offset),
        (Side::Buy, false) => ticker.ask,
        (Side::Sell, true) => ticker.ask * (Decimal::ONE - maker_offset),
        (Side::Sell, false) => ticker.bid,
    }
}

/// Fallback price when `fetchTicker` itself fails: walk the current price by
/// `priceSlippage`, in the direction that improves fill odds.
#[must_use]
pub fn reprice_fallback(current_price: Price, side: Side, slippage: Decimal) -> Price {
    match side {
        Side::Buy => current_price * (Decimal::ONE + slippage),
        Side::Sell => current_price * (Decimal::ONE - slippage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ticker() -> Ticker {
        Ticker {
            bid: Price::new(dec!(49900)),
            ask: Price::new(dec!(50100)),
            last: Price::new(dec!(50000)),
        }
    }

    #[test]
    fn buy_post_only_reprices_above_bid() {
        let price = reprice_from_ticker(Side::Buy, true, ticker(), dec!(0.0001));
        assert_eq!(price, Price::new(dec!(49900) * dec!(1.0001)));
    }

    #[test]
    fn buy_taker_reprices_to_ask() {
        let price = reprice_from_ticker(Side::Buy, false, ticker(), dec!(0.0001));
        assert_eq!(price, Price::new(dec!(50100)));
    }

    #[test]
    fn sell_post_only_reprices_below_ask() {
        let price = reprice_from_ticker(Side::Sell, true, ticker(), dec!(0.0001));
        assert_eq!(price, Price::new(dec!(50100) * dec!(0.9999)));
    }

    #[test]
    fn sell_taker_reprices_to_bid() {
        let price = reprice_from_ticker(Side::Sell, false, ticker(), dec!(0.0001));
        assert_eq!(price, Price::new(dec!(49900)));
    }

    #[test]
    fn fallback_walks_price_in_favorable_direction() {
        let buy = reprice_fallback(Price::new(dec!(50000)), Side::Buy, dec!(0.001));
        assert_eq!(buy, Price::new(dec!(50050.000)));
        let sell = reprice_fallback(Price::new(dec!(50000)), Side::Sell, dec!(0.001));
        assert_eq!(sell, Price::new(dec!(49950.000)));
    }
}
