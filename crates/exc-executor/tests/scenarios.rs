use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use exc_account::{AccountLockConfig, AccountLockManager};
use exc_core::{
    AccountId, AdapterError, Amount, BalanceSnapshot, CreateOrderParams, EndpointId, ExchangeAdapter,
    OpenOrder, OrderAck, OrderFlags, OrderState, OrderStatusSnapshot, OrderType, Price,
    PositionSnapshot, RemoteId, RemoteOrderStatus, Side, Symbol, Ticker, TradeFill,
};
use exc_executor::{SmartOrderExecutor, SoeConfig, StaticEndpoint, SubmitRequest};
use exc_nonce::NonceCoordinator;
use exc_ratelimit::{RateLimitConfig, RateLimitController};
use parking_lot::Mutex;
use rust_decimal_macros::dec;

/// A fully scripted `ExchangeAdapter`: each call pops the next queued
/// response. Methods not exercised by a given scenario are left empty and
/// will panic on an unexpected call, surfacing test bugs immediately.
#[derive(Default)]
struct FakeAdapter {
    create_order: Mutex<VecDeque<Result<OrderAck, AdapterError>>>,
    cancel_order: Mutex<VecDeque<Result<(), AdapterError>>>,
    fetch_order: Mutex<VecDeque<Result<OrderStatusSnapshot, AdapterError>>>,
    fetch_ticker: Mutex<VecDeque<Result<Ticker, AdapterError>>>,
}

#[async_trait]
impl ExchangeAdapter for FakeAdapter {
    async fn create_order(&self, _params: CreateOrderParams) -> Result<OrderAck, AdapterError> {
        self.create_order
            .lock()
            .pop_front()
            .expect("unexpected create_order call")
    }

    async fn cancel_order(&self, _remote_id: &RemoteId, _symbol: &Symbol) -> Result<(), AdapterError> {
        self.cancel_order.lock().pop_front().unwrap_or(Ok(()))
    }

    async fn fetch_order(
        &self,
        _remote_id: &RemoteId,
        _symbol: &Symbol,
    ) -> Result<OrderStatusSnapshot, AdapterError> {
        self.fetch_order
            .lock()
            .pop_front()
            .expect("unexpected fetch_order call")
    }

    async fn fetch_open_orders(&self, _symbol: Option<&Symbol>) -> Result<Vec<OpenOrder>, AdapterError> {
        Ok(vec![])
    }

    async fn fetch_positions(&self) -> Result<Vec<PositionSnapshot>, AdapterError> {
        Ok(vec![])
    }

    async fn fetch_balance(&self) -> Result<Vec<BalanceSnapshot>, AdapterError> {
        Ok(vec![])
    }

    async fn fetch_ticker(&self, _symbol: &Symbol) -> Result<Ticker, AdapterError> {
        self.fetch_ticker
            .lock()
            .pop_front()
            .expect("unexpected fetch_ticker call")
    }

    async fn fetch_time(&self) -> Result<chrono::DateTime<chrono::Utc>, AdapterError> {
        Ok(chrono::Utc::now())
    }

    async fn fetch_my_trades(&self, _symbol: Option<&Symbol>) -> Result<Vec<TradeFill>, AdapterError> {
        Ok(vec![])
    }
}

fn executor(config: SoeConfig, endpoint: &EndpointId) -> (Arc<SmartOrderExecutor>, Arc<FakeAdapter>) {
    let account_lock = Arc::new(AccountLockManager::new(AccountLockConfig::default()));
    let rate_limiter = Arc::new(RateLimitController::new(RateLimitConfig {
        base: Duration::from_millis(config.rate_limit_initial_wait_ms),
        multiplier: config.rate_limit_backoff_multiplier,
        cap: Duration::from_millis(config.rate_limit_max_wait_ms),
        max_raises: 5,
    }));
    let nonce = Arc::new(NonceCoordinator::new());
    let selector = Arc::new(StaticEndpoint(endpoint.clone()));
    let adapter = Arc::new(FakeAdapter::default());

    let executor = Arc::new(SmartOrderExecutor::new(config, account_lock, rate_limiter, nonce, selector));
    executor.register_adapter(endpoint.clone(), adapter.clone());
    (executor, adapter)
}

fn base_request(endpoint: &EndpointId) -> SubmitRequest {
    SubmitRequest {
        account_id: AccountId::from("acct-1"),
        endpoint_id: Some(endpoint.clone()),
        symbol: Symbol::from("BTC/USDT"),
        side: Side::Buy,
        order_type: OrderType::Limit,
        amount: Amount::new(dec!(0.1)),
        price: Price::new(dec!(50000)),
        flags: OrderFlags::default(),
    }
}

/// S1 — reprice on stall: the first leg never fills, gets canceled and
/// repriced off the book, and the second leg fills completely.
#[tokio::test]
async fn s1_reprice_on_stall_fills_at_new_price() {
    let endpoint = EndpointId::from("binance");
    let mut config = SoeConfig::default();
    config.unfill_timeout_ms = 20;
    config.max_resubmit_attempts = 3;
    let (executor, adapter) = executor(config, &endpoint);

    adapter.create_order.lock().push_back(Ok(OrderAck {
        remote_id: RemoteId("o1".into()),
        filled: Amount::ZERO,
        remaining: Amount::new(dec!(0.1)),
        average: None,
        status: RemoteOrderStatus::Open,
        fee: None,
    }));
    adapter.fetch_order.lock().push_back(Ok(OrderStatusSnapshot {
        remote_id: RemoteId("o1".into()),
        status: RemoteOrderStatus::Open,
        filled: Amount::ZERO,
        amount: Amount::new(dec!(0.1)),
        average: None,
    }));
    adapter.fetch_ticker.lock().push_back(Ok(Ticker {
        bid: Price::new(dec!(49900)),
        ask: Price::new(dec!(50100)),
        last: Price::new(dec!(50000)),
    }));
    adapter.create_order.lock().push_back(Ok(OrderAck {
        remote_id: RemoteId("o2".into()),
        filled: Amount::new(dec!(0.1)),
        remaining: Amount::ZERO,
        average: Some(Price::new(dec!(50100))),
        status: RemoteOrderStatus::Closed,
        fee: None,
    }));
    adapter.fetch_order.lock().push_back(Ok(OrderStatusSnapshot {
        remote_id: RemoteId("o2".into()),
        status: RemoteOrderStatus::Closed,
        filled: Amount::new(dec!(0.1)),
        amount: Amount::new(dec!(0.1)),
        average: Some(Price::new(dec!(50100))),
    }));

    let mut events = executor.subscribe();
    let result = executor.submit(base_request(&endpoint)).await;

    assert!(result.success, "expected success, got {:?}", result.error);
    assert_eq!(result.order.state, OrderState::Filled);
    assert_eq!(result.order.avg_fill_price, Price::new(dec!(50100)));
    assert_eq!(result.order.resubmit_count, 1);

    let mut submitted = 0;
    let mut resubmitting = 0;
    let mut filled = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            exc_executor::SoeEvent::OrderSubmitted(_) => submitted += 1,
            exc_executor::SoeEvent::OrderResubmitting(_) => resubmitting += 1,
            exc_executor::SoeEvent::OrderFilled(_) => filled += 1,
            _ => {}
        }
    }
    assert_eq!(submitted, 2);
    assert_eq!(resubmitting, 1);
    assert_eq!(filled, 1);
}

/// S2 — rate-limit backoff: three HTTP 429s then success, no fatal error.
#[tokio::test]
async fn s2_rate_limit_backoff_then_success() {
    let endpoint = EndpointId::from("binance");
    let mut config = SoeConfig::default();
    config.rate_limit_initial_wait_ms = 5;
    config.rate_limit_max_wait_ms = 40;
    let (executor, adapter) = executor(config, &endpoint);

    for _ in 0..3 {
        adapter
            .create_order
            .lock()
            .push_back(Err(AdapterError::with_status("rate limit exceeded", 429)));
    }
    adapter.create_order.lock().push_back(Ok(OrderAck {
        remote_id: RemoteId("o1".into()),
        filled: Amount::new(dec!(0.1)),
        remaining: Amount::ZERO,
        average: Some(Price::new(dec!(50000))),
        status: RemoteOrderStatus::Closed,
        fee: None,
    }));

    let mut request = base_request(&endpoint);
    request.order_type = OrderType::Market;
    let result = executor.submit(request).await;

    assert!(result.success, "expected success, got {:?}", result.error);
    assert_eq!(result.order.state, OrderState::Filled);
    assert_eq!(result.order.resubmit_count, 3);
    assert_eq!(executor.stats().rate_limit_hits, 3);
}

/// S5 — dry-run: no adapter calls made, synthetic fill emitted.
#[tokio::test]
async fn s5_dry_run_fills_without_touching_the_adapter() {
    let endpoint = EndpointId::from("binance");
    let mut config = SoeConfig::default();
    config.dry_run = true;
    config.dry_run_fill_delay_ms = 5;
    config.dry_run_slippage = dec!(0.0001);
    let (executor, _adapter) = executor(config, &endpoint);

    let mut request = base_request(&endpoint);
    request.order_type = OrderType::Market;
    request.side = Side::Sell;
    request.price = Price::new(dec!(50000));

    let result = executor.submit(request).await;

    assert!(result.success);
    assert_eq!(result.order.state, OrderState::Filled);
    assert_eq!(result.order.avg_fill_price, Price::new(dec!(50000) * (dec!(1) - dec!(0.0001))));
    assert!(result.order.remote_id.unwrap().0.starts_with("dryrun-"));
    assert_eq!(executor.stats().filled, 1);
}

/// Property 9 — cancel idempotence: first call succeeds, second is a no-op.
#[tokio::test]
async fn cancel_is_idempotent() {
    let endpoint = EndpointId::from("binance");
    let mut config = SoeConfig::default();
    config.dry_run = true;
    config.dry_run_fill_delay_ms = 10_000; // long enough to cancel before it fills
    let (executor, _adapter) = executor(config, &endpoint);

    let request = base_request(&endpoint);
    let executor_clone = Arc::clone(&executor);
    let submit_task = tokio::spawn(async move { executor_clone.submit(request).await });

    tokio::time::sleep(Duration::from_millis(10)).await;
    let client_id = executor.active_orders().first().expect("order registered").client_id;

    assert!(executor.cancel(client_id).await);
    assert!(!executor.cancel(client_id).await);

    let result = submit_task.await.unwrap();
    assert_eq!(result.order.state, OrderState::Canceled);
}
