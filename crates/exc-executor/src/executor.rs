use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use exc_account::AccountLockManager;
use exc_core::{
    classify, AccountId, Amount, ClientId, CreateOrderParams, EndpointId, EventBus, ExchangeAdapter,
    Order, OrderFlags, OrderState, OrderType, Price, RemoteOrderStatus, Side, Symbol,
};
use exc_nonce::NonceCoordinator;
use exc_ratelimit::RateLimitController;
use exc_telemetry::Metrics;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::config::SoeConfig;
use crate::dry_run;
use crate::endpoint::EndpointSelector;
use crate::events::{ExecutionResult, SoeEvent};
use crate::reprice;
use crate::retry::{action_for, RetryAction};
use crate::stats::{Stats, StatsSnapshot};

/// Caller-facing order submission request.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub account_id: AccountId,
    pub endpoint_id: Option<EndpointId>,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub amount: Amount,
    pub price: Price,
    pub flags: OrderFlags,
}

/// Bumps the resubmit counter and reports whether the order is still within
/// `max_resubmit_attempts`. On exhaustion the caller is responsible for
/// transitioning the order to `Failed`.
fn record_resubmit_or_exhaust(order: &mut Order, max_resubmit_attempts: u32) -> bool {
    order.resubmit_count += 1;
    order.resubmit_count <= max_resubmit_attempts
}

fn build_params(order: &Order, cfg: &SoeConfig) -> CreateOrderParams {
    let post_only = order.flags.post_only
        || (cfg.default_post_only && !matches!(order.order_type, OrderType::Market));
    let time_in_force = match order.order_type {
        OrderType::Ioc => Some("IOC".to_string()),
        OrderType::Fok => Some("FOK".to_string()),
        _ if post_only => Some("PO".to_string()),
        _ => None,
    };
    CreateOrderParams {
        symbol: order.symbol.clone(),
        order_type: order.order_type,
        side: order.side,
        amount: order.remaining_amount,
        price: if matches!(order.order_type, OrderType::Market) {
            None
        } else {
            Some(order.current_price)
        },
        client_order_id: order.client_id.to_string(),
        post_only,
        reduce_only: order.flags.reduce_only,
        time_in_force,
    }
}

/// Smart Order Executor: per-account serialized, globally bounded order
/// submission with automatic cancel-and-reprice, retry classification, and
/// dry-run shadowing.
pub struct SmartOrderExecutor {
    config: SoeConfig,
    adapters: DashMap<EndpointId, Arc<dyn ExchangeAdapter>>,
    account_lock: Arc<AccountLockManager>,
    rate_limiter: Arc<RateLimitController>,
    nonce: Arc<NonceCoordinator>,
    selector: Arc<dyn EndpointSelector>,
    active_orders: DashMap<ClientId, Order>,
    cancel_signals: DashMap<ClientId, Arc<Notify>>,
    /// Cumulative filled amount carried over from legs abandoned by a
    /// reprice. A repriced order submits a brand-new remote order that
    /// starts its own fill count at zero, so the absolute total passed to
    /// `Order::apply_fill` must add this baseline back in or a reprice
    /// would silently erase fills already locked in on the previous leg.
    leg_baseline: DashMap<ClientId, Amount>,
    events: EventBus<SoeEvent>,
    stats: Stats,
}

impl SmartOrderExecutor {
    #[must_use]
    pub fn new(
        config: SoeConfig,
        account_lock: Arc<AccountLockManager>,
        rate_limiter: Arc<RateLimitController>,
        nonce: Arc<NonceCoordinator>,
        selector: Arc<dyn EndpointSelector>,
    ) -> Self {
        Self {
            config,
            adapters: DashMap::new(),
            account_lock,
            rate_limiter,
            nonce,
            selector,
            active_orders: DashMap::new(),
            cancel_signals: DashMap::new(),
            leg_baseline: DashMap::new(),
            events: EventBus::new(),
            stats: Stats::default(),
        }
    }

    pub fn register_adapter(&self, endpoint_id: EndpointId, adapter: Arc<dyn ExchangeAdapter>) {
        self.adapters.insert(endpoint_id, adapter);
    }

    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SoeEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn active_orders(&self) -> Vec<Order> {
        self.active_orders.iter().map(|e| e.value().clone()).collect()
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn cancel_signal_for(&self, client_id: &ClientId) -> Arc<Notify> {
        self.cancel_signals
            .entry(*client_id)
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    fn leg_baseline(&self, client_id: &ClientId) -> Amount {
        self.leg_baseline.get(client_id).map(|a| *a).unwrap_or(Amount::ZERO)
    }

    fn emit(&self, event: SoeEvent) {
        Self::record_metrics(&event);
        self.events.emit(event);
    }

    fn record_metrics(event: &SoeEvent) {
        match event {
            SoeEvent::OrderSubmitted(order) => Metrics::order_submitted(&order.endpoint_id.0, &order.symbol.0),
            SoeEvent::OrderFilled(order) => Metrics::order_completed(&order.endpoint_id.0, "filled"),
            SoeEvent::OrderCanceled(order) => Metrics::order_completed(&order.endpoint_id.0, "canceled"),
            SoeEvent::OrderResubmitting(order) => Metrics::reprice(&order.endpoint_id.0, &order.symbol.0),
            SoeEvent::OrderFailed { order, .. } => Metrics::order_completed(&order.endpoint_id.0, "failed"),
        }
    }

    /// Unified entry point: creates the order, serializes it through the
    /// account lock, and drives it to a terminal state or the completion
    /// wait ceiling, whichever comes first.
    pub async fn submit(self: &Arc<Self>, request: SubmitRequest) -> ExecutionResult {
        let endpoint_id = match request.endpoint_id.clone().or_else(|| self.selector.primary()) {
            Some(id) => id,
            None => {
                let order = Order::new(
                    EndpointId::from(""),
                    request.account_id,
                    request.symbol,
                    request.side,
                    request.order_type,
                    request.amount,
                    request.price,
                    request.flags,
                    Utc::now(),
                );
                return ExecutionResult::failed(order, "no endpoint available");
            }
        };

        let order = Order::new(
            endpoint_id,
            request.account_id.clone(),
            request.symbol,
            request.side,
            request.order_type,
            request.amount,
            request.price,
            request.flags,
            Utc::now(),
        );
        let client_id = order.client_id;
        self.active_orders.insert(client_id, order.clone());

        let this = Arc::clone(self);
        let account_id = request.account_id;
        let lock_result = self
            .account_lock
            .run_on_account(account_id, move || async move {
                let ceiling = this.config.completion_wait_ceiling();
                let _ = tokio::time::timeout(ceiling, this.drive(client_id)).await;
                Ok::<(), std::convert::Infallible>(())
            })
            .await;

        self.cancel_signals.remove(&client_id);
        self.leg_baseline.remove(&client_id);
        let final_order = self
            .active_orders
            .remove(&client_id)
            .map(|(_, order)| order)
            .unwrap_or(order);

        match lock_result {
            Ok(()) => {
                let success = !matches!(
                    final_order.state,
                    OrderState::Failed | OrderState::Rejected
                );
                if success {
                    ExecutionResult::ok(final_order)
                } else {
                    let error = final_order
                        .last_error
                        .clone()
                        .unwrap_or_else(|| "submission failed".to_string());
                    ExecutionResult::failed(final_order, error)
                }
            }
            Err(account_err) => ExecutionResult::failed(final_order, account_err.to_string()),
        }
    }

    /// Drives one order from Pending to a terminal state (or until an
    /// external cancel / the completion-wait ceiling cuts it short).
    /// Mutates `self.active_orders[client_id]` throughout so readers always
    /// observe the live snapshot, including if the ceiling fires mid-flight.
    async fn drive(self: Arc<Self>, client_id: ClientId) {
        if self.config.dry_run {
            self.run_dry_run(client_id).await;
            return;
        }

        loop {
            if self.is_canceled(&client_id) {
                return;
            }

            let (endpoint_id, params) = {
                let order = match self.active_orders.get(&client_id) {
                    Some(o) => o.clone(),
                    None => return,
                };
                (order.endpoint_id.clone(), build_params(&order, &self.config))
            };

            let adapter = match self.adapters.get(&endpoint_id) {
                Some(a) => Arc::clone(a.value()),
                None => {
                    self.fail(&client_id, "no adapter registered for endpoint");
                    return;
                }
            };

            if self.interruptible(&client_id, self.rate_limiter.wait_if_limited(&endpoint_id)).await {
                return;
            }

            // Nonce is issued so ordering through this endpoint is reflected
            // even though the vendor signing itself happens inside the
            // adapter; the executor issues it as part of serializing
            // creation attempts per endpoint.
            let _nonce = self.nonce.next(&endpoint_id);

            match adapter.create_order(params).await {
                Ok(ack) => {
                    self.rate_limiter.clear(&endpoint_id);
                    let is_market = self
                        .active_orders
                        .get(&client_id)
                        .map(|o| matches!(o.order_type, OrderType::Market))
                        .unwrap_or(false);

                    let baseline = self.leg_baseline(&client_id);
                    if let Some(mut order) = self.active_orders.get_mut(&client_id) {
                        order.remote_id = Some(ack.remote_id.clone());
                        order.transition(OrderState::Submitted, Utc::now());
                        let price = ack.average.unwrap_or(order.current_price);
                        order.apply_fill(baseline + ack.filled, price, Utc::now());
                    }
                    self.stats.record_submitted();
                    self.emit_snapshot(&client_id, SoeEvent::OrderSubmitted);

                    if is_market {
                        self.finish_filled(&client_id);
                        return;
                    }

                    if self.run_stall_cycles(&client_id, adapter.as_ref()).await {
                        return;
                    }
                    // stall cycle asked for another submission attempt.
                }
                Err(adapter_err) => {
                    let kind = classify(&adapter_err);
                    match action_for(kind) {
                        RetryAction::Fatal => {
                            self.fail(&client_id, adapter_err.message);
                            return;
                        }
                        RetryAction::WaitRateLimit => {
                            self.rate_limiter.record_limited(&endpoint_id);
                            self.stats.record_rate_limit_hit();
                            if !self.bump_resubmit(&client_id) {
                                self.fail(&client_id, "max_resubmits");
                                return;
                            }
                        }
                        RetryAction::WaitNonce => {
                            self.nonce.handle_drift_error(&endpoint_id, &adapter_err.message);
                            if self
                                .interruptible(&client_id, tokio::time::sleep(self.config.nonce_retry_delay()))
                                .await
                            {
                                return;
                            }
                            if !self.bump_resubmit(&client_id) {
                                self.fail(&client_id, "max_resubmits");
                                return;
                            }
                        }
                        RetryAction::RetryWithinCap => {
                            if !self.bump_resubmit(&client_id) {
                                self.fail(&client_id, "max_resubmits");
                                return;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Runs the stall-monitor cycle until the order either reaches a
    /// terminal state (returns `true`) or needs another submission attempt
    /// at a new price (returns `false`).
    async fn run_stall_cycles(&self, client_id: &ClientId, adapter: &dyn ExchangeAdapter) -> bool {
        loop {
            if self
                .interruptible(client_id, tokio::time::sleep(self.config.unfill_timeout()))
                .await
            {
                return true;
            }

            let (remote_id, symbol, side, post_only, current_price, requested, dust_tolerance) = {
                let order = match self.active_orders.get(client_id) {
                    Some(o) => o.clone(),
                    None => return true,
                };
                match order.remote_id.clone() {
                    Some(remote_id) => (
                        remote_id,
                        order.symbol.clone(),
                        order.side,
                        order.flags.post_only,
                        order.current_price,
                        order.requested_amount,
                        self.config.dust_tolerance,
                    ),
                    None => return true,
                }
            };

            let status = adapter.fetch_order(&remote_id, &symbol).await;
            let status = match status {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "fetch_order failed during stall check, treating as unfilled");
                    // fall through to the cancel+reprice branch below by
                    // synthesizing a zero-fill snapshot.
                    exc_core::OrderStatusSnapshot {
                        remote_id: remote_id.clone(),
                        status: RemoteOrderStatus::Open,
                        filled: Amount::ZERO,
                        amount: requested,
                        average: None,
                    }
                }
            };

            let baseline = self.leg_baseline(client_id);
            let closed = matches!(status.status, RemoteOrderStatus::Closed) || status.filled >= status.amount;
            if closed {
                if let Some(mut order) = self.active_orders.get_mut(client_id) {
                    order.apply_fill(baseline + status.filled, status.average.unwrap_or(current_price), Utc::now());
                }
                self.finish_filled(client_id);
                return true;
            }

            if !status.filled.is_zero() {
                if let Some(mut order) = self.active_orders.get_mut(client_id) {
                    order.apply_fill(baseline + status.filled, status.average.unwrap_or(current_price), Utc::now());
                    if order.dust_tolerance_met(dust_tolerance) {
                        drop(order);
                        self.finish_filled(client_id);
                        return true;
                    }
                    order.requested_amount = order.remaining_amount;
                }
                // Partial, outside dust tolerance: keep monitoring the same
                // remote order without canceling it.
                continue;
            }

            // Nothing filled on this leg: cancel it and reprice. The
            // baseline carried into the next leg is unchanged since this
            // leg contributed no new fill.
            if let Err(e) = adapter.cancel_order(&remote_id, &symbol).await {
                let message = e.message.to_lowercase();
                if !(message.contains("not found") || message.contains("already") || message.contains("filled")) {
                    warn!(error = %e, "cancel during reprice returned an unabsorbed error");
                }
            }

            let new_price = match adapter.fetch_ticker(&symbol).await {
                Ok(ticker) => reprice::reprice_from_ticker(side, post_only, ticker, self.config.maker_price_offset),
                Err(_) => reprice::reprice_fallback(current_price, side, self.config.price_slippage),
            };

            if !self.bump_resubmit(client_id) {
                self.fail(client_id, "max_resubmits");
                return true;
            }

            if let Some(mut order) = self.active_orders.get_mut(client_id) {
                order.current_price = new_price;
            }
            self.stats.record_resubmit();
            self.emit_snapshot(client_id, SoeEvent::OrderResubmitting);
            return false;
        }
    }

    async fn run_dry_run(&self, client_id: ClientId) {
        if self.interruptible(&client_id, tokio::time::sleep(self.config.dry_run_fill_delay())).await {
            return;
        }
        let Some(mut order) = self.active_orders.get_mut(&client_id) else {
            return;
        };
        let fill_price = dry_run::simulated_fill_price(order.current_price, order.side, self.config.dry_run_slippage);
        order.remote_id = Some(dry_run::synthetic_remote_id(&order.client_id));
        order.transition(OrderState::Submitted, Utc::now());
        let requested_amount = order.requested_amount;
        order.apply_fill(requested_amount, fill_price, Utc::now());
        order.transition(OrderState::Filled, Utc::now());
        drop(order);
        self.stats.record_submitted();
        self.stats.record_filled();
        self.emit_snapshot(&client_id, SoeEvent::OrderFilled);
    }

    fn bump_resubmit(&self, client_id: &ClientId) -> bool {
        let Some(mut order) = self.active_orders.get_mut(client_id) else {
            return false;
        };
        record_resubmit_or_exhaust(&mut order, self.config.max_resubmit_attempts)
    }

    fn finish_filled(&self, client_id: &ClientId) {
        if let Some(mut order) = self.active_orders.get_mut(client_id) {
            order.transition(OrderState::Filled, Utc::now());
        }
        self.stats.record_filled();
        self.emit_snapshot(client_id, SoeEvent::OrderFilled);
    }

    fn fail(&self, client_id: &ClientId, error: impl Into<String>) {
        let error = error.into();
        if let Some(mut order) = self.active_orders.get_mut(client_id) {
            order.last_error = Some(error.clone());
            order.transition(OrderState::Failed, Utc::now());
        }
        self.stats.record_failed();
        if let Some(order) = self.active_orders.get(client_id) {
            self.emit(SoeEvent::OrderFailed {
                order: order.clone(),
                error,
            });
        }
    }

    fn emit_snapshot(&self, client_id: &ClientId, make_event: fn(Order) -> SoeEvent) {
        if let Some(order) = self.active_orders.get(client_id) {
            self.emit(make_event(order.clone()));
        }
    }

    fn is_canceled(&self, client_id: &ClientId) -> bool {
        self.active_orders
            .get(client_id)
            .map(|o| o.state.is_terminal())
            .unwrap_or(true)
    }

    /// Race `fut` against this order's cancel signal. Returns `true` if the
    /// cancel fired first.
    async fn interruptible<F: std::future::Future<Output = ()>>(&self, client_id: &ClientId, fut: F) -> bool {
        let notify = self.cancel_signal_for(client_id);
        tokio::select! {
            () = fut => false,
            () = notify.notified() => true,
        }
    }

    /// Caller-driven cancel. Idempotent: the first call against an active
    /// order transitions it to `Canceled` and returns `true`; a second call
    /// against an already-terminal order is a no-op returning `false`.
    pub async fn cancel(&self, client_id: ClientId) -> bool {
        let (remote_id, endpoint_id, symbol) = {
            let Some(mut order) = self.active_orders.get_mut(&client_id) else {
                return false;
            };
            if order.state.is_terminal() {
                return false;
            }
            order.transition(OrderState::Canceled, Utc::now());
            (order.remote_id.clone(), order.endpoint_id.clone(), order.symbol.clone())
        };

        if let (Some(remote_id), Some(adapter)) = (remote_id, self.adapters.get(&endpoint_id)) {
            if let Err(e) = adapter.cancel_order(&remote_id, &symbol).await {
                info!(error = %e, "remote cancel returned an error, treating as already resolved");
            }
        }

        if let Some(notify) = self.cancel_signals.get(&client_id) {
            notify.notify_one();
        }
        self.stats.record_canceled();
        self.emit_snapshot(&client_id, SoeEvent::OrderCanceled);
        true
    }

    /// Cancel every active order matching the optional endpoint/symbol
    /// filter. Returns the number canceled.
    pub async fn cancel_all(&self, endpoint: Option<&EndpointId>, symbol: Option<&Symbol>) -> usize {
        let targets: Vec<ClientId> = self
            .active_orders
            .iter()
            .filter(|e| {
                endpoint.map_or(true, |ep| &e.value().endpoint_id == ep)
                    && symbol.map_or(true, |s| &e.value().symbol == s)
                    && !e.value().state.is_terminal()
            })
            .map(|e| *e.key())
            .collect();

        let mut count = 0;
        for client_id in targets {
            if self.cancel(client_id).await {
                count += 1;
            }
        }
        count
    }

    /// Best-effort execution across endpoints: try the primary, and on
    /// exhausting its retries move to the next healthy endpoint excluding
    /// ones already tried, resetting the inner retry counter each time.
    pub async fn execute_with_retry(self: &Arc<Self>, mut request: SubmitRequest) -> ExecutionResult {
        let mut tried = Vec::new();
        let mut last_result = None;
        loop {
            let endpoint = match request
                .endpoint_id
                .clone()
                .filter(|e| !tried.contains(e))
                .or_else(|| self.selector.next_healthy(&tried))
            {
                Some(e) => e,
                None => {
                    return last_result.unwrap_or_else(|| {
                        let order = Order::new(
                            EndpointId::from(""),
                            request.account_id.clone(),
                            request.symbol.clone(),
                            request.side,
                            request.order_type,
                            request.amount,
                            request.price,
                            request.flags,
                            Utc::now(),
                        );
                        ExecutionResult::failed(order, "no endpoints remaining")
                    });
                }
            };
            tried.push(endpoint.clone());
            request.endpoint_id = Some(endpoint);

            let result = self.submit(request.clone()).await;
            if result.success {
                return result;
            }
            last_result = Some(result);
        }
    }
}
