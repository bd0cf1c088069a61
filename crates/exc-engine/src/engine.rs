use std::sync::Arc;

use exc_account::AccountLockManager;
use exc_core::{EndpointId, ExchangeAdapter, Price};
use exc_executor::{SmartOrderExecutor, SoeEvent};
use exc_failover::FailoverController;
use exc_nonce::NonceCoordinator;
use exc_quality::{ExecutionQualityMonitor, FinalStatus};
use exc_ratelimit::RateLimitController;
use exc_reconciler::{SrEvent, StateReconciler};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// Wires the Smart Order Executor, Exchange Failover Controller, State
/// Reconciler, and Execution Quality Monitor around one adapter registry.
/// Each component still owns its own state and event bus; this struct only
/// holds the `Arc`s and starts/stops the background loops together.
pub struct Engine {
    pub executor: Arc<SmartOrderExecutor>,
    pub failover: Arc<FailoverController>,
    pub reconciler: Arc<StateReconciler>,
    pub quality: Arc<ExecutionQualityMonitor>,
    pub account_lock: Arc<AccountLockManager>,
    endpoints: Vec<EndpointId>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Build every component from `config` and register `adapters` (keyed
    /// by the `id` field of `config.endpoints`) with the executor, the
    /// failover controller, and the reconciler alike.
    pub fn new(config: &EngineConfig, adapters: Vec<(String, Arc<dyn ExchangeAdapter>)>) -> EngineResult<Self> {
        if config.endpoints.is_empty() {
            return Err(EngineError::NoEndpoints);
        }

        let account_lock = Arc::new(AccountLockManager::new(config.account_lock_config()));
        let rate_limiter = Arc::new(RateLimitController::new(config.rate_limit_config()));
        let nonce = Arc::new(NonceCoordinator::new());
        let failover = Arc::new(FailoverController::new(config.efc.clone()));
        let executor = Arc::new(SmartOrderExecutor::new(
            config.soe.clone(),
            Arc::clone(&account_lock),
            Arc::clone(&rate_limiter),
            Arc::clone(&nonce),
            Arc::clone(&failover) as Arc<dyn exc_executor::EndpointSelector>,
        ));
        let reconciler = Arc::new(StateReconciler::new(config.sr.clone()));
        let quality = Arc::new(ExecutionQualityMonitor::new(config.eqm.clone()));

        let mut endpoints = Vec::with_capacity(config.endpoints.len());
        for endpoint in &config.endpoints {
            let (_, adapter) = adapters
                .iter()
                .find(|(id, _)| id == &endpoint.id)
                .ok_or_else(|| EngineError::UnknownEndpoint(endpoint.id.clone()))?;
            let endpoint_id = EndpointId::from(endpoint.id.as_str());

            failover.register(endpoint_id.clone(), Arc::clone(adapter), endpoint.priority, endpoint.is_primary);
            executor.register_adapter(endpoint_id.clone(), Arc::clone(adapter));
            reconciler.register_adapter(endpoint_id.clone(), Arc::clone(adapter));
            endpoints.push(endpoint_id);
        }

        info!(endpoints = endpoints.len(), "execution core wired");

        Ok(Self { executor, failover, reconciler, quality, account_lock, endpoints })
    }

    #[must_use]
    pub fn endpoints(&self) -> &[EndpointId] {
        &self.endpoints
    }

    /// Spawn every component's background loop as a detached task. Returns
    /// the join handles so the caller can await a clean shutdown.
    pub fn spawn_background_loops(&self) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        handles.push(tokio::spawn(Arc::clone(&self.failover).run_probe_loop()));

        for endpoint_id in &self.endpoints {
            let reconciler = Arc::clone(&self.reconciler);
            let id = endpoint_id.clone();
            handles.push(tokio::spawn(async move { reconciler.run_sync_loop(id).await }));

            let reconciler = Arc::clone(&self.reconciler);
            let id = endpoint_id.clone();
            handles.push(tokio::spawn(async move { reconciler.run_heartbeat_loop(id).await }));
        }

        handles.push(tokio::spawn(Arc::clone(&self.quality).run_aggregation_loop()));
        handles.push(self.account_lock.spawn_idle_reaper(std::time::Duration::from_secs(300)));

        handles.push(tokio::spawn(forward_executor_events_to_quality(
            self.executor.subscribe(),
            Arc::clone(&self.quality),
        )));
        handles.push(tokio::spawn(log_reconciler_repairs(self.reconciler.subscribe())));

        handles
    }

    pub fn stop(&self) {
        self.failover.stop();
        self.reconciler.stop();
        self.quality.stop();
        self.account_lock.stop();
    }
}

/// Drives the Execution Quality Monitor purely from executor events: a
/// caller never has to mirror `submit`/fill bookkeeping into `quality`
/// itself, since `start_tracking`/`update_fill`/`complete_tracking` all
/// happen here as `SoeEvent`s arrive.
async fn forward_executor_events_to_quality(
    mut events: tokio::sync::broadcast::Receiver<SoeEvent>,
    quality: Arc<ExecutionQualityMonitor>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Closed) => return,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "quality event forwarder dropped executor events under load");
                continue;
            }
        };

        match event {
            SoeEvent::OrderSubmitted(order) => {
                quality.start_tracking(
                    order.client_id,
                    order.symbol,
                    order.side,
                    order.endpoint_id,
                    order.account_id,
                    order.original_price,
                    order.requested_amount,
                );
            }
            SoeEvent::OrderFilled(order) => {
                quality.update_fill(&order.client_id, order.avg_fill_price, order.filled_amount, Price::ZERO);
                quality.complete_tracking(&order.client_id, FinalStatus::Filled);
            }
            SoeEvent::OrderCanceled(order) => {
                quality.update_fill(&order.client_id, order.avg_fill_price, order.filled_amount, Price::ZERO);
                quality.complete_tracking(&order.client_id, FinalStatus::Canceled);
            }
            SoeEvent::OrderFailed { order, .. } => {
                quality.complete_tracking(&order.client_id, FinalStatus::Failed);
            }
            SoeEvent::OrderResubmitting(_) => {}
        }
    }
}

/// Logs repair outcomes from the reconciler's event bus through the shared
/// `tracing` subscriber `exc-telemetry::init_logging` configures. The
/// reconciler itself already records the `Metrics::repair` counter at the
/// point of repair; this task is the engine's own observability surface
/// onto the same events.
async fn log_reconciler_repairs(mut events: tokio::sync::broadcast::Receiver<SrEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Closed) => return,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "repair logging forwarder dropped reconciler events under load");
                continue;
            }
        };

        if let SrEvent::RepairApplied(outcome) = event {
            if outcome.success {
                info!(description = %outcome.description, attempt = outcome.attempt, "state reconciler repair applied");
            } else {
                warn!(description = %outcome.description, attempt = outcome.attempt, "state reconciler repair attempt failed");
            }
        }
    }
}
