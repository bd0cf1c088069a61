use exc_core::Order;
use serde::{Deserialize, Serialize};

/// Events emitted by the Smart Order Executor. Every variant carries the
/// order snapshot at the moment of emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SoeEvent {
    OrderSubmitted(Order),
    OrderFilled(Order),
    OrderCanceled(Order),
    OrderResubmitting(Order),
    OrderFailed { order: Order, error: String },
}

/// Outcome of a `submit` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub order: Order,
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn ok(order: Order) -> Self {
        Self {
            success: true,
            order,
            error: None,
        }
    }

    pub fn failed(order: Order, error: impl Into<String>) -> Self {
        Self {
            success: false,
            order,
            error: Some(error.into()),
        }
    }
}
