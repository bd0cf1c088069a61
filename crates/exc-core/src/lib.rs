//! Core domain types for the execution core.
//!
//! This crate provides the fundamental types shared by every other crate in
//! the workspace:
//! - `Order`, `OrderState`, `Side`, `OrderType`: the order lifecycle model
//! - `ExchangeAdapter`: the capability-typed handle to an exchange endpoint
//! - `ErrorKind`/`classify`: the shared error taxonomy
//! - `EventBus`: the pub/sub primitive used by every component's event surface

pub mod adapter;
pub mod error;
pub mod events;
pub mod order;
pub mod types;

pub use adapter::{
    AdapterCapabilities, BalanceSnapshot, CreateOrderParams, ExchangeAdapter, OpenOrder, OrderAck,
    OrderStatusSnapshot, PositionSnapshot, RemoteOrderStatus, Ticker, TradeFill,
};
pub use error::{classify, extract_server_time_ms, AdapterError, ErrorKind};
pub use events::EventBus;
pub use order::{Order, OrderFlags, OrderState, OrderType, Side};
pub use types::{AccountId, Amount, ClientId, Currency, EndpointId, Price, RemoteId, Symbol};
