//! Order model and lifecycle state machine.

pub mod lifecycle;
pub mod order;

pub use lifecycle::{CheckOutcome, LifecyclePolicy, OrderLifecycle};
pub use order::{ClosedTrade, CloseStatus, LifecycleError, Order, OrderStatus};
