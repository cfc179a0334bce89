//! Ports (Driven Adapters' Interfaces)
//!
//! Interfaces the engine consumes. Persistence, trade updates, and
//! notification delivery live behind these traits; the engine only sees the
//! data shapes it needs and never the mechanics.

mod notifier_port;
mod position_repository_port;
mod trade_update_port;

pub use notifier_port::{NotifierPort, NotifyError};
pub use position_repository_port::{PositionRepositoryPort, RepositoryError};
pub use trade_update_port::{TradeUpdateError, TradeUpdatePort};
