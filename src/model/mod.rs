//! Shared data model: accounts, instruments, the pending-order →
//! order/contract lifecycle, sessions, audit log entries, and transaction
//! records.

pub mod account;
pub mod audit;
pub mod contract;
pub mod instrument;
pub mod order;
pub mod pending_order;
pub mod session;
pub mod transaction;

pub use account::{Account, AccountKind, AccountStatus, Balance};
pub use contract::{Contract, ContractStatus, PositionSide};
pub use instrument::{Instrument, InstrumentKind};
pub use order::{ExecutionStrategy, Order};
pub use pending_order::{ExecutionType, PendingOrder, PendingOrderStatus, ProductType, Side};
pub use transaction::{Transaction, TransactionKind};
