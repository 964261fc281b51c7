//! Orders and their payment lifecycle
//!
//! ```text
//! pending ──▶ paid ──▶ shipped ──▶ delivered
//!    │          │
//!    ├──────────┴──▶ refunded
//!    └──────────┴──▶ cancelled
//! ```

pub mod model;
pub mod store;
pub mod sync;

pub use model::{
    Address, Customer, Order, OrderItem, Parcel, PaymentStatus, ShipmentRef, StatusChange,
    Transition,
};
pub use store::{InMemoryOrderStore, OrderStore};
pub use sync::{OrderSync, SyncOutcome};
