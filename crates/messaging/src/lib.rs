//! # Courier Messaging Crate
//!
//! Core business logic for the Courier messaging system: thread identity,
//! the durable message store, the sent → delivered → read delivery state
//! machine and the reconnect/backfill protocol.
//!
//! ## Architecture
//!
//! - **Services**: `ThreadService` (registry), `MessageService` (store +
//!   delivery state machine), `SyncService` (reconnect backfill)
//! - **Types**: error taxonomy and the `EventSink` seam toward the
//!   realtime fan-out layer
//! - **Utils**: content validation

pub mod services;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use services::{MessageService, SyncBatch, SyncCursor, SyncService, ThreadService};
pub use types::{DeliveryReceipt, EventSink, MessagingError, MessagingResult, NullEventSink};
