//! Shared types for the messaging domain.

pub mod errors;
pub mod events;

pub use errors::{MessagingError, MessagingResult};
pub use events::{DeliveryReceipt, EventSink, NullEventSink};
