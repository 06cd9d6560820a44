//! Domain services.

pub mod message_service;
pub mod sync_service;
pub mod thread_service;

pub use message_service::MessageService;
pub use sync_service::{SyncBatch, SyncCursor, SyncService};
pub use thread_service::ThreadService;
