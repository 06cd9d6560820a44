//! # Courier Realtime Crate
//!
//! The live side of the messaging core: the room fan-out router that
//! multiplexes connections into thread-scoped broadcast groups, the typed
//! server→client event set, and the self-clearing typing signaler.
//!
//! The router implements `courier_messaging::EventSink`, so the durable
//! services hand their events over without knowing about transports.

pub mod events;
pub mod router;
pub mod typing;

pub use events::ServerEvent;
pub use router::{ConnectionId, RoomRouter};
pub use typing::TypingSignaler;
