//! Repository implementations for data access.

pub mod message_repository;
pub mod participant_repository;
pub mod thread_repository;

pub use message_repository::{MessageRepository, ReadOutcome};
pub use participant_repository::ParticipantRepository;
pub use thread_repository::ThreadRepository;
