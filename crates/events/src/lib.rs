//! Domain event contracts shared by every catalog aggregate.

pub mod envelope;
pub mod event;

pub use envelope::EventEnvelope;
pub use event::Event;
