//! Notification routing, digesting and delivery.

pub mod cooldown;
pub mod delivery;
pub mod digest;
pub mod dispatcher;
pub mod formatter;
pub mod scheduler;
pub mod store;

pub use cooldown::CooldownGate;
pub use delivery::{ChannelClient, DeliveryClient};
pub use digest::{DigestAggregator, DigestBatch, OfferOutcome};
pub use dispatcher::{IntakeDecision, NotificationDispatcher};
pub use formatter::{Formatter, PlainTextFormatter};
pub use scheduler::DigestScheduler;
pub use store::{FailureStore, InMemoryFailureStore};
