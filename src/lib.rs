//! Application restriction policy engine.
//!
//! Decides whether an application is currently blocked - individually,
//! through a schedule-bound group, or not at all while a temporary unlock is
//! active - and keeps persistent, size-bounded logs of blocking activity.
//! UI layers and system-event observers are external collaborators: they ask
//! the engine for decisions and feed it events, but own no policy state.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod policy;
pub mod schedule;
pub mod store;

pub use engine::{PolicyEngine, SessionStats};
pub use error::PolicyError;
pub use events::{BlockEvent, BoundedLog, CapturedNotification, DetailedSession};
pub use policy::{PolicyState, RestrictionGroup};
pub use schedule::Schedule;
pub use store::{FileStore, KeyValueStore, MemoryStore};
