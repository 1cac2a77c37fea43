//! feedwatch domain crate
//!
//! This crate contains the change-detection and notification engine following
//! hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `ports`: Trait definitions for external collaborators (adapters)
//! - `dedup`: Bounded per-subscriber history of notified identifiers
//! - `delta`: Snapshot comparison strategies
//! - `usecases`: Classification, rendering, batching, onboarding and the run
//!   coordinator

pub mod dedup;
pub mod delta;
pub mod model;
pub mod ports;
pub mod usecases;

pub use dedup::DedupHistory;
pub use delta::{Delta, DeltaError, DeltaMode, DeltaStrategy};
pub use model::*;
pub use ports::*;
