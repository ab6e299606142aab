// src/store/mod.rs

//! In-memory state of one flow run.
//!
//! - [`state_store`] holds one [`TaskRunRecord`] per task plus the ordered
//!   transition log.
//! - [`observer`] fans transition events out to subscribers.

pub mod observer;
pub mod state_store;

pub use observer::Observers;
pub use state_store::{StateStore, TaskRunRecord, TransitionEvent, TransitionOutcome};
pub(crate) use state_store::Transition;
