// src/dag/mod.rs

//! DAG representation and scheduling.
//!
//! - [`graph`] holds the immutable [`DependencyGraph`] and its layering.
//! - [`builder`] builds graphs, explicitly or by tracing a flow recipe.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   tasks are ready to run and which must be skipped.
//! - [`scheduler_step`] defines the result type for scheduler steps.

pub mod builder;
pub mod graph;
pub mod scheduler;
pub mod scheduler_step;

pub use builder::{Binding, GraphBuilder, Tracer};
pub use graph::{DagNode, DependencyGraph, Layers, NodeId};
pub use scheduler::{ScheduleState, Scheduler};
pub use scheduler_step::SchedulerStep;
