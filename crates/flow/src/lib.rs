//! Dataflow analyses and transforms for nacre routines.
//!
//! The source language has value semantics: lowering wraps the right-hand
//! side of most assignments in an explicit copy node. This crate provides the
//! generic forward fixpoint [`engine`], the [`analysis`] that proves copy
//! nodes unnecessary, and the [`transform`] that deletes them.

pub mod analysis;
pub mod engine;
pub mod transform;

pub use engine::{FlowError, ForwardAnalysis};
