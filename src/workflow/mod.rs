//! Draft/finalize record submission for attendance days and class tests.
//!
//! A submission context moves `not_started -> draft -> finalized` and never
//! back. Rows are upserted per student while in draft; finalization freezes
//! them and records a tally.

pub mod access;
pub mod draft;
pub mod editor;
pub mod error;
pub mod finalize;
pub mod model;
pub mod roster;
pub mod status;
pub mod tally;

#[cfg(test)]
mod testutil;

pub use access::ActorContext;
pub use error::WorkflowError;
