// src/build/mod.rs

//! Build execution behind the system-wide single-build slot.

pub mod executor;
pub mod slot;

pub use executor::{BuildExecutor, ExecuteOutcome, LiveBuild};
pub use slot::BuildSlot;
