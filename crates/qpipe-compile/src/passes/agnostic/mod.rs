//! Target-agnostic compilation passes.
//!
//! These passes operate purely on the DAG structure without consulting
//! target-specific properties (coupling map, basis gates). They are safe
//! to run on any circuit regardless of the target hardware.

pub mod optimization;

pub use optimization::{
    InverseCancellation, MergeAdjacentBarriers, MergeRotations, RemoveDiagonalGatesBeforeMeasure,
    RemoveResetInZeroState,
};
