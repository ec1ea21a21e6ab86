//! Built-in compilation passes.
//!
//! Passes are organized into two categories:
//! - [`agnostic`]: Target-agnostic passes that operate purely on DAG structure
//! - [`target`]: Target-specific passes that require hardware properties

pub mod agnostic;
pub mod target;

pub use agnostic::{
    InverseCancellation, MergeAdjacentBarriers, MergeRotations, RemoveDiagonalGatesBeforeMeasure,
    RemoveResetInZeroState,
};
pub use target::{
    ApplyLayout, BasicSwap, BasisTranslator, CheckMap, DenseLayout, DurationEntry, DurationSource,
    GatesInBasis, InstructionDurations, Layout2qDistance, PadDelay, RequireSwapMapped,
    SabreConfig, SabreLayout, SabreSwap, ScheduleAnalysis, SchedulePolicy, SetLayout,
    TrivialLayout, Unroll3qOrMore, VF2Layout, VF2PostLayout, Vf2Limits,
};
