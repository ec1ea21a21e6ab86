//! Target-specific compilation passes.
//!
//! These passes require target hardware properties from the PropertySet
//! (coupling map, basis gates, layout, durations) and produce
//! hardware-compatible circuits for specific quantum devices.

pub mod layout;
pub mod routing;
pub mod sabre;
pub mod scheduling;
pub mod translation;
pub mod vf2;

pub use layout::{ApplyLayout, DenseLayout, Layout2qDistance, SetLayout, TrivialLayout};
pub use routing::{BasicSwap, CheckMap, RequireSwapMapped};
pub use sabre::{SabreConfig, SabreLayout, SabreSwap};
pub use scheduling::{
    DurationEntry, DurationSource, InstructionDurations, PadDelay, ScheduleAnalysis,
    SchedulePolicy,
};
pub use translation::{BasisTranslator, GatesInBasis, Unroll3qOrMore};
pub use vf2::{VF2Layout, VF2PostLayout, Vf2Limits};
