//! `PropertySet` and related types for pass communication.
//!
//! During compilation, passes share results through a [`PropertySet`]:
//! - **Layout passes** store the chosen [`Layout`] and where it came from
//! - **Routing passes** store the final permutation and the swap count
//! - **Analysis passes** store flags such as "all gates are in the basis"
//!
//! Values are a closed [`Property`] enum keyed by [`PropertyKey`], so a pass
//! can only publish results of a known kind. The device description
//! (coupling map and target) travels alongside as read-only fields.
//!
//! # Example
//!
//! ```
//! use qpipe_compile::{CouplingMap, Layout, LayoutSource, Property, PropertyKey, PropertySet};
//!
//! let mut props = PropertySet::new().with_coupling_map(CouplingMap::linear(5));
//! props.set_layout(Layout::trivial(5), LayoutSource::Trivial);
//!
//! assert!(props.contains(PropertyKey::Layout));
//! assert_eq!(props.layout_source(), Some(LayoutSource::Trivial));
//! assert!(matches!(
//!     props.get(PropertyKey::LayoutSource),
//!     Some(Property::LayoutSource(LayoutSource::Trivial))
//! ));
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use qpipe_ir::NodeIndex;

use crate::coupling::CouplingMap;
use crate::layout::Layout;
use crate::target::Target;

/// Which pass produced the current layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutSource {
    /// Identity placement.
    Trivial,
    /// Exact subgraph isomorphism.
    Vf2,
    /// Heuristic search-and-route.
    Sabre,
    /// Densest connected subset.
    Dense,
    /// User-provided initial layout.
    User,
}

/// Why `VF2Layout` stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vf2StopReason {
    /// A perfect layout was found.
    SolutionFound,
    /// The search finished or hit its call limit without a match.
    NoSolutionFound,
    /// The circuit has operations on more than two qubits.
    MoreThan2qInteractions,
}

/// Why `VF2PostLayout` stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vf2PostStopReason {
    /// A strictly better relabeling replaced the layout.
    SolutionFound,
    /// Matches existed but none beat the current score.
    NoBetterSolutionFound,
    /// No relabeling preserves the routed adjacency.
    NoSolutionFound,
    /// The circuit has operations on more than two qubits.
    MoreThan2qInteractions,
}

/// Keys of the values passes may publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKey {
    /// Current virtual-to-physical layout.
    Layout,
    /// Permutation applied by routing.
    FinalLayout,
    /// Two-qubit operations off the coupling map under the current layout.
    LayoutDistance,
    /// Pass that produced the layout.
    LayoutSource,
    /// `VF2Layout` outcome.
    Vf2Stop,
    /// `VF2PostLayout` outcome.
    Vf2PostStop,
    /// Whether every two-qubit operation sits on a coupling edge.
    IsSwapMapped,
    /// Whether every operation is in the target basis.
    AllGatesInBasis,
    /// Swaps inserted by routing.
    SwapCount,
    /// Start time per operation node.
    NodeStartTimes,
    /// Total scheduled duration.
    ScheduledDuration,
}

/// A value published by a pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    /// See [`PropertyKey::Layout`].
    Layout(Layout),
    /// See [`PropertyKey::FinalLayout`].
    FinalLayout(Layout),
    /// See [`PropertyKey::LayoutDistance`].
    LayoutDistance(usize),
    /// See [`PropertyKey::LayoutSource`].
    LayoutSource(LayoutSource),
    /// See [`PropertyKey::Vf2Stop`].
    Vf2Stop(Vf2StopReason),
    /// See [`PropertyKey::Vf2PostStop`].
    Vf2PostStop(Vf2PostStopReason),
    /// See [`PropertyKey::IsSwapMapped`].
    IsSwapMapped(bool),
    /// See [`PropertyKey::AllGatesInBasis`].
    AllGatesInBasis(bool),
    /// See [`PropertyKey::SwapCount`].
    SwapCount(usize),
    /// See [`PropertyKey::NodeStartTimes`].
    NodeStartTimes(BTreeMap<NodeIndex, u64>),
    /// See [`PropertyKey::ScheduledDuration`].
    ScheduledDuration(u64),
}

impl Property {
    /// Key under which this value is stored.
    pub fn key(&self) -> PropertyKey {
        match self {
            Property::Layout(_) => PropertyKey::Layout,
            Property::FinalLayout(_) => PropertyKey::FinalLayout,
            Property::LayoutDistance(_) => PropertyKey::LayoutDistance,
            Property::LayoutSource(_) => PropertyKey::LayoutSource,
            Property::Vf2Stop(_) => PropertyKey::Vf2Stop,
            Property::Vf2PostStop(_) => PropertyKey::Vf2PostStop,
            Property::IsSwapMapped(_) => PropertyKey::IsSwapMapped,
            Property::AllGatesInBasis(_) => PropertyKey::AllGatesInBasis,
            Property::SwapCount(_) => PropertyKey::SwapCount,
            Property::NodeStartTimes(_) => PropertyKey::NodeStartTimes,
            Property::ScheduledDuration(_) => PropertyKey::ScheduledDuration,
        }
    }
}

/// Properties shared between compilation passes.
///
/// | Field | Description |
/// |-------|-------------|
/// | `coupling_map` | Device connectivity; `None` means all-to-all |
/// | `target` | Device capability model, if one was supplied |
///
/// Everything else is stored as a [`Property`] and is created empty for
/// every pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PropertySet {
    /// Target coupling map defining allowed two-qubit interactions.
    pub coupling_map: Option<Arc<CouplingMap>>,

    /// Target capability model.
    pub target: Option<Arc<Target>>,

    values: BTreeMap<PropertyKey, Property>,
}

impl PropertySet {
    /// Create a new empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a coupling map.
    #[must_use]
    pub fn with_coupling_map(mut self, coupling_map: impl Into<Arc<CouplingMap>>) -> Self {
        self.coupling_map = Some(coupling_map.into());
        self
    }

    /// Attach a target.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<Arc<Target>>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Store a value, replacing any previous value of the same kind.
    pub fn insert(&mut self, value: Property) {
        self.values.insert(value.key(), value);
    }

    /// Look up a value.
    pub fn get(&self, key: PropertyKey) -> Option<&Property> {
        self.values.get(&key)
    }

    /// Remove a value.
    pub fn remove(&mut self, key: PropertyKey) -> Option<Property> {
        self.values.remove(&key)
    }

    /// Check whether a value is present.
    pub fn contains(&self, key: PropertyKey) -> bool {
        self.values.contains_key(&key)
    }

    /// Iterate over stored values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&PropertyKey, &Property)> {
        self.values.iter()
    }

    /// Replace the layout and record its origin.
    pub fn set_layout(&mut self, layout: Layout, source: LayoutSource) {
        self.insert(Property::Layout(layout));
        self.insert(Property::LayoutSource(source));
    }

    /// Current layout.
    pub fn layout(&self) -> Option<&Layout> {
        match self.get(PropertyKey::Layout) {
            Some(Property::Layout(layout)) => Some(layout),
            _ => None,
        }
    }

    /// Routing permutation.
    pub fn final_layout(&self) -> Option<&Layout> {
        match self.get(PropertyKey::FinalLayout) {
            Some(Property::FinalLayout(layout)) => Some(layout),
            _ => None,
        }
    }

    /// Mutable routing permutation.
    pub fn final_layout_mut(&mut self) -> Option<&mut Layout> {
        match self.values.get_mut(&PropertyKey::FinalLayout) {
            Some(Property::FinalLayout(layout)) => Some(layout),
            _ => None,
        }
    }

    /// Origin of the current layout.
    pub fn layout_source(&self) -> Option<LayoutSource> {
        match self.get(PropertyKey::LayoutSource) {
            Some(Property::LayoutSource(source)) => Some(*source),
            _ => None,
        }
    }

    /// Off-edge two-qubit operation count.
    pub fn layout_distance(&self) -> Option<usize> {
        match self.get(PropertyKey::LayoutDistance) {
            Some(Property::LayoutDistance(d)) => Some(*d),
            _ => None,
        }
    }

    /// `VF2Layout` outcome.
    pub fn vf2_stop(&self) -> Option<Vf2StopReason> {
        match self.get(PropertyKey::Vf2Stop) {
            Some(Property::Vf2Stop(reason)) => Some(*reason),
            _ => None,
        }
    }

    /// `VF2PostLayout` outcome.
    pub fn vf2_post_stop(&self) -> Option<Vf2PostStopReason> {
        match self.get(PropertyKey::Vf2PostStop) {
            Some(Property::Vf2PostStop(reason)) => Some(*reason),
            _ => None,
        }
    }

    /// Whether routing is complete.
    pub fn is_swap_mapped(&self) -> Option<bool> {
        match self.get(PropertyKey::IsSwapMapped) {
            Some(Property::IsSwapMapped(flag)) => Some(*flag),
            _ => None,
        }
    }

    /// Whether translation is complete.
    pub fn all_gates_in_basis(&self) -> Option<bool> {
        match self.get(PropertyKey::AllGatesInBasis) {
            Some(Property::AllGatesInBasis(flag)) => Some(*flag),
            _ => None,
        }
    }

    /// Swaps inserted so far.
    pub fn swap_count(&self) -> usize {
        match self.get(PropertyKey::SwapCount) {
            Some(Property::SwapCount(n)) => *n,
            _ => 0,
        }
    }

    /// Scheduled start times.
    pub fn node_start_times(&self) -> Option<&BTreeMap<NodeIndex, u64>> {
        match self.get(PropertyKey::NodeStartTimes) {
            Some(Property::NodeStartTimes(times)) => Some(times),
            _ => None,
        }
    }

    /// Total scheduled duration.
    pub fn scheduled_duration(&self) -> Option<u64> {
        match self.get(PropertyKey::ScheduledDuration) {
            Some(Property::ScheduledDuration(total)) => Some(*total),
            _ => None,
        }
    }

    /// Whether the device restricts connectivity at all.
    pub fn has_restricted_coupling(&self) -> bool {
        self.coupling_map
            .as_ref()
            .is_some_and(|cm| !cm.is_fully_connected())
    }
}
