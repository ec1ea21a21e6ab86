//! Bijective mapping between virtual and physical qubits.

use serde::{Deserialize, Serialize};

use qpipe_ir::QubitId;

use crate::error::{CompileError, CompileResult};

/// A total, invertible mapping between virtual and physical qubits.
///
/// Virtual qubits `0..num_circuit_qubits` are the circuit's own qubits;
/// the remaining virtual indices are ancillas padding unused physical
/// positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    /// `v2p[v]` is the physical qubit holding virtual qubit `v`.
    v2p: Vec<u32>,
    /// `p2v[p]` is the virtual qubit held by physical qubit `p`.
    p2v: Vec<u32>,
    /// Number of non-ancilla virtual qubits.
    circuit_qubits: u32,
}

impl Layout {
    /// Create a trivial layout (virtual qubit i -> physical qubit i).
    pub fn trivial(num_qubits: u32) -> Self {
        let v2p: Vec<u32> = (0..num_qubits).collect();
        Self {
            p2v: v2p.clone(),
            v2p,
            circuit_qubits: num_qubits,
        }
    }

    /// Build a layout from a full virtual-to-physical assignment.
    pub fn from_virtual_to_physical(v2p: Vec<u32>) -> CompileResult<Self> {
        let circuit_qubits = len_u32(v2p.len());
        Self::with_circuit_qubits(v2p, circuit_qubits)
    }

    /// Build a layout that marks every virtual index at or above
    /// `circuit_qubits` as an ancilla.
    pub fn with_circuit_qubits(v2p: Vec<u32>, circuit_qubits: u32) -> CompileResult<Self> {
        let n = v2p.len();
        let mut p2v = vec![u32::MAX; n];
        for (v, &p) in v2p.iter().enumerate() {
            let slot = p2v.get_mut(p as usize).ok_or_else(|| {
                CompileError::Configuration(format!(
                    "Physical qubit {p} is outside the device range 0..{n}"
                ))
            })?;
            if *slot != u32::MAX {
                return Err(CompileError::Configuration(format!(
                    "Physical qubit {p} is assigned to more than one virtual qubit"
                )));
            }
            *slot = len_u32(v);
        }
        Ok(Self {
            v2p,
            p2v,
            circuit_qubits: circuit_qubits.min(len_u32(n)),
        })
    }

    /// Pad a partial assignment of the circuit's qubits to a full layout
    /// over `num_physical` qubits.
    ///
    /// Unused physical qubits receive ancillas in ascending order.
    pub fn from_partial(partial: &[u32], num_physical: u32) -> CompileResult<Self> {
        if partial.len() > num_physical as usize {
            return Err(CompileError::LayoutInfeasible {
                required: partial.len(),
                available: num_physical,
            });
        }
        let mut used = vec![false; num_physical as usize];
        for &p in partial {
            match used.get_mut(p as usize) {
                Some(slot) if !*slot => *slot = true,
                Some(_) => {
                    return Err(CompileError::Configuration(format!(
                        "Initial layout maps two virtual qubits to physical qubit {p}"
                    )));
                }
                None => {
                    return Err(CompileError::Configuration(format!(
                        "Initial layout uses physical qubit {p}, but the device has {num_physical}"
                    )));
                }
            }
        }
        let mut v2p = partial.to_vec();
        v2p.extend((0..num_physical).filter(|&p| !used[p as usize]));
        Self::with_circuit_qubits(v2p, len_u32(partial.len()))
    }

    /// Physical qubit holding a virtual qubit.
    ///
    /// Out-of-range virtual qubits map to themselves.
    #[inline]
    pub fn physical(&self, virt: QubitId) -> u32 {
        self.v2p.get(virt.index()).copied().unwrap_or(virt.0)
    }

    /// Virtual qubit held by a physical qubit.
    #[inline]
    pub fn virtual_at(&self, physical: u32) -> QubitId {
        QubitId(self.p2v.get(physical as usize).copied().unwrap_or(physical))
    }

    /// Exchange the virtual qubits held by two physical qubits.
    pub fn swap_physical(&mut self, a: u32, b: u32) {
        let (ai, bi) = (a as usize, b as usize);
        if ai >= self.p2v.len() || bi >= self.p2v.len() {
            return;
        }
        self.p2v.swap(ai, bi);
        self.v2p[self.p2v[ai] as usize] = a;
        self.v2p[self.p2v[bi] as usize] = b;
    }

    /// Chain two layouts: `v -> next.physical(self.physical(v))`.
    ///
    /// The result keeps this layout's circuit-qubit count.
    pub fn compose(&self, next: &Layout) -> CompileResult<Layout> {
        let v2p = self
            .v2p
            .iter()
            .map(|&p| next.physical(QubitId(p)))
            .collect();
        Self::with_circuit_qubits(v2p, self.circuit_qubits)
    }

    /// The inverse mapping, physical indices read as virtual ones.
    pub fn inverse(&self) -> Layout {
        Layout {
            v2p: self.p2v.clone(),
            p2v: self.v2p.clone(),
            circuit_qubits: len_u32(self.p2v.len()),
        }
    }

    /// Check that both directions agree and cover `0..N-1`.
    pub fn is_bijection(&self) -> bool {
        self.v2p.len() == self.p2v.len()
            && self
                .v2p
                .iter()
                .enumerate()
                .all(|(v, &p)| self.p2v.get(p as usize).is_some_and(|&back| back as usize == v))
    }

    /// Number of device qubits covered.
    pub fn num_qubits(&self) -> u32 {
        len_u32(self.v2p.len())
    }

    /// Number of virtual qubits that belong to the circuit (not ancillas).
    pub fn num_circuit_qubits(&self) -> u32 {
        self.circuit_qubits
    }

    /// Check whether a virtual qubit is an ancilla.
    pub fn is_ancilla(&self, virt: QubitId) -> bool {
        virt.0 >= self.circuit_qubits
    }

    /// Iterate over (virtual, physical) pairs in virtual order.
    pub fn iter(&self) -> impl Iterator<Item = (QubitId, u32)> + '_ {
        self.v2p
            .iter()
            .enumerate()
            .map(|(v, &p)| (QubitId(len_u32(v)), p))
    }

    /// Physical-to-virtual view: entry `p` is the virtual qubit at `p`.
    pub fn physical_to_virtual(&self) -> &[u32] {
        &self.p2v
    }

    /// Virtual-to-physical view: entry `v` is the physical qubit of `v`.
    pub fn virtual_to_physical(&self) -> &[u32] {
        &self.v2p
    }
}

pub(crate) fn len_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
