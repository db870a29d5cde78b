use crate::containers::StorageKey;
use crate::engine::atom::AtomId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ClauseId(pub(crate) u32);

impl StorageKey for ClauseId {
    fn index(&self) -> usize {
        self.0 as usize
    }

    fn create_from_index(index: usize) -> Self {
        ClauseId(index as u32)
    }
}

/// A disjunction of atoms. Atoms are kept sorted (boolean-valued atoms first, then by variable)
/// so watch lists can be deduplicated on construction.
#[derive(Debug, Clone)]
pub(crate) struct Clause {
    atoms: Vec<AtomId>,
}

impl Clause {
    pub(crate) fn new(atoms: Vec<AtomId>) -> Clause {
        Clause { atoms }
    }

    pub(crate) fn len(&self) -> usize {
        self.atoms.len()
    }

    pub(crate) fn atom(&self, index: usize) -> AtomId {
        self.atoms[index]
    }

    pub(crate) fn atoms(&self) -> &[AtomId] {
        &self.atoms
    }
}
