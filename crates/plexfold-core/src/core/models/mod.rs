//! Load-time immutable data model: subunit types, chain slots, the pair
//! transform pool, and distance restraints.

pub mod restraints;
pub mod slots;
pub mod subunit;
pub mod transforms;

use slots::SlotTable;
use subunit::SubunitType;

/// The complex to assemble: its subunit types and the fixed chain-slot
/// enumeration over their copies.
#[derive(Debug, Clone, Default)]
pub struct ComplexDefinition {
    pub subunits: Vec<SubunitType>,
    pub slots: SlotTable,
}

impl ComplexDefinition {
    /// The subunit type owning a chain slot.
    pub fn subunit_of(&self, slot: slots::SlotId) -> &SubunitType {
        &self.subunits[self.slots.slot(slot).subunit]
    }
}
