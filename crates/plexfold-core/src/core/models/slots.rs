use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Dense, stable id of one chain slot, in `[0, MAX_SLOTS)`.
pub type SlotId = usize;

/// Upper bound on chain slots, fixed by the `u128` identity width.
pub const MAX_SLOTS: usize = 128;

/// Alphabet from which chain labels are assigned, in global slot order.
pub const LABEL_ALPHABET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlotError {
    #[error("too many chain slots: {found} (at most {max} are supported)")]
    TooManySlots { found: usize, max: usize },
}

/// Fixed-width bit vector over chain-slot ids.
///
/// The identity of a partial assembly. Total order is lexicographic over
/// the ascending sequence of set bits, which keeps tie-breaking
/// deterministic across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SlotSet(u128);

impl SlotSet {
    pub const EMPTY: SlotSet = SlotSet(0);

    pub fn singleton(id: SlotId) -> Self {
        debug_assert!(id < MAX_SLOTS);
        SlotSet(1u128 << id)
    }

    pub fn from_ids(ids: impl IntoIterator<Item = SlotId>) -> Self {
        let mut set = Self::EMPTY;
        for id in ids {
            set = set.with(id);
        }
        set
    }

    #[must_use]
    pub fn with(self, id: SlotId) -> Self {
        debug_assert!(id < MAX_SLOTS);
        SlotSet(self.0 | (1u128 << id))
    }

    #[inline]
    pub fn contains(&self, id: SlotId) -> bool {
        id < MAX_SLOTS && self.0 & (1u128 << id) != 0
    }

    #[inline]
    pub fn union(&self, other: &SlotSet) -> SlotSet {
        SlotSet(self.0 | other.0)
    }

    #[inline]
    pub fn intersection(&self, other: &SlotSet) -> SlotSet {
        SlotSet(self.0 & other.0)
    }

    #[inline]
    pub fn is_disjoint(&self, other: &SlotSet) -> bool {
        self.0 & other.0 == 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Set bits in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = SlotId> + '_ {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                None
            } else {
                let id = bits.trailing_zeros() as SlotId;
                bits &= bits - 1;
                Some(id)
            }
        })
    }

    pub fn bits(&self) -> u128 {
        self.0
    }
}

impl PartialOrd for SlotSet {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SlotSet {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl fmt::Display for SlotSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, id) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", id)?;
        }
        write!(f, "}}")
    }
}

/// One logical copy of a subunit type in the final assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSlot {
    pub id: SlotId,
    /// Index of the owning subunit type.
    pub subunit: usize,
    /// Copy index within the subunit type.
    pub copy: usize,
    /// Label assigned at load time, unique across the complex.
    pub label: char,
    /// Partition tag for the hierarchical top split.
    pub group: u8,
}

/// The fixed enumeration of all chain slots, built once at load.
#[derive(Debug, Clone, Default)]
pub struct SlotTable {
    slots: Vec<ChainSlot>,
    by_label: HashMap<char, SlotId>,
    groups_configured: bool,
}

impl SlotTable {
    /// Builds the table from `(subunit type index, group)` pairs in global
    /// slot order; copy indices and labels are assigned here.
    pub fn new(assignments: &[(usize, u8)]) -> Result<Self, SlotError> {
        let labels: Vec<char> = LABEL_ALPHABET.chars().collect();
        if assignments.len() > labels.len() {
            return Err(SlotError::TooManySlots {
                found: assignments.len(),
                max: labels.len(),
            });
        }

        let mut copies_per_type: HashMap<usize, usize> = HashMap::new();
        let mut slots = Vec::with_capacity(assignments.len());
        let mut by_label = HashMap::with_capacity(assignments.len());
        let mut groups_configured = false;

        for (id, &(subunit, group)) in assignments.iter().enumerate() {
            let copy = copies_per_type.entry(subunit).or_insert(0);
            let label = labels[id];
            slots.push(ChainSlot {
                id,
                subunit,
                copy: *copy,
                label,
                group,
            });
            *copy += 1;
            by_label.insert(label, id);
            if group != 0 {
                groups_configured = true;
            }
        }

        Ok(Self {
            slots,
            by_label,
            groups_configured,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, id: SlotId) -> &ChainSlot {
        &self.slots[id]
    }

    pub fn slots(&self) -> &[ChainSlot] {
        &self.slots
    }

    pub fn by_label(&self, label: char) -> Option<SlotId> {
        self.by_label.get(&label).copied()
    }

    pub fn full_set(&self) -> SlotSet {
        SlotSet::from_ids(0..self.slots.len())
    }

    pub fn groups_configured(&self) -> bool {
        self.groups_configured
    }

    pub fn slots_of_type(&self, subunit: usize) -> impl Iterator<Item = &ChainSlot> + '_ {
        self.slots.iter().filter(move |s| s.subunit == subunit)
    }

    /// Labels of all copies of one subunit type, in copy order.
    pub fn labels_of_type(&self, subunit: usize) -> Vec<char> {
        self.slots_of_type(subunit).map(|s| s.label).collect()
    }

    /// True when the slot set stays within a single group tag.
    pub fn single_group(&self, set: &SlotSet) -> bool {
        let mut group = None;
        for id in set.iter() {
            let g = self.slots[id].group;
            match group {
                None => group = Some(g),
                Some(prev) if prev != g => return false,
                _ => {}
            }
        }
        true
    }
}
