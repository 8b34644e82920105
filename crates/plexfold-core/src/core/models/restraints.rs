use tracing::debug;

use super::slots::SlotTable;
use super::subunit::SubunitType;

/// Distance between two consecutive residues along a backbone, used to
/// budget unmodeled linker length.
const RESIDUE_SPACING: f64 = 3.8;

/// Base allowance for a chain-connectivity restraint with no residue gap.
const CONNECTIVITY_BASE_DMAX: f64 = 30.0;

/// A distance restraint between two (residue, chain label) sites.
///
/// Covers experimental crosslinks and derived chain-connectivity
/// restraints alike. Sites are resolved to chain slots when the engine
/// builds its restraint table.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceRestraint {
    pub res1: i32,
    pub chain1: char,
    pub res2: i32,
    pub chain2: char,
    pub d_min: f64,
    pub d_max: f64,
    pub weight: f64,
}

impl DistanceRestraint {
    /// A chain-connectivity restraint: the C-terminus of one slot must end
    /// close to the N-terminus of the next, with `d_max` budgeted for the
    /// unmodeled linker between them.
    pub fn connectivity(
        c_res: i32,
        c_chain: char,
        n_res: i32,
        n_chain: char,
        linker_residues: usize,
    ) -> Self {
        Self {
            res1: c_res,
            chain1: c_chain,
            res2: n_res,
            chain2: n_chain,
            d_min: 0.0,
            d_max: CONNECTIVITY_BASE_DMAX + RESIDUE_SPACING * linker_residues as f64,
            weight: 1.0,
        }
    }
}

/// Splits a subunit name into its split-domain base and ordinal, when the
/// name follows the `<base>_d<i>` convention used by upstream domain
/// splitting.
fn split_domain(name: &str) -> Option<(&str, u32)> {
    let (base, ordinal) = name.rsplit_once("_d")?;
    if base.is_empty() {
        return None;
    }
    ordinal.parse().ok().map(|n| (base, n))
}

/// Derives chain-connectivity restraints between consecutive split domains
/// of one biological chain.
///
/// Subunit types named `<base>_d1`, `<base>_d2`, ... are treated as
/// consecutive domains; copy k of one domain is tied to copy k of the
/// next. The residue-number gap between the end of a domain and the start
/// of the next is counted as unmodeled linker.
pub fn derive_connectivity(
    subunits: &[SubunitType],
    slots: &SlotTable,
) -> Vec<DistanceRestraint> {
    let mut restraints = Vec::new();

    for (i, su) in subunits.iter().enumerate() {
        let Some((base, ordinal)) = split_domain(su.name()) else {
            continue;
        };
        let next_name = format!("{}_d{}", base, ordinal + 1);
        let Some((j, next)) = subunits
            .iter()
            .enumerate()
            .find(|(_, s)| s.name() == next_name)
        else {
            continue;
        };

        let gap = (next.n_terminal_residue() - su.c_terminal_residue() - 1).max(0) as usize;

        let left_labels = slots.labels_of_type(i);
        let right_labels = slots.labels_of_type(j);
        for (c_label, n_label) in left_labels.iter().zip(right_labels.iter()) {
            debug!(
                domain = su.name(),
                next = next.name(),
                gap,
                "Derived chain-connectivity restraint."
            );
            restraints.push(DistanceRestraint::connectivity(
                su.c_terminal_residue(),
                *c_label,
                next.n_terminal_residue(),
                *n_label,
                gap,
            ));
        }
    }

    restraints
}
