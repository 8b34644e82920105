use tracing::{debug, warn};

use crate::core::geometry::RigidTransform;
use crate::core::models::restraints::DistanceRestraint;
use crate::core::models::slots::{SlotId, SlotSet};
use crate::core::models::ComplexDefinition;

use super::error::EngineError;

const WEIGHT_EPSILON: f64 = 1e-9;

/// A restraint with both sites resolved to (chain slot, point index).
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRestraint {
    pub slot1: SlotId,
    pub point1: usize,
    pub slot2: SlotId,
    pub point2: usize,
    pub d_min: f64,
    pub d_max: f64,
    pub weight: f64,
}

/// Satisfaction record of the restraints decidable at one assembly.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConstraintState {
    pub satisfied_weight: f64,
    pub violated_weight: f64,
    pub satisfied_count: usize,
    pub violated_count: usize,
}

impl ConstraintState {
    /// Violated fraction of the decided weight.
    pub fn violation_ratio(&self) -> f64 {
        let decided = self.satisfied_weight + self.violated_weight;
        self.violated_weight / decided.max(WEIGHT_EPSILON)
    }
}

/// The full, slot-resolved restraint table. Read-only during search.
#[derive(Debug, Clone, Default)]
pub struct RestraintTable {
    restraints: Vec<ResolvedRestraint>,
    total_weight: f64,
}

impl RestraintTable {
    /// Resolves restraint definitions against the complex.
    ///
    /// Fails with `UnresolvedSite` when a chain label or residue is
    /// unknown, and with `Unsatisfiable` when restraints that can never be
    /// satisfied (inverted ranges, or intra-slot restraints decided from
    /// the subunit's own geometry) already outweigh `restraints_ratio`.
    pub fn resolve(
        defs: &[DistanceRestraint],
        def: &ComplexDefinition,
        restraints_ratio: f64,
    ) -> Result<Self, EngineError> {
        let mut restraints = Vec::with_capacity(defs.len());
        let mut total_weight = 0.0;
        let mut doomed_weight = 0.0;

        for r in defs {
            let (slot1, point1) = resolve_site(def, r.res1, r.chain1)?;
            let (slot2, point2) = resolve_site(def, r.res2, r.chain2)?;

            if r.d_min > r.d_max {
                warn!(
                    res1 = r.res1,
                    chain1 = %r.chain1,
                    "Restraint has an inverted distance range."
                );
                doomed_weight += r.weight;
            } else if slot1 == slot2 {
                // Decided once and forever by the subunit's own geometry.
                let su = def.subunit_of(slot1);
                let d = (su.backbone()[point1] - su.backbone()[point2]).norm();
                if d < r.d_min || d > r.d_max {
                    debug!(
                        res1 = r.res1,
                        res2 = r.res2,
                        chain = %r.chain1,
                        distance = d,
                        "Intra-chain restraint is violated by construction."
                    );
                    doomed_weight += r.weight;
                }
            }

            total_weight += r.weight;
            restraints.push(ResolvedRestraint {
                slot1,
                point1,
                slot2,
                point2,
                d_min: r.d_min,
                d_max: r.d_max,
                weight: r.weight,
            });
        }

        if total_weight > 0.0 && doomed_weight / total_weight > restraints_ratio {
            return Err(EngineError::Unsatisfiable(format!(
                "{:.3} of the restraint weight can never be satisfied (limit {:.3})",
                doomed_weight / total_weight,
                restraints_ratio
            )));
        }

        Ok(Self {
            restraints,
            total_weight,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.restraints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.restraints.len()
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Evaluates every restraint decidable at the given content.
    ///
    /// `placement_of` maps a member slot to its world transform;
    /// restraints with a site outside `identity` are deferred and do not
    /// enter the state.
    pub fn evaluate(
        &self,
        def: &ComplexDefinition,
        identity: &SlotSet,
        placement_of: impl Fn(SlotId) -> RigidTransform,
    ) -> ConstraintState {
        let mut state = ConstraintState::default();

        for r in &self.restraints {
            if !identity.contains(r.slot1) || !identity.contains(r.slot2) {
                continue;
            }

            let p1 = placement_of(r.slot1).apply(&def.subunit_of(r.slot1).backbone()[r.point1]);
            let p2 = placement_of(r.slot2).apply(&def.subunit_of(r.slot2).backbone()[r.point2]);
            let d = (p1 - p2).norm();

            if r.d_min <= d && d <= r.d_max {
                state.satisfied_weight += r.weight;
                state.satisfied_count += 1;
            } else {
                state.violated_weight += r.weight;
                state.violated_count += 1;
            }
        }

        state
    }

    /// Score bonus for satisfied restraint weight: `(W_sat / W_total) * w`.
    pub fn bonus(&self, state: &ConstraintState, crosslink_bonus_weight: f64) -> f64 {
        if self.total_weight <= 0.0 {
            return 0.0;
        }
        (state.satisfied_weight / self.total_weight) * crosslink_bonus_weight
    }
}

fn resolve_site(
    def: &ComplexDefinition,
    residue: i32,
    chain: char,
) -> Result<(SlotId, usize), EngineError> {
    let slot = def.slots.by_label(chain).ok_or_else(|| {
        EngineError::UnresolvedSite(format!("unknown chain label '{}'", chain))
    })?;
    let su = def.subunit_of(slot);
    let point = su.residue_index(residue).ok_or_else(|| {
        EngineError::UnresolvedSite(format!(
            "residue {} is not part of subunit '{}' (chain '{}')",
            residue,
            su.name(),
            chain
        ))
    })?;
    Ok((slot, point))
}
