use std::cmp::Ordering;

use crate::core::geometry::RigidTransform;
use crate::core::io::results::AssemblyRecord;
use crate::core::models::slots::{SlotId, SlotSet};
use crate::core::models::ComplexDefinition;

use super::config::{FoldParams, StaticParams};
use super::error::Rejection;
use super::grid::SpatialGrid;
use super::restraints::{ConstraintState, RestraintTable};

/// An immutable partial assembly: some chain slots placed in a common
/// world frame.
///
/// Composition produces a fresh value; history is carried only as the two
/// provenance scalars (`trans_score_sum`, `trans_used_count`) that feed
/// the weighted transform score.
#[derive(Debug, Clone, PartialEq)]
pub struct SuperBB {
    members: Vec<SlotId>,
    placements: Vec<RigidTransform>,
    identity: SlotSet,
    score: f64,
    trans_score_sum: f64,
    trans_used_count: usize,
    constraint_state: ConstraintState,
}

/// Shared read-only state needed to compose and gate candidates.
#[derive(Clone, Copy)]
pub struct ComposeContext<'a> {
    pub def: &'a ComplexDefinition,
    pub grids: &'a [SpatialGrid],
    pub restraints: &'a RestraintTable,
    pub params: &'a FoldParams,
    pub statics: &'a StaticParams,
    /// Per subunit type: atom count above the collision confidence
    /// threshold.
    pub admitted: &'a [usize],
}

impl<'a> ComposeContext<'a> {
    /// Distance window the pair probe must cover: the collision distance
    /// and the penetration contact floor.
    fn probe_cutoff(&self) -> f64 {
        self.statics
            .grid_resolution
            .max(2.0 * self.statics.atom_radius + self.params.penetration_thr)
    }
}

impl SuperBB {
    /// A single chain slot at the identity transform. Score starts at 0
    /// with no transforms consumed.
    pub fn singleton(slot: SlotId, ctx: &ComposeContext) -> Self {
        let identity = SlotSet::singleton(slot);
        let constraint_state =
            ctx.restraints
                .evaluate(ctx.def, &identity, |_| RigidTransform::identity());
        Self {
            members: vec![slot],
            placements: vec![RigidTransform::identity()],
            identity,
            score: 0.0,
            trans_score_sum: 0.0,
            trans_used_count: 0,
            constraint_state,
        }
    }

    pub fn members(&self) -> &[SlotId] {
        &self.members
    }

    pub fn placements(&self) -> &[RigidTransform] {
        &self.placements
    }

    pub fn identity(&self) -> SlotSet {
        self.identity
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn trans_used_count(&self) -> usize {
        self.trans_used_count
    }

    pub fn weighted_trans_score(&self) -> f64 {
        if self.trans_used_count == 0 {
            0.0
        } else {
            self.trans_score_sum / self.trans_used_count as f64
        }
    }

    pub fn constraint_state(&self) -> &ConstraintState {
        &self.constraint_state
    }

    pub fn placement_of(&self, slot: SlotId) -> Option<&RigidTransform> {
        self.members
            .binary_search(&slot)
            .ok()
            .map(|i| &self.placements[i])
    }

    /// Total search order: score desc, transforms-used desc, smaller
    /// identity, then smaller placement parameters. `Greater` means this
    /// assembly ranks higher.
    pub fn search_cmp(&self, other: &Self) -> Ordering {
        self.score
            .partial_cmp(&other.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.trans_used_count.cmp(&other.trans_used_count))
            .then_with(|| other.identity.cmp(&self.identity))
            .then_with(|| cmp_placements(&other.placements, &self.placements))
    }

    /// The emitted form: per-slot wire transforms plus scores.
    pub fn to_record(&self) -> AssemblyRecord {
        AssemblyRecord {
            placements: self
                .members
                .iter()
                .zip(self.placements.iter())
                .map(|(&slot, t)| (slot, t.to_wire()))
                .collect(),
            weighted_trans_score: self.weighted_trans_score(),
            num_trans: self.trans_used_count,
        }
    }

    /// All backbone points of the assembly in world frame, members in
    /// ascending slot order.
    pub fn world_points(&self, def: &ComplexDefinition) -> Vec<nalgebra::Point3<f64>> {
        let mut points = Vec::new();
        for (&slot, t) in self.members.iter().zip(self.placements.iter()) {
            for p in def.subunit_of(slot).backbone() {
                points.push(t.apply(p));
            }
        }
        points
    }
}

fn cmp_placements(a: &[RigidTransform], b: &[RigidTransform]) -> Ordering {
    for (ta, tb) in a.iter().zip(b.iter()) {
        for axis in 0..3 {
            match ta.translation[axis].partial_cmp(&tb.translation[axis]) {
                Some(Ordering::Equal) | None => {}
                Some(ord) => return ord,
            }
        }
        for i in 0..3 {
            for j in 0..3 {
                match ta.rotation[(i, j)].partial_cmp(&tb.rotation[(i, j)]) {
                    Some(Ordering::Equal) | None => {}
                    Some(ord) => return ord,
                }
            }
        }
    }
    Ordering::Equal
}

/// Composes two disjoint assemblies through one pair transform relating
/// the connector slots `ca` (in `a`) and `cb` (in `b`).
///
/// `pair_transform` sends `cb`'s local frame into place in `ca`'s local
/// frame. Rejections are candidate-level values, not fatal errors.
pub fn compose(
    ctx: &ComposeContext,
    a: &SuperBB,
    b: &SuperBB,
    pair_transform: &RigidTransform,
    pair_score: f64,
    ca: SlotId,
    cb: SlotId,
) -> Result<SuperBB, Rejection> {
    if !a.identity.is_disjoint(&b.identity) {
        return Err(Rejection::IncompatibleOverlap);
    }

    let t_world_ca = a
        .placement_of(ca)
        .expect("connector slot ca is a member of a");
    let t_local_cb = b
        .placement_of(cb)
        .expect("connector slot cb is a member of b");
    let t_align = t_world_ca
        .compose(pair_transform)
        .compose(&t_local_cb.inverse());

    // Merge members in ascending slot order, aligning B into A's frame.
    let size = a.members.len() + b.members.len();
    let mut members = Vec::with_capacity(size);
    let mut placements = Vec::with_capacity(size);
    let (mut ia, mut ib) = (0, 0);
    while ia < a.members.len() || ib < b.members.len() {
        let take_a = match (a.members.get(ia), b.members.get(ib)) {
            (Some(&ma), Some(&mb)) => ma < mb,
            (Some(_), None) => true,
            _ => false,
        };
        if take_a {
            members.push(a.members[ia]);
            placements.push(a.placements[ia]);
            ia += 1;
        } else {
            members.push(b.members[ib]);
            placements.push(t_align.compose(&b.placements[ib]));
            ib += 1;
        }
    }

    check_duplicates(ctx, a, b, &t_align)?;
    collision_gate(ctx, &members, &placements)?;

    let identity = a.identity.union(&b.identity);
    let constraint_state = {
        let lookup = |slot: SlotId| {
            let i = members
                .binary_search(&slot)
                .expect("evaluated slot is a member");
            placements[i]
        };
        ctx.restraints.evaluate(ctx.def, &identity, lookup)
    };
    if constraint_state.violation_ratio() > ctx.params.restraints_ratio {
        return Err(Rejection::ConstraintViolation);
    }

    let trans_score_sum = a.trans_score_sum + b.trans_score_sum + pair_score;
    let trans_used_count = a.trans_used_count + b.trans_used_count + 1;
    let weighted = trans_score_sum / trans_used_count as f64;
    let score = weighted
        + ctx
            .restraints
            .bonus(&constraint_state, ctx.statics.crosslink_bonus_weight);

    Ok(SuperBB {
        members,
        placements,
        identity,
        score,
        trans_score_sum,
        trans_used_count,
        constraint_state,
    })
}

/// Rejects same-type members of the two parts whose world translations
/// coincide within the duplicate epsilon.
fn check_duplicates(
    ctx: &ComposeContext,
    a: &SuperBB,
    b: &SuperBB,
    t_align: &RigidTransform,
) -> Result<(), Rejection> {
    let epsilon = ctx.statics.duplicate_epsilon();
    for (&ma, ta) in a.members.iter().zip(a.placements.iter()) {
        let type_a = ctx.def.slots.slot(ma).subunit;
        for (&mb, tb) in b.members.iter().zip(b.placements.iter()) {
            if ctx.def.slots.slot(mb).subunit != type_a {
                continue;
            }
            let world_b = t_align.compose(tb);
            if (ta.translation - world_b.translation).norm() < epsilon {
                return Err(Rejection::DuplicatePlacement);
            }
        }
    }
    Ok(())
}

/// The steric gate: per-chain backbone collision ratios with early exit,
/// and the pairwise penetration floor.
fn collision_gate(
    ctx: &ComposeContext,
    members: &[SlotId],
    placements: &[RigidTransform],
) -> Result<(), Rejection> {
    let threshold = ctx.params.min_temperature_to_consider_collision;
    let max_ratio = ctx.params.max_backbone_collision_per_chain;
    let cutoff = ctx.probe_cutoff();

    let mut masks: Vec<Vec<bool>> = members
        .iter()
        .map(|&slot| vec![false; ctx.def.subunit_of(slot).len()])
        .collect();

    for i in 0..members.len() {
        for j in (i + 1)..members.len() {
            let su_i = ctx.def.subunit_of(members[i]);
            let su_j = ctx.def.subunit_of(members[j]);

            let center_i = placements[i].apply(&su_i.centroid());
            let center_j = placements[j].apply(&su_j.centroid());
            if (center_i - center_j).norm() > su_i.radius() + su_j.radius() + cutoff {
                continue;
            }

            // Probe j's points inside i's local-frame grid.
            let t_ij = placements[i].inverse().compose(&placements[j]);
            let grid = &ctx.grids[ctx.def.slots.slot(members[i]).subunit];
            let (mask_i, mask_j) = split_masks(&mut masks, i, j);
            let probe = grid.probe_pair(su_j, &t_ij, threshold, cutoff, mask_i, mask_j);

            let clearance = probe.min_distance - 2.0 * ctx.statics.atom_radius;
            if clearance < ctx.params.penetration_thr {
                return Err(Rejection::PenetrationExceeded);
            }

            for &side in &[i, j] {
                let admitted = ctx.admitted[ctx.def.slots.slot(members[side]).subunit];
                if admitted == 0 {
                    continue;
                }
                let hits = masks[side].iter().filter(|&&h| h).count();
                if hits as f64 / admitted as f64 > max_ratio {
                    return Err(Rejection::CollisionLimitExceeded);
                }
            }
        }
    }

    Ok(())
}

fn split_masks(
    masks: &mut [Vec<bool>],
    i: usize,
    j: usize,
) -> (&mut [bool], &mut [bool]) {
    debug_assert!(i < j);
    let (left, right) = masks.split_at_mut(j);
    (&mut left[i], &mut right[0])
}
