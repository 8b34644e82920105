use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use itertools::Itertools;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::core::models::slots::{SlotId, SlotSet};
use crate::core::models::transforms::TransformLibrary;
use crate::core::models::ComplexDefinition;

use super::assembly::{compose, ComposeContext, SuperBB};
use super::beam::BestK;
use super::config::{FoldParams, StaticParams};
use super::error::{EngineError, Rejection};
use super::grid::SpatialGrid;
use super::progress::{Progress, ProgressReporter};
use super::restraints::RestraintTable;

/// Candidate statistics of one folding run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FoldStats {
    pub attempted: u64,
    pub accepted: u64,
    pub overlap: u64,
    pub duplicate: u64,
    pub collision: u64,
    pub penetration: u64,
    pub constraint: u64,
}

impl FoldStats {
    pub fn rejected(&self) -> u64 {
        self.overlap + self.duplicate + self.collision + self.penetration + self.constraint
    }
}

#[derive(Default)]
struct StatsCollector {
    attempted: AtomicU64,
    accepted: AtomicU64,
    overlap: AtomicU64,
    duplicate: AtomicU64,
    collision: AtomicU64,
    penetration: AtomicU64,
    constraint: AtomicU64,
}

impl StatsCollector {
    fn record(&self, outcome: Option<Rejection>) {
        self.attempted.fetch_add(1, AtomicOrdering::Relaxed);
        let counter = match outcome {
            None => &self.accepted,
            Some(Rejection::IncompatibleOverlap) => &self.overlap,
            Some(Rejection::DuplicatePlacement) => &self.duplicate,
            Some(Rejection::CollisionLimitExceeded) => &self.collision,
            Some(Rejection::PenetrationExceeded) => &self.penetration,
            Some(Rejection::ConstraintViolation) => &self.constraint,
        };
        counter.fetch_add(1, AtomicOrdering::Relaxed);
    }

    fn snapshot(&self) -> FoldStats {
        FoldStats {
            attempted: self.attempted.load(AtomicOrdering::Relaxed),
            accepted: self.accepted.load(AtomicOrdering::Relaxed),
            overlap: self.overlap.load(AtomicOrdering::Relaxed),
            duplicate: self.duplicate.load(AtomicOrdering::Relaxed),
            collision: self.collision.load(AtomicOrdering::Relaxed),
            penetration: self.penetration.load(AtomicOrdering::Relaxed),
            constraint: self.constraint.load(AtomicOrdering::Relaxed),
        }
    }
}

/// Outcome of the size-banded search.
#[derive(Debug, Clone)]
pub struct FoldOutcome {
    /// Whole-complex survivors in descending search order; empty when the
    /// final band never filled.
    pub survivors: Vec<Arc<SuperBB>>,
    pub stats: FoldStats,
    pub timed_out: bool,
}

/// Connected components of the subunit-type graph whose edges are
/// non-empty transform-library entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityReport {
    /// Type indices per component, each sorted, largest slot count first.
    pub components: Vec<Vec<usize>>,
}

impl ConnectivityReport {
    pub fn is_connected(&self) -> bool {
        self.components.len() <= 1
    }
}

/// Builds the connectivity report for the graph gate: subunit types are
/// vertices, unordered pairs with transforms are edges.
pub fn connectivity_report(
    def: &ComplexDefinition,
    library: &TransformLibrary,
) -> ConnectivityReport {
    let n = def.subunits.len();
    let mut component = vec![usize::MAX; n];
    let mut next = 0;

    for start in 0..n {
        if component[start] != usize::MAX {
            continue;
        }
        component[start] = next;
        let mut queue = vec![start];
        while let Some(t) = queue.pop() {
            for other in 0..n {
                if component[other] == usize::MAX && library.has_entry(t, other) {
                    component[other] = next;
                    queue.push(other);
                }
            }
        }
        next += 1;
    }

    let mut components: Vec<Vec<usize>> = (0..next)
        .map(|c| (0..n).filter(|&t| component[t] == c).collect())
        .collect();
    let slot_count = |types: &Vec<usize>| -> usize {
        types
            .iter()
            .map(|&t| def.slots.slots_of_type(t).count())
            .sum()
    };
    components.sort_by(|a, b| slot_count(b).cmp(&slot_count(a)).then_with(|| a.cmp(b)));

    ConnectivityReport { components }
}

/// Per-identity best-K heaps of the band under construction, behind a
/// fixed sharded lock table. The only mutable state workers share.
struct ShardedHeaps {
    shards: Vec<Mutex<HashMap<SlotSet, BestK>>>,
    capacity: usize,
}

impl ShardedHeaps {
    fn new(shard_count: usize, capacity: usize) -> Self {
        let shard_count = shard_count.max(1);
        Self {
            shards: (0..shard_count).map(|_| Mutex::new(HashMap::new())).collect(),
            capacity,
        }
    }

    fn insert(&self, assembly: SuperBB) {
        let identity = assembly.identity();
        let mut hasher = DefaultHasher::new();
        identity.hash(&mut hasher);
        let shard = (hasher.finish() as usize) % self.shards.len();

        let mut map = self.shards[shard]
            .lock()
            .expect("identity heap shard lock poisoned");
        map.entry(identity)
            .or_insert_with(|| BestK::new(self.capacity))
            .insert(Arc::new(assembly));
    }

    fn into_heaps(self) -> Vec<(SlotSet, BestK)> {
        let mut heaps: Vec<(SlotSet, BestK)> = self
            .shards
            .into_iter()
            .flat_map(|shard| {
                shard
                    .into_inner()
                    .expect("identity heap shard lock poisoned")
            })
            .collect();
        heaps.sort_by(|a, b| a.0.cmp(&b.0));
        heaps
    }
}

/// The best-K-bounded dynamic program over chain-slot subsets.
pub struct HierarchicalFolder<'a> {
    def: &'a ComplexDefinition,
    library: &'a TransformLibrary,
    restraints: &'a RestraintTable,
    params: &'a FoldParams,
    statics: &'a StaticParams,
    grids: Vec<SpatialGrid>,
    admitted: Vec<usize>,
}

impl<'a> HierarchicalFolder<'a> {
    pub fn new(
        def: &'a ComplexDefinition,
        library: &'a TransformLibrary,
        restraints: &'a RestraintTable,
        params: &'a FoldParams,
        statics: &'a StaticParams,
    ) -> Self {
        let grids = def
            .subunits
            .iter()
            .map(|su| SpatialGrid::build(su, statics.grid_resolution, statics.grid_margins))
            .collect();
        let admitted = def
            .subunits
            .iter()
            .map(|su| su.admitted_count(params.min_temperature_to_consider_collision))
            .collect();
        Self {
            def,
            library,
            restraints,
            params,
            statics,
            grids,
            admitted,
        }
    }

    fn ctx(&self) -> ComposeContext<'_> {
        ComposeContext {
            def: self.def,
            grids: &self.grids,
            restraints: self.restraints,
            params: self.params,
            statics: self.statics,
            admitted: &self.admitted,
        }
    }

    /// Runs the search: for every size band, compose every admissible
    /// split through the connector-pair policy, keep the global best-K,
    /// and return the final band's survivors.
    #[instrument(skip_all, name = "hierarchical_fold")]
    pub fn run(&self, reporter: &ProgressReporter) -> Result<FoldOutcome, EngineError> {
        let n = self.def.slots.len();
        let ctx = self.ctx();
        let stats = StatsCollector::default();
        let cancelled = AtomicBool::new(false);
        let deadline = self.params.timeout.map(|t| Instant::now() + t);

        // Band 1: one singleton per chain slot.
        let mut retained: HashMap<SlotSet, Vec<Arc<SuperBB>>> = HashMap::new();
        let mut by_size: Vec<Vec<SlotSet>> = vec![Vec::new(); n + 1];
        for slot in 0..n {
            let singleton = Arc::new(SuperBB::singleton(slot, &ctx));
            by_size[1].push(singleton.identity());
            retained.insert(singleton.identity(), vec![singleton]);
        }
        info!(chain_slots = n, "Search initialized with singleton assemblies.");

        let mut timed_out = false;
        for size in 2..=n {
            let jobs = self.enumerate_jobs(size, n, &by_size);
            reporter.report(Progress::BandStart {
                size,
                jobs: jobs.len() as u64,
            });
            debug!(size, jobs = jobs.len(), "Band enumeration complete.");

            let heaps = ShardedHeaps::new(
                self.statics.lock_shards,
                self.params.max_result_per_res_set,
            );

            {
                let process = |job: &(SlotSet, SlotSet)| {
                    if !is_cancelled(&cancelled, deadline) {
                        self.process_pair(&ctx, &job.0, &job.1, &retained, &heaps, &stats, &cancelled, deadline);
                    }
                    reporter.report(Progress::BandIncrement);
                };

                #[cfg(feature = "parallel")]
                jobs.par_iter().for_each(process);

                #[cfg(not(feature = "parallel"))]
                jobs.iter().for_each(process);
            }

            // Band barrier: aggregate survivors and keep the global best-K.
            let mut band: Vec<Arc<SuperBB>> = heaps
                .into_heaps()
                .into_iter()
                .flat_map(|(_, heap)| heap.into_sorted())
                .collect();
            band.sort_by(|a, b| b.search_cmp(a));
            band.truncate(self.params.best_k);

            let kept = band.len();
            for assembly in band {
                let identity = assembly.identity();
                if !by_size[size].contains(&identity) {
                    by_size[size].push(identity);
                }
                retained.entry(identity).or_default().push(assembly);
            }
            by_size[size].sort();

            reporter.report(Progress::BandFinish { size, kept });
            let snapshot = stats.snapshot();
            info!(
                size,
                kept,
                identities = by_size[size].len(),
                attempted = snapshot.attempted,
                accepted = snapshot.accepted,
                rejected = snapshot.rejected(),
                "Band complete."
            );

            if is_cancelled(&cancelled, deadline) {
                warn!(size, "Search deadline reached; keeping partial results.");
                timed_out = true;
                break;
            }
            if by_size[size].is_empty() && size < n {
                debug!(size, "Band is empty; larger bands may still form from smaller splits.");
            }
        }

        let survivors = retained
            .remove(&self.def.slots.full_set())
            .unwrap_or_default();
        info!(
            survivors = survivors.len(),
            timed_out, "Hierarchical search finished."
        );

        Ok(FoldOutcome {
            survivors,
            stats: stats.snapshot(),
            timed_out,
        })
    }

    /// All admissible `(B_A, B_B)` identity pairs whose sizes sum to the
    /// band size. For equal split sizes the pair is ordered to avoid
    /// double counting.
    fn enumerate_jobs(
        &self,
        size: usize,
        n: usize,
        by_size: &[Vec<SlotSet>],
    ) -> Vec<(SlotSet, SlotSet)> {
        let mut jobs = Vec::new();
        for a in 1..=size / 2 {
            let b = size - a;
            if by_size[a].is_empty() || by_size[b].is_empty() {
                continue;
            }

            if a == b {
                for pair in by_size[a].iter().combinations(2) {
                    self.push_job(&mut jobs, *pair[0], *pair[1], size, n);
                }
            } else {
                for &ia in &by_size[a] {
                    for &ib in &by_size[b] {
                        self.push_job(&mut jobs, ia, ib, size, n);
                    }
                }
            }
        }
        jobs
    }

    fn push_job(
        &self,
        jobs: &mut Vec<(SlotSet, SlotSet)>,
        ia: SlotSet,
        ib: SlotSet,
        size: usize,
        n: usize,
    ) {
        if !ia.is_disjoint(&ib) {
            return;
        }
        let union = ia.union(&ib);
        debug_assert_eq!(union.len(), size);
        // The group gate: mixed-group content only at the final band.
        if size < n && self.def.slots.groups_configured() && !self.def.slots.single_group(&union)
        {
            return;
        }
        jobs.push((ia, ib));
    }

    /// Composes one identity pair through the connector-pair policy:
    /// connectors ordered by library richness, stopping after the first
    /// that yields an accepted candidate unless configured exhaustive.
    #[allow(clippy::too_many_arguments)]
    fn process_pair(
        &self,
        ctx: &ComposeContext,
        ia: &SlotSet,
        ib: &SlotSet,
        retained: &HashMap<SlotSet, Vec<Arc<SuperBB>>>,
        heaps: &ShardedHeaps,
        stats: &StatsCollector,
        cancelled: &AtomicBool,
        deadline: Option<Instant>,
    ) {
        let (Some(a_list), Some(b_list)) = (retained.get(ia), retained.get(ib)) else {
            return;
        };

        let mut connectors: Vec<(usize, SlotId, SlotId)> = Vec::new();
        for ca in ia.iter() {
            for cb in ib.iter() {
                let richness = self.library.entry_len(
                    self.def.slots.slot(ca).subunit,
                    self.def.slots.slot(cb).subunit,
                );
                if richness > 0 {
                    connectors.push((richness, ca, cb));
                }
            }
        }
        connectors.sort_by(|x, y| y.0.cmp(&x.0).then_with(|| (x.1, x.2).cmp(&(y.1, y.2))));

        for (_, ca, cb) in connectors {
            let type_a = self.def.slots.slot(ca).subunit;
            let type_b = self.def.slots.slot(cb).subunit;
            let mut accepted_any = false;

            for (transform, score) in self
                .library
                .transforms_between(type_a, type_b)
                .take(self.params.trans_num_per_pair)
            {
                for a in a_list {
                    for b in b_list {
                        if is_cancelled(cancelled, deadline) {
                            return;
                        }
                        match compose(ctx, a, b, &transform, score, ca, cb) {
                            Ok(candidate) => {
                                stats.record(None);
                                heaps.insert(candidate);
                                accepted_any = true;
                            }
                            Err(rejection) => stats.record(Some(rejection)),
                        }
                    }
                }
            }

            if accepted_any && !self.statics.exhaustive_connectors {
                break;
            }
        }
    }
}

fn is_cancelled(cancelled: &AtomicBool, deadline: Option<Instant>) -> bool {
    if cancelled.load(AtomicOrdering::Relaxed) {
        return true;
    }
    if let Some(d) = deadline {
        if Instant::now() >= d {
            cancelled.store(true, AtomicOrdering::Relaxed);
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::RigidTransform;
    use crate::core::models::transforms::PairTransform;
    use crate::engine::testutil::{compact_subunit, Fixture};
    use std::time::Duration;

    fn pair(from: usize, to: usize, tz: f64, score: f64) -> PairTransform {
        PairTransform {
            from_type: from,
            to_type: to,
            transform: RigidTransform::from_wire(0.0, 0.0, 0.0, 0.0, 0.0, tz),
            score,
            provenance: "test".to_string(),
        }
    }

    fn run_folder(fx: &Fixture, library: &TransformLibrary) -> FoldOutcome {
        let folder =
            HierarchicalFolder::new(&fx.def, library, &fx.restraints, &fx.params, &fx.statics);
        folder.run(&ProgressReporter::new()).unwrap()
    }

    #[test]
    fn homodimer_with_one_transform_yields_one_assembly() {
        let fx = Fixture::homodimer();
        let library = TransformLibrary::from_pairs(vec![pair(0, 0, 20.0, 90.0)], 10);

        let outcome = run_folder(&fx, &library);

        assert_eq!(outcome.survivors.len(), 1);
        let best = &outcome.survivors[0];
        assert_eq!(best.members(), &[0, 1]);
        assert!((best.weighted_trans_score() - 90.0).abs() < 1e-9);
        assert!(
            (best.placement_of(1).unwrap().translation
                - nalgebra::Vector3::new(0.0, 0.0, 20.0))
            .norm()
                < 1e-9
        );
        assert!(!outcome.timed_out);
        assert_eq!(outcome.stats.accepted, 1);
    }

    #[test]
    fn steric_clash_empties_the_final_band() {
        let fx = Fixture::homodimer();
        let library = TransformLibrary::from_pairs(vec![pair(0, 0, 1.0, 90.0)], 10);

        let outcome = run_folder(&fx, &library);

        assert!(outcome.survivors.is_empty());
        assert_eq!(outcome.stats.accepted, 0);
        assert!(outcome.stats.rejected() > 0);
    }

    #[test]
    fn heterotrimer_composes_through_the_shared_type() {
        let fx = Fixture::from_parts(
            vec![
                compact_subunit("A"),
                compact_subunit("B"),
                compact_subunit("C"),
            ],
            &[(0, 0), (1, 0), (2, 0)],
            &[],
        );
        let library = TransformLibrary::from_pairs(
            vec![pair(0, 1, 20.0, 80.0), pair(1, 2, 20.0, 70.0)],
            10,
        );

        let outcome = run_folder(&fx, &library);

        assert!(!outcome.survivors.is_empty());
        let best = &outcome.survivors[0];
        assert!((best.weighted_trans_score() - 75.0).abs() < 1e-9);
        assert_eq!(best.trans_used_count(), 2);

        // C sits 40 Å from A along z, whatever the global frame.
        let delta = best.placement_of(2).unwrap().translation
            - best.placement_of(0).unwrap().translation;
        assert!((delta - nalgebra::Vector3::new(0.0, 0.0, 40.0)).norm() < 1e-9);
    }

    #[test]
    fn missing_edges_leave_the_final_band_empty() {
        let fx = Fixture::from_parts(
            vec![compact_subunit("A"), compact_subunit("B")],
            &[(0, 0), (1, 0)],
            &[],
        );
        let library = TransformLibrary::from_pairs(vec![], 10);

        let report = connectivity_report(&fx.def, &library);
        assert!(!report.is_connected());
        assert_eq!(report.components.len(), 2);

        let outcome = run_folder(&fx, &library);
        assert!(outcome.survivors.is_empty());
    }

    #[test]
    fn connectivity_report_merges_linked_types() {
        let fx = Fixture::from_parts(
            vec![
                compact_subunit("A"),
                compact_subunit("B"),
                compact_subunit("C"),
            ],
            &[(0, 0), (1, 0), (2, 0)],
            &[],
        );
        let library = TransformLibrary::from_pairs(vec![pair(0, 1, 20.0, 80.0)], 10);

        let report = connectivity_report(&fx.def, &library);
        assert_eq!(report.components.len(), 2);
        assert_eq!(report.components[0], vec![0, 1]);
        assert_eq!(report.components[1], vec![2]);
    }

    #[test]
    fn group_gate_blocks_mixed_intermediates() {
        // Without groups, A joins C first and B follows: assembles fine.
        let subunits = vec![
            compact_subunit("A"),
            compact_subunit("B"),
            compact_subunit("C"),
        ];
        let library = TransformLibrary::from_pairs(
            vec![pair(0, 2, 40.0, 80.0), pair(1, 2, 20.0, 70.0)],
            10,
        );

        let ungrouped =
            Fixture::from_parts(subunits.clone(), &[(0, 0), (1, 0), (2, 0)], &[]);
        assert!(!run_folder(&ungrouped, &library).survivors.is_empty());

        // With C in group 1, both {A,C} and {B,C} are mixed and blocked
        // below the final band, so the complex can never form.
        let grouped = Fixture::from_parts(subunits, &[(0, 0), (1, 0), (2, 1)], &[]);
        assert!(run_folder(&grouped, &library).survivors.is_empty());
    }

    #[test]
    fn best_k_bounds_each_band() {
        let mut fx = Fixture::homodimer();
        fx.params.best_k = 1;
        fx.params.max_result_per_res_set = 1;
        let library = TransformLibrary::from_pairs(
            vec![pair(0, 0, 20.0, 90.0), pair(0, 0, 26.0, 60.0)],
            10,
        );

        let outcome = run_folder(&fx, &library);

        assert_eq!(outcome.survivors.len(), 1);
        assert!((outcome.survivors[0].weighted_trans_score() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn an_expired_deadline_reports_timeout() {
        let mut fx = Fixture::homodimer();
        fx.params.timeout = Some(Duration::ZERO);
        let library = TransformLibrary::from_pairs(vec![pair(0, 0, 20.0, 90.0)], 10);

        let outcome = run_folder(&fx, &library);

        assert!(outcome.timed_out);
        assert!(outcome.survivors.is_empty());
    }

    #[test]
    fn narrowing_best_k_never_improves_the_top_score() {
        let library = TransformLibrary::from_pairs(
            vec![
                pair(0, 0, 20.0, 90.0),
                pair(0, 0, 26.0, 80.0),
                pair(0, 0, 32.0, 70.0),
            ],
            10,
        );

        let wide = Fixture::homodimer();
        let mut narrow = Fixture::homodimer();
        narrow.params.best_k = 1;
        narrow.params.max_result_per_res_set = 1;

        let wide_best = run_folder(&wide, &library).survivors[0].score();
        let narrow_best = run_folder(&narrow, &library).survivors[0].score();

        assert!(narrow_best <= wide_best + 1e-12);
        assert!((narrow_best - wide_best).abs() < 1e-9);
    }

    #[test]
    fn identical_runs_produce_identical_results() {
        let fx = Fixture::homodimer();
        let library = TransformLibrary::from_pairs(
            vec![pair(0, 0, 20.0, 90.0), pair(0, 0, 26.0, 80.0)],
            10,
        );

        let first = run_folder(&fx, &library);
        let second = run_folder(&fx, &library);

        assert_eq!(first.survivors.len(), second.survivors.len());
        for (a, b) in first.survivors.iter().zip(second.survivors.iter()) {
            assert_eq!(a.to_record(), b.to_record());
        }
    }
}
