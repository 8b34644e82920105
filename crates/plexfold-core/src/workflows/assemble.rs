use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::core::models::restraints::{self, DistanceRestraint};
use crate::core::models::transforms::TransformLibrary;
use crate::core::models::ComplexDefinition;
use crate::engine::assembly::SuperBB;
use crate::engine::clustering::cluster_survivors;
use crate::engine::config::{FoldParams, StaticParams};
use crate::engine::error::EngineError;
use crate::engine::folder::{
    connectivity_report, ConnectivityReport, FoldStats, HierarchicalFolder,
};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::restraints::RestraintTable;

/// Everything a finished assembly run hands back to the caller.
#[derive(Debug, Clone)]
pub struct AssembleReport {
    /// Whole-complex survivors, best first.
    pub survivors: Vec<Arc<SuperBB>>,
    /// Cluster representatives of the survivors, best first.
    pub clustered: Vec<Arc<SuperBB>>,
    pub stats: FoldStats,
    pub timed_out: bool,
    /// Present when the subunit-type graph was disconnected.
    pub unreachable: Option<ConnectivityReport>,
}

/// Runs the complete assembly procedure: restraint resolution (user
/// restraints plus derived chain connectivity), the graph connectivity
/// gate, the hierarchical search, and final clustering.
///
/// An empty final band is [`EngineError::NoAssembly`] unless the run
/// timed out, in which case the partial best is returned with
/// `timed_out` set.
#[instrument(skip_all, name = "assembly_workflow")]
pub fn run(
    def: &ComplexDefinition,
    library: &TransformLibrary,
    user_restraints: &[DistanceRestraint],
    params: &FoldParams,
    statics: &StaticParams,
    reporter: &ProgressReporter,
) -> Result<AssembleReport, EngineError> {
    reporter.report(Progress::PhaseStart { name: "Setup" });
    info!("Resolving restraints and building spatial grids.");

    let mut all_restraints = user_restraints.to_vec();
    let derived = restraints::derive_connectivity(&def.subunits, &def.slots);
    if !derived.is_empty() {
        info!(
            derived = derived.len(),
            "Added chain-connectivity restraints for split domains."
        );
        all_restraints.extend(derived);
    }
    let restraint_table = RestraintTable::resolve(&all_restraints, def, params.restraints_ratio)?;

    let report = connectivity_report(def, library);
    let unreachable = if report.is_connected() {
        None
    } else {
        warn!(
            components = report.components.len(),
            unreachable = ?report.components[1..],
            "Subunit-type graph is disconnected; some subunits are unreachable."
        );
        reporter.report(Progress::Message(format!(
            "Warning: {} subunit group(s) have no connecting transforms.",
            report.components.len() - 1
        )));
        Some(report)
    };
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart { name: "Search" });
    let folder = HierarchicalFolder::new(def, library, &restraint_table, params, statics);
    let outcome = folder.run(reporter)?;
    reporter.report(Progress::PhaseFinish);

    if outcome.survivors.is_empty() && !outcome.timed_out {
        return Err(EngineError::NoAssembly);
    }

    reporter.report(Progress::PhaseStart { name: "Clustering" });
    let clustered = cluster_survivors(
        &outcome.survivors,
        def,
        params.cluster_rmsd,
        statics.max_results_number,
    )?;
    reporter.report(Progress::PhaseFinish);

    info!(
        survivors = outcome.survivors.len(),
        clusters = clustered.len(),
        "Assembly workflow complete."
    );

    Ok(AssembleReport {
        survivors: outcome.survivors,
        clustered,
        stats: outcome.stats,
        timed_out: outcome.timed_out,
        unreachable,
    })
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
            provenance: "afm_model_1".to_string(),
        }
    }

    fn run_workflow(
        fx: &Fixture,
        library: &TransformLibrary,
        user_restraints: &[crate::core::models::restraints::DistanceRestraint],
    ) -> Result<AssembleReport, EngineError> {
        run(
            &fx.def,
            library,
            user_restraints,
            &fx.params,
            &fx.statics,
            &ProgressReporter::new(),
        )
    }

    #[test]
    fn two_copies_one_transform_yields_one_final_assembly() {
        let fx = Fixture::homodimer();
        let library = TransformLibrary::from_pairs(vec![pair(0, 0, 20.0, 90.0)], 10);

        let report = run_workflow(&fx, &library, &[]).unwrap();

        assert_eq!(report.survivors.len(), 1);
        assert_eq!(report.clustered.len(), 1);
        let best = &report.clustered[0];
        assert!((best.weighted_trans_score() - 90.0).abs() < 1e-9);
        assert!(best.placement_of(0).unwrap().translation.norm() < 1e-9);
        assert!(
            (best.placement_of(1).unwrap().translation
                - nalgebra::Vector3::new(0.0, 0.0, 20.0))
            .norm()
                < 1e-9
        );
        assert!(report.unreachable.is_none());
    }

    #[test]
    fn colliding_transform_means_no_assembly() {
        let fx = Fixture::homodimer();
        let library = TransformLibrary::from_pairs(vec![pair(0, 0, 1.0, 90.0)], 10);

        let result = run_workflow(&fx, &library, &[]);
        assert!(matches!(result, Err(EngineError::NoAssembly)));
    }

    #[test]
    fn heterotrimer_chains_two_pair_types() {
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

        let report = run_workflow(&fx, &library, &[]).unwrap();

        assert_eq!(report.clustered.len(), 1);
        let best = &report.clustered[0];
        assert!((best.weighted_trans_score() - 75.0).abs() < 1e-9);
        let delta = best.placement_of(2).unwrap().translation
            - best.placement_of(0).unwrap().translation;
        assert!((delta - nalgebra::Vector3::new(0.0, 0.0, 40.0)).norm() < 1e-9);
    }

    #[test]
    fn disconnected_types_are_reported_and_fail_assembly() {
        let fx = Fixture::from_parts(
            vec![compact_subunit("A"), compact_subunit("B")],
            &[(0, 0), (1, 0)],
            &[],
        );
        let library = TransformLibrary::from_pairs(vec![], 10);

        let result = run_workflow(&fx, &library, &[]);
        assert!(matches!(result, Err(EngineError::NoAssembly)));
    }

    #[test]
    fn violated_crosslink_empties_the_final_band() {
        let fx = Fixture::homodimer();
        let library = TransformLibrary::from_pairs(vec![pair(0, 0, 20.0, 90.0)], 10);
        let restraint = crate::core::models::restraints::DistanceRestraint {
            res1: 10,
            chain1: '0',
            res2: 10,
            chain2: '1',
            d_min: 0.0,
            d_max: 5.0,
            weight: 1.0,
        };

        let result = run_workflow(&fx, &library, &[restraint]);
        assert!(matches!(result, Err(EngineError::NoAssembly)));
    }

    #[test]
    fn near_duplicate_survivors_cluster_to_one_representative() {
        let fx = Fixture::homodimer();
        let library = TransformLibrary::from_pairs(
            vec![pair(0, 0, 20.0, 90.0), pair(0, 0, 22.0, 85.0)],
            10,
        );

        let report = run_workflow(&fx, &library, &[]).unwrap();

        assert_eq!(report.survivors.len(), 2);
        assert_eq!(report.clustered.len(), 1);
        assert!((report.clustered[0].weighted_trans_score() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn timeout_returns_partial_results_without_failing() {
        let mut fx = Fixture::homodimer();
        fx.params.timeout = Some(Duration::ZERO);
        let library = TransformLibrary::from_pairs(vec![pair(0, 0, 20.0, 90.0)], 10);

        let report = run_workflow(&fx, &library, &[]).unwrap();
        assert!(report.timed_out);
        assert!(report.survivors.is_empty());
        assert!(report.clustered.is_empty());
    }

    #[test]
    fn unsatisfiable_restraints_fail_before_the_search() {
        let fx = Fixture::homodimer();
        let library = TransformLibrary::from_pairs(vec![pair(0, 0, 20.0, 90.0)], 10);
        let restraint = crate::core::models::restraints::DistanceRestraint {
            res1: 1,
            chain1: '0',
            res2: 2,
            chain2: '0',
            d_min: 50.0,
            d_max: 60.0,
            weight: 1.0,
        };

        let result = run_workflow(&fx, &library, &[restraint]);
        assert!(matches!(result, Err(EngineError::Unsatisfiable(_))));
    }

    #[test]
    fn restraint_verdicts_match_recomputation_from_emitted_transforms() {
        let fx = Fixture::homodimer();
        let library = TransformLibrary::from_pairs(vec![pair(0, 0, 20.0, 90.0)], 10);
        let restraint = crate::core::models::restraints::DistanceRestraint {
            res1: 3,
            chain1: '0',
            res2: 3,
            chain2: '1',
            d_min: 0.0,
            d_max: 25.0,
            weight: 1.0,
        };

        let report = run_workflow(&fx, &library, std::slice::from_ref(&restraint)).unwrap();
        let best = &report.clustered[0];
        assert_eq!(best.constraint_state().satisfied_count, 1);

        // Recompute the site distance from the emitted wire transforms.
        let record = best.to_record();
        let point = fx.def.subunits[0].backbone()
            [fx.def.subunits[0].residue_index(restraint.res1).unwrap()];
        let worlds: Vec<_> = record
            .placements
            .iter()
            .map(|(_, w)| {
                RigidTransform::from_wire(w[0], w[1], w[2], w[3], w[4], w[5]).apply(&point)
            })
            .collect();
        let d = (worlds[0] - worlds[1]).norm();
        assert!(restraint.d_min <= d && d <= restraint.d_max);
    }

    #[test]
    fn final_scores_match_emitted_records() {
        let fx = Fixture::homodimer();
        let library = TransformLibrary::from_pairs(vec![pair(0, 0, 20.0, 90.0)], 10);

        let report = run_workflow(&fx, &library, &[]).unwrap();
        let record = report.clustered[0].to_record();

        assert_eq!(record.num_trans, 1);
        assert!((record.weighted_trans_score - 90.0).abs() < 1e-9);
        assert_eq!(record.placements.len(), 2);
    }
}
