use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::core::geometry::{rmsd, superpose};
use crate::core::models::ComplexDefinition;

use super::assembly::SuperBB;
use super::error::EngineError;

/// Greedy whole-complex RMSD clustering of the final survivors.
///
/// Candidates are processed in descending score order; one within
/// `cluster_rmsd` Å of an existing representative (after optimal
/// superposition of the full member point sets, matched slot by slot) is
/// absorbed, otherwise it founds a new cluster. Running the pass on its
/// own output returns it unchanged.
#[instrument(skip_all, name = "clustering")]
pub fn cluster_survivors(
    survivors: &[Arc<SuperBB>],
    def: &ComplexDefinition,
    cluster_rmsd: f64,
    max_results: usize,
) -> Result<Vec<Arc<SuperBB>>, EngineError> {
    let mut representatives: Vec<(Arc<SuperBB>, Vec<nalgebra::Point3<f64>>)> = Vec::new();
    let mut absorbed = 0usize;

    for candidate in survivors {
        let points = candidate.world_points(def);
        let mut matched = false;

        for (rep, rep_points) in &representatives {
            if rep.identity() != candidate.identity() {
                continue;
            }
            let alignment = superpose(rep_points, &points)?;
            let deviation = rmsd(rep_points, &points, &alignment);
            if deviation <= cluster_rmsd {
                debug!(
                    representative_score = rep.score(),
                    candidate_score = candidate.score(),
                    rmsd = deviation,
                    "Candidate absorbed into an existing cluster."
                );
                matched = true;
                break;
            }
        }

        if matched {
            absorbed += 1;
        } else {
            representatives.push((candidate.clone(), points));
        }
    }

    info!(
        clusters = representatives.len(),
        absorbed, "Clustering complete."
    );

    Ok(representatives
        .into_iter()
        .take(max_results)
        .map(|(rep, _)| rep)
        .collect())
}
