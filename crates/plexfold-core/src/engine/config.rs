use serde::Deserialize;
use std::time::Duration;

/// CLI-visible policy thresholds for one folding run.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldParams {
    /// Global top-K retained per size band.
    pub best_k: usize,
    /// Top-K retained per identity (defaults to `best_k`).
    pub max_result_per_res_set: usize,
    /// Cap on pair transforms considered per subunit-type pair.
    pub trans_num_per_pair: usize,
    /// Minimum allowed pair clearance `d - 2 * atom_radius` in Å; negative
    /// tolerates that much sphere overlap.
    pub penetration_thr: f64,
    /// Maximum violated-weight ratio over decided restraints.
    pub restraints_ratio: f64,
    /// Whole-complex RMSD radius for final clustering, in Å.
    pub cluster_rmsd: f64,
    /// Maximum fraction of a chain's admitted atoms allowed in collision.
    pub max_backbone_collision_per_chain: f64,
    /// Confidence floor below which atoms are not collidable.
    pub min_temperature_to_consider_collision: f64,
    /// Wall-clock budget for the search; partial best is kept on expiry.
    pub timeout: Option<Duration>,
}

impl FoldParams {
    pub fn new(best_k: usize, trans_num_per_pair: usize) -> Self {
        Self {
            best_k,
            max_result_per_res_set: best_k,
            trans_num_per_pair,
            penetration_thr: -1.0,
            restraints_ratio: 0.10,
            cluster_rmsd: 5.0,
            max_backbone_collision_per_chain: 0.10,
            min_temperature_to_consider_collision: 0.0,
            timeout: None,
        }
    }
}

/// Load-time immutable algorithm constants, optionally overridden from a
/// TOML file. Never reread during a run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct StaticParams {
    /// Spatial grid cell size and backbone collision distance, in Å.
    pub grid_resolution: f64,
    /// Bounding-box extension of each subunit grid, in Å.
    pub grid_margins: f64,
    /// Unified backbone atom radius for penetration depth, in Å.
    pub atom_radius: f64,
    /// Weight of the satisfied-restraint score bonus.
    pub crosslink_bonus_weight: f64,
    /// Number of clustered representatives to emit.
    pub max_results_number: usize,
    /// Iterate every valid connector pair instead of stopping after the
    /// first productive one.
    pub exhaustive_connectors: bool,
    /// Shard count of the identity-heap lock table.
    pub lock_shards: usize,
}

impl Default for StaticParams {
    fn default() -> Self {
        Self {
            grid_resolution: 3.0,
            grid_margins: 5.0,
            atom_radius: 1.9,
            crosslink_bonus_weight: 5.0,
            max_results_number: 5,
            exhaustive_connectors: false,
            lock_shards: 64,
        }
    }
}

impl StaticParams {
    /// Two same-type placements closer than this in translation are
    /// duplicates.
    pub fn duplicate_epsilon(&self) -> f64 {
        self.grid_resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_params_defaults_match_the_cli_surface() {
        let p = FoldParams::new(50, 20);
        assert_eq!(p.best_k, 50);
        assert_eq!(p.max_result_per_res_set, 50);
        assert_eq!(p.trans_num_per_pair, 20);
        assert!((p.penetration_thr + 1.0).abs() < 1e-12);
        assert!((p.restraints_ratio - 0.10).abs() < 1e-12);
        assert!((p.cluster_rmsd - 5.0).abs() < 1e-12);
        assert!((p.max_backbone_collision_per_chain - 0.10).abs() < 1e-12);
        assert!(p.timeout.is_none());
    }

    #[test]
    fn static_params_have_sane_defaults() {
        let s = StaticParams::default();
        assert!((s.grid_resolution - 3.0).abs() < 1e-12);
        assert!((s.atom_radius - 1.9).abs() < 1e-12);
        assert_eq!(s.max_results_number, 5);
        assert!(!s.exhaustive_connectors);
        assert!((s.duplicate_epsilon() - 3.0).abs() < 1e-12);
    }
}
